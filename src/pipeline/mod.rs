// Data processing pipeline: ingestion, processing, storage and orchestration

pub mod ingestion;
pub mod orchestrator;
pub mod pipeline_config;
pub mod processing;
pub mod steps;
pub mod storage;

pub use orchestrator::{PipelineExecutionResult, PipelineOrchestrator};
pub use pipeline_config::{PipelineConfig, PipelineStepConfig};
