use std::time::Instant;
use tracing::{error, info, info_span};

use super::pipeline_config::{PipelineConfig, PipelineStepConfig};
use super::steps::{
    CleanSourceStep, EngineerStep, ExportStep, JoinStep, PipelineContext, PipelineStep, StepResult,
};
use crate::error::Result;

/// Outcome of a whole pipeline run
#[derive(Debug, Clone)]
pub struct PipelineExecutionResult {
    pub pipeline_name: String,
    pub run_id: String,
    pub step_results: Vec<(String, StepResult)>,
    pub total_processed: usize,
    pub total_excluded: usize,
}

/// Runs declarative pipelines step by step. The first failing step aborts
/// the run; tables already written by earlier steps stay as they are.
pub struct PipelineOrchestrator {
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn create_step(step_config: &PipelineStepConfig) -> Box<dyn PipelineStep> {
        match step_config {
            PipelineStepConfig::Clean { source } => Box::new(CleanSourceStep::new(source)),
            PipelineStepConfig::Join => Box::new(JoinStep),
            PipelineStepConfig::Engineer => Box::new(EngineerStep),
            PipelineStepConfig::Export => Box::new(ExportStep),
        }
    }

    pub fn run(&self, ctx: &mut PipelineContext) -> Result<PipelineExecutionResult> {
        info!(pipeline = %self.config.name, steps = self.config.steps.len(), "Starting pipeline");
        let mut result = PipelineExecutionResult {
            pipeline_name: self.config.name.clone(),
            run_id: ctx.store.run_id().to_string(),
            step_results: Vec::new(),
            total_processed: 0,
            total_excluded: 0,
        };

        for (index, step_config) in self.config.steps.iter().enumerate() {
            let label = match step_config {
                PipelineStepConfig::Clean { source } => format!("clean:{}", source),
                other => other.step_name().to_string(),
            };
            let span = info_span!("step", step = %label, index = index + 1);
            let _enter = span.enter();

            let started = Instant::now();
            let step = Self::create_step(step_config);
            match step.execute(ctx) {
                Ok(step_result) => {
                    info!(
                        processed = step_result.processed_count,
                        excluded = step_result.excluded_count,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "{}",
                        step_result.message
                    );
                    result.total_processed += step_result.processed_count;
                    result.total_excluded += step_result.excluded_count;
                    result.step_results.push((label, step_result));
                }
                Err(e) => {
                    error!(error = %e, "Step failed, aborting pipeline");
                    return Err(e);
                }
            }
        }

        info!(
            pipeline = %self.config.name,
            processed = result.total_processed,
            excluded = result.total_excluded,
            "Pipeline completed"
        );
        Ok(result)
    }
}
