use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::app::ports::RawTableSource;
use crate::error::Result;
use crate::pipeline::processing::country::CountryLookup;
use crate::pipeline::processing::features::FeatureCatalog;
use crate::pipeline::processing::join::JoinMode;
use crate::pipeline::processing::schema::SourceSchema;
use crate::pipeline::processing::sources::SourceRegistry;
use crate::pipeline::storage::TableStore;

/// Common trait for all pipeline steps
pub trait PipelineStep {
    /// Execute this step against the shared run context
    fn execute(&self, ctx: &mut PipelineContext) -> Result<StepResult>;

    /// Get the name of this pipeline step
    fn step_name(&self) -> &'static str;

    /// Steps whose output this step reads
    fn dependencies(&self) -> Vec<&'static str>;
}

/// Result of executing a pipeline step
#[derive(Debug, Clone, Default)]
pub struct StepResult {
    pub processed_count: usize,
    /// Rows left out on purpose: no core data, unmapped country or no key
    pub excluded_count: usize,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
}

impl StepResult {
    pub fn success(processed: usize, message: String) -> Self {
        Self {
            processed_count: processed,
            message,
            ..Default::default()
        }
    }

    pub fn with_excluded(mut self, excluded: usize) -> Self {
        self.excluded_count = excluded;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Everything a step may read or write during one run.
pub struct PipelineContext {
    pub store: TableStore,
    pub source: Box<dyn RawTableSource>,
    pub lookup: CountryLookup,
    pub registry: SourceRegistry,
    /// Per-source replacements for the built-in cleaning rules
    pub schema_overrides: HashMap<String, SourceSchema>,
    pub join_mode: JoinMode,
    pub catalog: FeatureCatalog,
    pub output_dir: PathBuf,
}

impl PipelineContext {
    pub fn new(
        store: TableStore,
        source: Box<dyn RawTableSource>,
        lookup: CountryLookup,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            source,
            lookup,
            registry: SourceRegistry::new(),
            schema_overrides: HashMap::new(),
            join_mode: JoinMode::default(),
            catalog: FeatureCatalog::builtin(),
            output_dir,
        }
    }

    /// Override schema if one is configured, else the profile's built-in one.
    pub fn schema_for(&self, source_id: &str) -> Result<SourceSchema> {
        match self.schema_overrides.get(source_id) {
            Some(schema) => Ok(schema.clone()),
            None => Ok(self.registry.get(source_id)?.schema()),
        }
    }
}

pub mod clean;
pub mod engineer;
pub mod export;
pub mod join;

pub use clean::CleanSourceStep;
pub use engineer::EngineerStep;
pub use export::ExportStep;
pub use join::JoinStep;
