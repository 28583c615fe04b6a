use tracing::info;

use super::{PipelineContext, PipelineStep, StepResult};
use crate::constants::unmapped_table_name;
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::sources::clean_source;

/// Cleans one raw source and persists it with its unmapped-key audit table.
pub struct CleanSourceStep {
    source_id: String,
}

impl CleanSourceStep {
    pub fn new(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
        }
    }
}

impl PipelineStep for CleanSourceStep {
    fn execute(&self, ctx: &mut PipelineContext) -> Result<StepResult> {
        let profile = ctx.registry.get(&self.source_id)?;
        let schema = ctx.schema_for(&self.source_id)?;
        let raw = ctx.source.load(&self.source_id)?;

        let cleaned = clean_source(profile, schema, raw, &ctx.lookup)?;
        let unmapped = cleaned
            .resolution
            .ignored_table(&unmapped_table_name(&self.source_id));

        let entry = ctx
            .store
            .write_tables(&[&cleaned.table, &unmapped])?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Config(format!("Clean table for '{}' was not written", self.source_id)))?;
        info!(
            source_id = %self.source_id,
            table = %entry.name,
            unmapped_keys = unmapped.len(),
            "Cleaned source persisted"
        );

        let excluded = cleaned.clean.rows_without_core_data
            + cleaned.resolution.ignored
            + cleaned.resolution.excluded;
        Ok(StepResult::success(
            cleaned.table.len(),
            format!("Cleaned {} into {}", self.source_id, entry.name),
        )
        .with_excluded(excluded)
        .with_metadata("raw_rows", cleaned.clean.raw_rows)
        .with_metadata("sentinel_replacements", cleaned.clean.sentinel_replacements)
        .with_metadata("ignored_rows", cleaned.resolution.ignored)
        .with_metadata("fingerprint", entry.fingerprint))
    }

    fn step_name(&self) -> &'static str {
        "clean"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryTableSource;
    use crate::pipeline::ingestion::read_csv_table;
    use crate::pipeline::processing::country::CountryLookup;
    use crate::pipeline::storage::TableStore;
    use std::path::{Path, PathBuf};

    fn resources() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("resources")
    }

    #[test]
    fn test_clean_step_persists_clean_and_unmapped_tables() {
        let raw = read_csv_table(&resources().join("polity.csv"), "polity").unwrap();
        let source = InMemoryTableSource::new().with_table("polity", raw);
        let lookup = CountryLookup::from_csv(&resources().join("country_lookup.csv")).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = PipelineContext::new(
            TableStore::open_in_memory().unwrap(),
            Box::new(source),
            lookup,
            dir.path().to_path_buf(),
        );

        let result = CleanSourceStep::new("polity").execute(&mut ctx).unwrap();
        assert_eq!(result.processed_count, 4);
        assert_eq!(ctx.store.read_table("clean_polity").unwrap().len(), 4);
        assert!(ctx.store.read_table("unmapped_polity").unwrap().is_empty());
    }

    #[test]
    fn test_clean_step_fails_when_raw_table_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = PipelineContext::new(
            TableStore::open_in_memory().unwrap(),
            Box::new(InMemoryTableSource::new()),
            CountryLookup::default(),
            dir.path().to_path_buf(),
        );
        assert!(CleanSourceStep::new("dpi").execute(&mut ctx).is_err());
    }
}
