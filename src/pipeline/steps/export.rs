use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{PipelineContext, PipelineStep, StepResult};
use crate::constants::ANALYSIS_TABLE;
use crate::domain::Table;
use crate::error::Result;
use crate::pipeline::processing::features::FeatureCatalog;
use crate::pipeline::storage::fingerprint;

pub const ANALYSIS_CSV: &str = "analysis.csv";
pub const FEATURE_MANIFEST: &str = "feature_manifest.json";

/// Bucket partition handed to the modeling pipeline with `analysis.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureManifest {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub rows: usize,
    pub fingerprint: String,
    pub target: String,
    pub binary: Vec<String>,
    pub continuous: Vec<String>,
    pub categorical: Vec<String>,
}

impl FeatureManifest {
    pub fn new(catalog: &FeatureCatalog, analysis: &Table, run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            generated_at: Utc::now(),
            rows: analysis.len(),
            fingerprint: fingerprint(analysis),
            target: catalog.target.clone(),
            binary: catalog.binary.clone(),
            continuous: catalog.continuous.clone(),
            categorical: catalog.categorical.clone(),
        }
    }
}

/// Write through a sibling `.tmp` file and rename it over `path`, so a
/// failed write never leaves a truncated output behind.
fn publish<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    if let Err(e) = write(&tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Write `table` as CSV. Missing cells are empty; booleans are `1`/`0`.
pub fn write_table_csv(table: &Table, path: &Path) -> Result<()> {
    publish(path, |tmp| {
        let mut writer = csv::Writer::from_path(tmp)?;
        writer.write_record(table.column_names())?;
        for row in &table.rows {
            writer.write_record(row.iter().map(|v| v.render()))?;
        }
        writer.flush()?;
        Ok(())
    })
}

pub fn write_feature_manifest(manifest: &FeatureManifest, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest)?;
    publish(path, |tmp| Ok(std::fs::write(tmp, json)?))
}

/// Writes the analysis table and its feature manifest to the output directory.
pub struct ExportStep;

impl ExportStep {
    pub fn paths(output_dir: &Path) -> (PathBuf, PathBuf) {
        (output_dir.join(ANALYSIS_CSV), output_dir.join(FEATURE_MANIFEST))
    }
}

impl PipelineStep for ExportStep {
    fn execute(&self, ctx: &mut PipelineContext) -> Result<StepResult> {
        let analysis = ctx.store.read_table(ANALYSIS_TABLE)?;
        std::fs::create_dir_all(&ctx.output_dir)?;
        let (csv_path, manifest_path) = Self::paths(&ctx.output_dir);

        write_table_csv(&analysis, &csv_path)?;
        let manifest = FeatureManifest::new(&ctx.catalog, &analysis, ctx.store.run_id());
        write_feature_manifest(&manifest, &manifest_path)?;

        info!(
            csv = %csv_path.display(),
            manifest = %manifest_path.display(),
            rows = analysis.len(),
            "Analysis table exported"
        );
        Ok(
            StepResult::success(analysis.len(), format!("Exported to {}", csv_path.display()))
                .with_metadata("fingerprint", manifest.fingerprint),
        )
    }

    fn step_name(&self) -> &'static str {
        "export"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["engineer"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, ColumnKind, SemanticType, Value};

    #[test]
    fn test_csv_renders_missing_as_empty_and_bools_as_digits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.csv");
        let table = Table::new(
            "analysis",
            vec![
                Column::new("percent", ColumnKind::Float),
                Column::new("regime_change", ColumnKind::Boolean),
            ],
        )
        .with_rows(vec![
            vec![Value::Float(0.45), Value::Bool(true)],
            vec![Value::Missing(SemanticType::Numeric), Value::Bool(false)],
        ]);
        write_table_csv(&table, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "percent,regime_change\n0.45,1\n,0\n");
    }

    #[test]
    fn test_failed_write_keeps_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ANALYSIS_CSV);
        std::fs::write(&path, "previous\n").unwrap();

        let result = publish(&path, |tmp| {
            std::fs::write(tmp, "partial")?;
            Err(crate::error::PipelineError::Config("disk full".into()))
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
