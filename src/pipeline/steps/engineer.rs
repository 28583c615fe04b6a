use super::{PipelineContext, PipelineStep, StepResult};
use crate::constants::{ANALYSIS_TABLE, JOINED_TABLE};
use crate::error::Result;
use crate::pipeline::processing::features::FeatureEngineer;

/// Derives features from `joined` and persists the reconciled `analysis` table.
pub struct EngineerStep;

impl PipelineStep for EngineerStep {
    fn execute(&self, ctx: &mut PipelineContext) -> Result<StepResult> {
        let joined = ctx.store.read_table(JOINED_TABLE)?;
        let analysis = FeatureEngineer::new(ctx.catalog.clone()).engineer(joined, ANALYSIS_TABLE)?;
        let entry = ctx.store.write_table(&analysis)?;
        Ok(StepResult::success(
            analysis.len(),
            format!("Engineered {} feature columns", analysis.columns.len()),
        )
        .with_metadata("fingerprint", entry.fingerprint))
    }

    fn step_name(&self) -> &'static str {
        "engineer"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["join"]
    }
}
