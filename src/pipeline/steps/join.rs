use super::{PipelineContext, PipelineStep, StepResult};
use crate::constants::{clean_table_name, JOINED_TABLE};
use crate::error::Result;
use crate::pipeline::processing::join::{DatasetJoiner, KeyedTable};

/// Joins every persisted cleaned source into the `joined` table.
pub struct JoinStep;

impl PipelineStep for JoinStep {
    fn execute(&self, ctx: &mut PipelineContext) -> Result<StepResult> {
        let mut inputs = Vec::new();
        for source_id in ctx.registry.list_sources() {
            let granularity = ctx.schema_for(source_id)?.granularity;
            let table = ctx.store.read_table(&clean_table_name(source_id))?;
            inputs.push(KeyedTable::new(table, granularity));
        }

        let (joined, report) = DatasetJoiner::new(ctx.join_mode).join(inputs, JOINED_TABLE)?;
        let entry = ctx.store.write_table(&joined)?;
        let excluded = report.excluded.values().sum();

        Ok(
            StepResult::success(joined.len(), format!("Joined {} rows", joined.len()))
                .with_excluded(excluded)
                .with_metadata("mode", format!("{:?}", ctx.join_mode))
                .with_metadata("fingerprint", entry.fingerprint),
        )
    }

    fn step_name(&self) -> &'static str {
        "join"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["clean"]
    }
}
