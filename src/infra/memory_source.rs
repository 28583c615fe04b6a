use std::collections::HashMap;

use crate::app::ports::RawTableSource;
use crate::domain::Table;
use crate::error::{PipelineError, Result};

/// Raw tables held in memory, for tests and programmatic runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTableSource {
    tables: HashMap<String, Table>,
}

impl InMemoryTableSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, source_id: &str, table: Table) -> Self {
        self.tables.insert(source_id.to_string(), table);
        self
    }
}

impl RawTableSource for InMemoryTableSource {
    fn load(&self, source_id: &str) -> Result<Table> {
        self.tables
            .get(source_id)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownSource(source_id.to_string()))
    }
}
