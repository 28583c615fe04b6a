use std::collections::HashMap;
use std::path::PathBuf;

use crate::app::ports::RawTableSource;
use crate::domain::Table;
use crate::error::{PipelineError, Result};
use crate::pipeline::ingestion::read_csv_table;

/// Reads each source from the CSV export configured for it.
pub struct CsvTableSource {
    paths: HashMap<String, PathBuf>,
}

impl CsvTableSource {
    pub fn new(paths: HashMap<String, PathBuf>) -> Self {
        Self { paths }
    }
}

impl RawTableSource for CsvTableSource {
    fn load(&self, source_id: &str) -> Result<Table> {
        let path = self
            .paths
            .get(source_id)
            .ok_or_else(|| PipelineError::UnknownSource(source_id.to_string()))?;
        read_csv_table(path, source_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_configured_file_and_rejects_unknown_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polity.csv");
        std::fs::write(&path, "country,scode,year\nKenya,KEN,2005\n").unwrap();

        let source = CsvTableSource::new(HashMap::from([("polity".to_string(), path)]));
        let table = source.load("polity").unwrap();
        assert_eq!(table.name, "polity");
        assert_eq!(table.len(), 1);
        assert!(matches!(source.load("dpi"), Err(PipelineError::UnknownSource(_))));
    }
}
