// Pipeline ingestion: reading raw source exports into tables

use std::io::Read;
use std::path::Path;
use tracing::{debug, instrument};

use crate::domain::{Column, ColumnKind, Table, Value};
use crate::error::{PipelineError, Result};

/// Read a raw CSV export. Every column starts out as `Text`; cells keep their
/// literal encoding, sentinels included, until the cleaner runs.
#[instrument(fields(path = %path.display()))]
pub fn read_csv_table(path: &Path, name: &str) -> Result<Table> {
    let file = std::fs::File::open(path).map_err(|e| {
        PipelineError::Config(format!("Failed to open source file '{}': {}", path.display(), e))
    })?;
    read_csv(file, name)
}

pub fn read_csv<R: Read>(reader: R, name: &str) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let mut seen = std::collections::HashSet::new();
    let mut columns = Vec::with_capacity(headers.len());
    for header in headers.iter() {
        let header = header.trim();
        if !seen.insert(header.to_string()) {
            return Err(PipelineError::Config(format!(
                "Duplicate column '{}' in raw table '{}'",
                header, name
            )));
        }
        columns.push(Column::new(header, ColumnKind::Text));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Value::from_raw).collect());
    }
    debug!(rows = rows.len(), columns = columns.len(), "Read raw table");
    Ok(Table::new(name, columns).with_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_csv_keeps_sentinels_literal() {
        let data = "country,year,percent1,system\nKenya,2005,-999,NA\nIndia,2006,45.5,\n";
        let table = read_csv(data.as_bytes(), "dpi").unwrap();
        assert_eq!(table.column_names(), vec!["country", "year", "percent1", "system"]);
        assert_eq!(table.get(0, "percent1"), Some(&Value::Int(-999)));
        assert_eq!(table.get(0, "system"), Some(&Value::text("NA")));
        assert_eq!(table.get(1, "percent1"), Some(&Value::Float(45.5)));
        assert_eq!(table.get(1, "system"), Some(&Value::text("")));
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let data = "a,b\n1,2\n3\n";
        assert!(matches!(read_csv(data.as_bytes(), "t"), Err(PipelineError::Csv(_))));
    }

    #[test]
    fn test_duplicate_header_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "year,year").unwrap();
        writeln!(file, "1,2").unwrap();
        assert!(matches!(
            read_csv_table(file.path(), "t"),
            Err(PipelineError::Config(_))
        ));
    }
}
