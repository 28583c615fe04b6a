//! Declarative per-source cleaning rules and the cleaner that applies them.

pub mod coerce;
pub mod remap;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::domain::{SemanticType, Table, Value};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::sentinel::{SentinelNormalizer, SentinelSet};

pub use coerce::{coerce, DeclaredType};
pub use remap::{Fallback, OrdinalLevel, Remap, RemapRule};

/// How many rows a source holds per (country, year).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    CountryYear,
    Event,
}

/// Raw columns carrying the country and year context of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyColumns {
    pub name: String,
    pub code: String,
    pub year: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: DeclaredType,
}

impl ColumnSpec {
    pub fn new(name: &str, ty: DeclaredType) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// Every cleaning rule for one source.
///
/// `columns` declares the type of every column kept after `drop_columns`;
/// a kept column without a declaration is a configuration error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSchema {
    pub source_id: String,
    pub granularity: Granularity,
    pub keys: KeyColumns,
    #[serde(default)]
    pub sentinels: SentinelSet,
    #[serde(default)]
    pub drop_columns: Vec<String>,
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub remaps: Vec<Remap>,
    /// A row where every core field is missing holds no usable data for its
    /// period and is dropped.
    #[serde(default)]
    pub core_fields: Vec<String>,
}

impl SourceSchema {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read schema file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }

    pub fn declared(&self, column: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == column)
    }

    fn unknown(&self, column: &str) -> PipelineError {
        PipelineError::UnknownColumn {
            source_id: self.source_id.clone(),
            column: column.to_string(),
        }
    }

    /// Check that every remap, core field and key column names a declared
    /// column.
    pub fn validate(&self) -> Result<()> {
        let referenced = self
            .remaps
            .iter()
            .map(|r| r.column.as_str())
            .chain(self.core_fields.iter().map(|c| c.as_str()))
            .chain([
                self.keys.name.as_str(),
                self.keys.code.as_str(),
                self.keys.year.as_str(),
            ]);
        for column in referenced {
            if self.declared(column).is_none() {
                return Err(self.unknown(column));
            }
        }
        let mut seen = HashSet::new();
        for spec in &self.columns {
            if !seen.insert(spec.name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "Source '{}' declares column '{}' twice",
                    self.source_id, spec.name
                )));
            }
        }
        Ok(())
    }
}

/// Counts gathered during one cleaning pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanReport {
    pub source_id: String,
    pub raw_rows: usize,
    pub dropped_columns: Vec<String>,
    pub absent_drop_columns: Vec<String>,
    pub sentinel_replacements: usize,
    pub rows_without_core_data: usize,
    pub rows_out: usize,
}

/// Applies a `SourceSchema` to a raw table.
pub struct SchemaCleaner {
    schema: SourceSchema,
    normalizer: SentinelNormalizer,
}

impl SchemaCleaner {
    pub fn new(schema: SourceSchema) -> Result<Self> {
        schema.validate()?;
        let normalizer = SentinelNormalizer::new(schema.sentinels.clone());
        Ok(Self { schema, normalizer })
    }

    pub fn schema(&self) -> &SourceSchema {
        &self.schema
    }

    /// Prune, normalize, coerce and remap. Row filtering happens later in
    /// `filter_core` so derived fields can still see every period.
    #[instrument(skip(self, raw, report), fields(source_id = %self.schema.source_id))]
    pub fn prepare(&self, mut raw: Table, report: &mut CleanReport) -> Result<Table> {
        report.source_id = self.schema.source_id.clone();
        report.raw_rows = raw.len();

        for spec in &self.schema.columns {
            if !raw.has_column(&spec.name) {
                return Err(self.schema.unknown(&spec.name));
            }
        }

        for column in &self.schema.drop_columns {
            if raw.remove_column(column).is_some() {
                report.dropped_columns.push(column.clone());
            } else {
                warn!(column = %column, "Drop-listed column not present in raw table");
                report.absent_drop_columns.push(column.clone());
            }
        }

        let mut declared = Vec::with_capacity(raw.columns.len());
        for column in &raw.columns {
            match self.schema.declared(&column.name) {
                Some(spec) => declared.push(spec.ty),
                None => {
                    return Err(PipelineError::UndeclaredColumn {
                        source_id: self.schema.source_id.clone(),
                        column: column.name.clone(),
                    })
                }
            }
        }

        let semantics: Vec<SemanticType> = declared.iter().map(|t| t.semantic()).collect();
        let (mut table, replaced) = self.normalizer.normalize_table(raw, &semantics);
        report.sentinel_replacements = replaced;

        for (idx, ty) in declared.iter().enumerate() {
            let name = table.columns[idx].name.clone();
            for (row_idx, row) in table.rows.iter_mut().enumerate() {
                let value = std::mem::replace(&mut row[idx], Value::Missing(ty.semantic()));
                row[idx] = coerce(value, *ty, &name, row_idx)?;
            }
            table.columns[idx].kind = ty.kind();
        }

        for remap in &self.schema.remaps {
            let idx = table
                .column_index(&remap.column)
                .ok_or_else(|| self.schema.unknown(&remap.column))?;
            let input = table.columns[idx].kind;
            for row in table.rows.iter_mut() {
                let value = std::mem::replace(&mut row[idx], Value::Missing(input.semantic()));
                row[idx] = remap.rule.apply(&remap.column, input, value)?;
            }
            table.columns[idx].kind = remap.rule.output_kind(input);
            debug!(column = %remap.column, "Applied remap");
        }

        Ok(table)
    }

    /// Drop rows where every core field is missing. Never imputes.
    pub fn filter_core(&self, mut table: Table, report: &mut CleanReport) -> Result<Table> {
        if self.schema.core_fields.is_empty() {
            report.rows_out = table.len();
            return Ok(table);
        }
        let indices = self
            .schema
            .core_fields
            .iter()
            .map(|c| table.column_index(c).ok_or_else(|| self.schema.unknown(c)))
            .collect::<Result<Vec<_>>>()?;

        let removed = table.retain_rows(|row| indices.iter().any(|i| !row[*i].is_missing()));
        report.rows_without_core_data = removed;
        report.rows_out = table.len();
        info!(
            source_id = %self.schema.source_id,
            removed,
            kept = table.len(),
            "Dropped rows without core data"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, ColumnKind};

    fn schema() -> SourceSchema {
        SourceSchema {
            source_id: "toy".into(),
            granularity: Granularity::CountryYear,
            keys: KeyColumns {
                name: "countryname".into(),
                code: "ifs".into(),
                year: "year".into(),
            },
            sentinels: SentinelSet::default(),
            drop_columns: vec!["notes".into(), "not_in_this_release".into()],
            columns: vec![
                ColumnSpec::new("countryname", DeclaredType::Text),
                ColumnSpec::new("ifs", DeclaredType::Text),
                ColumnSpec::new("year", DeclaredType::YearFromDate),
                ColumnSpec::new("system", DeclaredType::Text),
                ColumnSpec::new("percent1", DeclaredType::Float),
            ],
            remaps: vec![Remap::new(
                "system",
                RemapRule::Boolean {
                    truthy: vec!["Presidential".into()],
                    falsy: vec!["Parliamentary".into()],
                    fallback: Fallback::Reject,
                },
            )],
            core_fields: vec!["system".into(), "percent1".into()],
        }
    }

    fn raw() -> Table {
        let columns = ["countryname", "ifs", "year", "system", "percent1", "notes"]
            .iter()
            .map(|c| Column::new(*c, ColumnKind::Text))
            .collect();
        let row = |cells: [&str; 6]| cells.iter().map(|c| Value::from_raw(c)).collect::<Vec<_>>();
        Table::new("toy", columns).with_rows(vec![
            row(["Kenya", "KEN", "2005-01-01", "Presidential", "45", "x"]),
            row(["Kenya", "KEN", "2006-01-01", "NA", "-999", ""]),
            row(["India", "IND", "2005-01-01", "Parliamentary", "NA", "y"]),
        ])
    }

    #[test]
    fn test_prepare_prunes_coerces_and_remaps() {
        let cleaner = SchemaCleaner::new(schema()).unwrap();
        let mut report = CleanReport::default();
        let table = cleaner.prepare(raw(), &mut report).unwrap();

        assert!(!table.has_column("notes"));
        assert_eq!(report.dropped_columns, vec!["notes".to_string()]);
        assert_eq!(report.absent_drop_columns, vec!["not_in_this_release".to_string()]);
        assert_eq!(table.get(0, "year"), Some(&Value::Int(2005)));
        assert_eq!(table.get(0, "system"), Some(&Value::Bool(true)));
        assert_eq!(table.get(0, "percent1"), Some(&Value::Float(45.0)));
        assert_eq!(table.get(2, "system"), Some(&Value::Bool(false)));
        assert_eq!(
            table.get(1, "system"),
            Some(&Value::Missing(SemanticType::Numeric))
        );
        let system = &table.columns[table.column_index("system").unwrap()];
        assert_eq!(system.kind, ColumnKind::Boolean);
    }

    #[test]
    fn test_filter_core_drops_rows_without_core_data() {
        let cleaner = SchemaCleaner::new(schema()).unwrap();
        let mut report = CleanReport::default();
        let table = cleaner.prepare(raw(), &mut report).unwrap();
        let table = cleaner.filter_core(table, &mut report).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(report.rows_without_core_data, 1);
        assert_eq!(report.rows_out, 2);
    }

    #[test]
    fn test_remap_on_unknown_column_is_config_error() {
        let mut bad = schema();
        bad.remaps.push(Remap::new(
            "execrlc",
            RemapRule::Range { min: 0.0, max: 1.0 },
        ));
        match SchemaCleaner::new(bad) {
            Err(PipelineError::UnknownColumn { column, .. }) => assert_eq!(column, "execrlc"),
            other => panic!("expected UnknownColumn, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_undeclared_column_is_config_error() {
        let mut bad = schema();
        bad.drop_columns.retain(|c| c != "notes");
        let cleaner = SchemaCleaner::new(bad).unwrap();
        let mut report = CleanReport::default();
        let err = cleaner.prepare(raw(), &mut report).unwrap_err();
        assert!(matches!(err, PipelineError::UndeclaredColumn { ref column, .. } if column == "notes"));
    }

    #[test]
    fn test_declared_column_absent_from_raw_is_config_error() {
        let mut bad = schema();
        bad.columns.push(ColumnSpec::new("execrlc", DeclaredType::Text));
        let cleaner = SchemaCleaner::new(bad).unwrap();
        let mut report = CleanReport::default();
        assert!(matches!(
            cleaner.prepare(raw(), &mut report),
            Err(PipelineError::UnknownColumn { .. })
        ));
    }
}
