//! Post-join feature engineering and the bucket reconciliation check.

pub mod catalog;
pub mod transforms;

use std::collections::HashSet;
use tracing::{debug, info, instrument};

use crate::domain::{Column, ColumnKind, SemanticType, Table, Value};
use crate::error::{PipelineError, Result};
use crate::metrics::FeatureMetrics;

pub use catalog::{FeatureCatalog, FeatureStep};
pub use transforms::{coalesce, inverse_rescale_percent, log1p_clamped, rescale_percent};

pub struct FeatureEngineer {
    catalog: FeatureCatalog,
}

fn require(table: &Table, column: &str) -> Result<usize> {
    table
        .column_index(column)
        .ok_or_else(|| PipelineError::MissingFeatureColumns {
            columns: vec![column.to_string()],
        })
}

fn numeric_input(column: &str, row: usize, value: &Value) -> PipelineError {
    PipelineError::TypeCoercion {
        column: column.to_string(),
        row,
        value: value.render(),
        expected: "numeric".to_string(),
    }
}

impl FeatureEngineer {
    pub fn new(catalog: FeatureCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &FeatureCatalog {
        &self.catalog
    }

    fn apply_step(&self, table: &mut Table, step: &FeatureStep) -> Result<()> {
        match step {
            FeatureStep::Coalesce { first, last, into } => {
                let (fi, li) = (require(table, first)?, require(table, last)?);
                let kind = table.columns[li].kind;
                let values = table.rows.iter().map(|r| coalesce(&r[fi], &r[li])).collect();
                table.push_column(Column::new(into.as_str(), kind), values);
            }
            FeatureStep::RescalePercent { column } => {
                let idx = require(table, column)?;
                for (i, row) in table.rows.iter_mut().enumerate() {
                    row[idx] =
                        rescale_percent(&row[idx]).ok_or_else(|| numeric_input(column, i, &row[idx]))?;
                }
                table.columns[idx].kind = ColumnKind::Float;
            }
            FeatureStep::Log1p { column, into } => {
                let idx = require(table, column)?;
                let mut clamped = 0usize;
                let mut values = Vec::with_capacity(table.len());
                for (i, row) in table.rows.iter().enumerate() {
                    let (value, was_clamped) =
                        log1p_clamped(&row[idx]).ok_or_else(|| numeric_input(column, i, &row[idx]))?;
                    clamped += was_clamped as usize;
                    values.push(value);
                }
                if clamped > 0 {
                    FeatureMetrics::record_clamped(column, clamped);
                }
                table.push_column(Column::new(into.as_str(), ColumnKind::Float), values);
            }
            FeatureStep::Target { from, into } => {
                let (column, values) = table
                    .remove_column(from)
                    .ok_or_else(|| PipelineError::MissingFeatureColumns {
                        columns: vec![from.clone()],
                    })?;
                if column.kind != ColumnKind::Boolean {
                    return Err(PipelineError::Config(format!(
                        "Target source column '{}' must be boolean, found {}",
                        from,
                        column.kind.as_str()
                    )));
                }
                table.push_column(Column::new(into.as_str(), ColumnKind::Boolean), values);
            }
        }
        FeatureMetrics::record_step(step.name());
        debug!(step = step.name(), "Applied feature step");
        Ok(())
    }

    /// Run every catalog step over the joined table, drop identity and
    /// consumed columns, order the rest by bucket and reconcile.
    #[instrument(skip(self, joined), fields(rows = joined.len()))]
    pub fn engineer(&self, mut joined: Table, name: &str) -> Result<Table> {
        for step in &self.catalog.steps {
            self.apply_step(&mut joined, step)?;
        }
        for column in &self.catalog.drop {
            joined.remove_column(column);
        }

        self.reconcile(&joined)?;

        let order: Vec<usize> = self
            .catalog
            .bucketed_columns()
            .iter()
            .filter_map(|c| joined.column_index(c))
            .collect();
        let columns = order.iter().map(|i| joined.columns[*i].clone()).collect();
        let rows = joined
            .rows
            .into_iter()
            .map(|row| {
                let mut row: Vec<Option<Value>> = row.into_iter().map(Some).collect();
                order
                    .iter()
                    .map(|i| row[*i].take().unwrap_or(Value::Missing(SemanticType::Numeric)))
                    .collect()
            })
            .collect();
        let analysis = Table::new(name, columns).with_rows(rows);
        info!(
            rows = analysis.len(),
            columns = analysis.columns.len(),
            "Feature engineering complete"
        );
        Ok(analysis)
    }

    /// Fail unless the table's columns are exactly the catalog's buckets.
    pub fn reconcile(&self, table: &Table) -> Result<()> {
        let expected: HashSet<&str> = self.catalog.bucketed_columns().into_iter().collect();
        let actual: HashSet<&str> = table.column_names().into_iter().collect();

        let mut unbucketed: Vec<String> = actual.difference(&expected).map(|s| s.to_string()).collect();
        if !unbucketed.is_empty() {
            unbucketed.sort();
            FeatureMetrics::record_reconcile_failure();
            return Err(PipelineError::UnbucketedColumns { columns: unbucketed });
        }
        let mut absent: Vec<String> = expected.difference(&actual).map(|s| s.to_string()).collect();
        if !absent.is_empty() {
            absent.sort();
            FeatureMetrics::record_reconcile_failure();
            return Err(PipelineError::MissingFeatureColumns { columns: absent });
        }
        Ok(())
    }
}
