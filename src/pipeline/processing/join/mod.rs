//! Relational join of the cleaned source tables on the canonical join key.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{info, instrument, warn};

use crate::constants::{IDENTITY_COLUMNS, IGNORE, JOIN_KEY_COLUMN};
use crate::domain::{Column, Table, Value};
use crate::error::{PipelineError, Result};
use crate::metrics::JoinMetrics;
use crate::pipeline::processing::schema::Granularity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    #[default]
    Inner,
    /// Keep every anchor row; absent sources contribute missing cells.
    LeftOuter,
}

/// A cleaned table together with how many rows it may hold per key.
#[derive(Debug, Clone)]
pub struct KeyedTable {
    pub table: Table,
    pub granularity: Granularity,
}

impl KeyedTable {
    pub fn new(table: Table, granularity: Granularity) -> Self {
        Self { table, granularity }
    }
}

/// Rows excluded per input because their key was `ignore` or missing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JoinReport {
    pub excluded: BTreeMap<String, usize>,
    pub rows_out: usize,
}

struct Indexed {
    keyed: KeyedTable,
    key_idx: usize,
    index: HashMap<String, Vec<usize>>,
    /// Non-identity columns contributed to the output.
    payload: Vec<usize>,
}

pub struct DatasetJoiner {
    mode: JoinMode,
}

impl DatasetJoiner {
    pub fn new(mode: JoinMode) -> Self {
        Self { mode }
    }

    fn index(keyed: KeyedTable, report: &mut JoinReport) -> Result<Indexed> {
        let table = &keyed.table;
        let key_idx = table
            .column_index(JOIN_KEY_COLUMN)
            .ok_or_else(|| PipelineError::UnknownColumn {
                source_id: table.name.clone(),
                column: JOIN_KEY_COLUMN.to_string(),
            })?;

        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        let mut excluded = 0usize;
        for (i, row) in table.rows.iter().enumerate() {
            let key = match &row[key_idx] {
                Value::Text(k) if k != IGNORE && !k.is_empty() => k.clone(),
                _ => {
                    excluded += 1;
                    continue;
                }
            };
            let slot = index.entry(key).or_default();
            if keyed.granularity == Granularity::CountryYear && !slot.is_empty() {
                JoinMetrics::record_duplicate_key();
                return Err(PipelineError::DuplicateJoinKey {
                    table: table.name.clone(),
                    key: match &row[key_idx] {
                        Value::Text(k) => k.clone(),
                        other => other.render(),
                    },
                });
            }
            slot.push(i);
        }
        if excluded > 0 {
            JoinMetrics::record_excluded(&table.name, excluded);
        }
        report.excluded.insert(table.name.clone(), excluded);

        let payload = table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !IDENTITY_COLUMNS.contains(&c.name.as_str()))
            .map(|(i, _)| i)
            .collect();
        Ok(Indexed {
            keyed,
            key_idx,
            index,
            payload,
        })
    }

    /// Join `tables` on `join_key`. The event-grained table, if any, anchors
    /// the join; otherwise the first table does. Output rows are ordered by
    /// key, then by anchor row order.
    #[instrument(skip(self, tables), fields(mode = ?self.mode, inputs = tables.len()))]
    pub fn join(&self, tables: Vec<KeyedTable>, name: &str) -> Result<(Table, JoinReport)> {
        if tables.is_empty() {
            return Err(PipelineError::Config("Join needs at least one table".into()));
        }
        let event_tables = tables
            .iter()
            .filter(|t| t.granularity == Granularity::Event)
            .count();
        if event_tables > 1 {
            return Err(PipelineError::Config(format!(
                "At most one event-grained table can be joined, found {}",
                event_tables
            )));
        }

        let mut tables = tables;
        if let Some(pos) = tables.iter().position(|t| t.granularity == Granularity::Event) {
            let anchor = tables.remove(pos);
            tables.insert(0, anchor);
        }

        let mut report = JoinReport::default();
        let indexed = tables
            .into_iter()
            .map(|t| Self::index(t, &mut report))
            .collect::<Result<Vec<_>>>()?;

        let mut owners: HashMap<&str, &str> = HashMap::new();
        let anchor = &indexed[0];
        let anchor_table = &anchor.keyed.table;
        let identity: Vec<usize> = IDENTITY_COLUMNS
            .iter()
            .map(|c| {
                anchor_table
                    .column_index(c)
                    .ok_or_else(|| PipelineError::UnknownColumn {
                        source_id: anchor_table.name.clone(),
                        column: c.to_string(),
                    })
            })
            .collect::<Result<_>>()?;

        let mut columns: Vec<Column> = identity.iter().map(|i| anchor_table.columns[*i].clone()).collect();
        for t in &indexed {
            for i in &t.payload {
                let column = &t.keyed.table.columns[*i];
                if let Some(owner) = owners.insert(column.name.as_str(), t.keyed.table.name.as_str()) {
                    return Err(PipelineError::ColumnCollision {
                        column: column.name.clone(),
                        left: owner.to_string(),
                        right: t.keyed.table.name.clone(),
                    });
                }
                columns.push(column.clone());
            }
        }

        let keys: BTreeSet<&String> = anchor.index.keys().collect();
        let mut rows = Vec::new();
        for key in keys {
            let others: Vec<Option<usize>> = indexed[1..]
                .iter()
                .map(|t| t.index.get(key.as_str()).map(|rows| rows[0]))
                .collect();
            if self.mode == JoinMode::Inner && others.iter().any(|o| o.is_none()) {
                continue;
            }
            for anchor_row in &anchor.index[key.as_str()] {
                let source = &anchor.keyed.table.rows[*anchor_row];
                let mut row: Vec<Value> = identity.iter().map(|i| source[*i].clone()).collect();
                row.extend(anchor.payload.iter().map(|i| source[*i].clone()));
                for (t, hit) in indexed[1..].iter().zip(&others) {
                    match hit {
                        Some(r) => {
                            let other = &t.keyed.table.rows[*r];
                            debug_assert_eq!(other[t.key_idx], source[anchor.key_idx]);
                            row.extend(t.payload.iter().map(|i| other[*i].clone()));
                        }
                        None => row.extend(
                            t.payload
                                .iter()
                                .map(|i| Value::Missing(t.keyed.table.columns[*i].kind.semantic())),
                        ),
                    }
                }
                rows.push(row);
            }
        }

        report.rows_out = rows.len();
        JoinMetrics::record_output(rows.len());
        for (table, excluded) in &report.excluded {
            if *excluded > 0 {
                warn!(table = %table, excluded, "Rows excluded from join by ignore key");
            }
        }
        info!(rows = rows.len(), columns = columns.len(), "Join complete");
        Ok((Table::new(name, columns).with_rows(rows), report))
    }
}
