// Pipeline storage: persisted intermediate tables in a local SQLite database

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::{Null, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{Column, ColumnKind, Table, Value};
use crate::error::{PipelineError, Result};
use crate::metrics::StoreMetrics;

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{0,62}$").expect("static regex"));

const MANIFEST_TABLE: &str = "_table_manifest";
const COLUMNS_TABLE: &str = "_table_columns";

/// Bookkeeping row written alongside every persisted table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestEntry {
    pub name: String,
    pub row_count: usize,
    pub column_count: usize,
    /// SHA-256 over column names, kinds and every cell.
    pub fingerprint: String,
    pub run_id: String,
    pub written_at: DateTime<Utc>,
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Int(i) => ToSqlOutput::from(*i),
            Value::Float(f) => ToSqlOutput::from(*f),
            Value::Bool(b) => ToSqlOutput::from(*b),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Missing(_) => ToSqlOutput::from(Null),
        })
    }
}

fn sql_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Integer | ColumnKind::Boolean => "INTEGER",
        ColumnKind::Float => "REAL",
        ColumnKind::Text => "TEXT",
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn validate_name(name: &str) -> Result<()> {
    if TABLE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(PipelineError::InvalidTableName(name.to_string()))
    }
}

/// Content fingerprint of a table. Missing cells hash differently from empty
/// text.
pub fn fingerprint(table: &Table) -> String {
    let mut hasher = Sha256::new();
    for column in &table.columns {
        hasher.update(column.name.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(column.kind.as_str().as_bytes());
        hasher.update(b"\x1e");
    }
    for row in &table.rows {
        for cell in row {
            match cell {
                Value::Missing(_) => hasher.update(b"\x00"),
                other => hasher.update(other.render().as_bytes()),
            }
            hasher.update(b"\x1f");
        }
        hasher.update(b"\x1e");
    }
    hex::encode(hasher.finalize())
}

fn read_cell(cell: ValueRef<'_>, kind: ColumnKind) -> Result<Value> {
    Ok(match (cell, kind) {
        (ValueRef::Null, kind) => Value::Missing(kind.semantic()),
        (ValueRef::Integer(i), ColumnKind::Boolean) => Value::Bool(i != 0),
        (ValueRef::Integer(i), ColumnKind::Float) => Value::Float(i as f64),
        (ValueRef::Integer(i), _) => Value::Int(i),
        (ValueRef::Real(f), _) => Value::Float(f),
        (ValueRef::Text(t), _) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        (ValueRef::Blob(_), kind) => {
            return Err(PipelineError::Config(format!(
                "Unexpected blob in {} column",
                kind.as_str()
            )))
        }
    })
}

/// SQLite-backed store for cleaned, joined and analysis tables.
///
/// Each write replaces the table and its manifest row inside one
/// transaction, so readers never observe a partial table.
pub struct TableStore {
    conn: Connection,
    run_id: String,
}

impl TableStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS _table_manifest (
                name          TEXT PRIMARY KEY,
                row_count     INTEGER NOT NULL,
                column_count  INTEGER NOT NULL,
                fingerprint   TEXT NOT NULL,
                run_id        TEXT NOT NULL,
                written_at    TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS _table_columns (
                table_name  TEXT NOT NULL,
                position    INTEGER NOT NULL,
                name        TEXT NOT NULL,
                kind        TEXT NOT NULL,
                PRIMARY KEY (table_name, position)
            );
            "#,
        )?;
        Ok(Self {
            conn,
            run_id: Uuid::new_v4().to_string(),
        })
    }

    /// Identifier stamped on every table written through this handle
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Atomically replace `table.name` with the contents of `table`.
    pub fn write_table(&mut self, table: &Table) -> Result<ManifestEntry> {
        let mut entries = self.write_tables(&[table])?;
        entries
            .pop()
            .ok_or_else(|| PipelineError::Config(format!("Table '{}' was not written", table.name)))
    }

    /// Replace several tables in one transaction: either all of them are
    /// published or none is.
    #[instrument(skip(self, tables), fields(tables = tables.len()))]
    pub fn write_tables(&mut self, tables: &[&Table]) -> Result<Vec<ManifestEntry>> {
        let mut entries = Vec::with_capacity(tables.len());
        for table in tables {
            validate_name(&table.name)?;
            if table.columns.is_empty() {
                return Err(PipelineError::Config(format!("Table '{}' has no columns", table.name)));
            }
            entries.push(ManifestEntry {
                name: table.name.clone(),
                row_count: table.len(),
                column_count: table.columns.len(),
                fingerprint: fingerprint(table),
                run_id: self.run_id.clone(),
                written_at: Utc::now(),
            });
        }

        let tx = self.conn.transaction()?;
        for (table, entry) in tables.iter().zip(&entries) {
            Self::replace(&tx, table, entry)?;
        }
        tx.commit()?;

        for entry in &entries {
            StoreMetrics::record_write(&entry.name, entry.row_count);
            info!(table = %entry.name, rows = entry.row_count, fingerprint = %entry.fingerprint, "Table written");
        }
        Ok(entries)
    }

    fn replace(conn: &Connection, table: &Table, entry: &ManifestEntry) -> Result<()> {
        let name = quote(&table.name);
        let definition = table
            .columns
            .iter()
            .map(|c| format!("{} {}", quote(&c.name), sql_type(c.kind)))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=table.columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");

        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {name}; CREATE TABLE {name} ({definition});"
        ))?;
        let mut insert = conn.prepare(&format!("INSERT INTO {name} VALUES ({placeholders})"))?;
        for row in &table.rows {
            insert.execute(params_from_iter(row.iter()))?;
        }

        conn.execute(
            &format!("DELETE FROM {COLUMNS_TABLE} WHERE table_name = ?1"),
            params![table.name],
        )?;
        let mut column = conn.prepare(&format!(
            "INSERT INTO {COLUMNS_TABLE} (table_name, position, name, kind) VALUES (?1, ?2, ?3, ?4)"
        ))?;
        for (position, c) in table.columns.iter().enumerate() {
            column.execute(params![table.name, position as i64, c.name, c.kind.as_str()])?;
        }

        conn.execute(
            &format!(
                "INSERT INTO {MANIFEST_TABLE} (name, row_count, column_count, fingerprint, run_id, written_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(name) DO UPDATE SET row_count=excluded.row_count,
                    column_count=excluded.column_count, fingerprint=excluded.fingerprint,
                    run_id=excluded.run_id, written_at=excluded.written_at"
            ),
            params![
                entry.name,
                entry.row_count as i64,
                entry.column_count as i64,
                entry.fingerprint,
                entry.run_id,
                entry.written_at.to_rfc3339()
            ],
        )?;
        debug!(table = %entry.name, "Table replaced");
        Ok(())
    }

    fn columns_of(&self, name: &str) -> Result<Vec<Column>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT name, kind FROM {COLUMNS_TABLE} WHERE table_name = ?1 ORDER BY position"
        ))?;
        let mut rows = stmt.query(params![name])?;
        let mut columns = Vec::new();
        while let Some(row) = rows.next()? {
            let column: String = row.get(0)?;
            let kind: String = row.get(1)?;
            let kind = ColumnKind::parse(&kind).ok_or_else(|| {
                PipelineError::Config(format!("Unknown column kind '{}' for {}.{}", kind, name, column))
            })?;
            columns.push(Column::new(column, kind));
        }
        Ok(columns)
    }

    /// Read a persisted table back with its declared column kinds.
    pub fn read_table(&self, name: &str) -> Result<Table> {
        validate_name(name)?;
        let columns = self.columns_of(name)?;
        if columns.is_empty() {
            return Err(PipelineError::Config(format!("Table '{}' is not in the store", name)));
        }

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} ORDER BY rowid", quote(name)))?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let cells = columns
                .iter()
                .enumerate()
                .map(|(i, c)| read_cell(row.get_ref(i)?, c.kind))
                .collect::<Result<Vec<_>>>()?;
            out.push(cells);
        }
        debug!(table = name, rows = out.len(), "Table read");
        Ok(Table::new(name, columns).with_rows(out))
    }

    pub fn has_table(&self, name: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT 1 FROM {MANIFEST_TABLE} WHERE name = ?1"))?;
        Ok(stmt.exists(params![name])?)
    }

    /// Every manifest row, ordered by table name.
    pub fn manifest(&self) -> Result<Vec<ManifestEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT name, row_count, column_count, fingerprint, run_id, written_at
             FROM {MANIFEST_TABLE} ORDER BY name"
        ))?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let written_at: String = row.get(5)?;
            let written_at = DateTime::parse_from_rfc3339(&written_at)
                .map_err(|e| PipelineError::Config(format!("Bad manifest timestamp: {}", e)))?
                .with_timezone(&Utc);
            entries.push(ManifestEntry {
                name: row.get(0)?,
                row_count: row.get::<_, i64>(1)? as usize,
                column_count: row.get::<_, i64>(2)? as usize,
                fingerprint: row.get(3)?,
                run_id: row.get(4)?,
                written_at,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SemanticType;

    fn sample() -> Table {
        Table::new(
            "clean_dpi",
            vec![
                Column::new("join_key", ColumnKind::Text),
                Column::new("year", ColumnKind::Integer),
                Column::new("percent1", ColumnKind::Float),
                Column::new("system", ColumnKind::Boolean),
                Column::new("region", ColumnKind::Text),
            ],
        )
        .with_rows(vec![
            vec![
                Value::text("2005_KEN"),
                Value::Int(2005),
                Value::Float(45.0),
                Value::Bool(true),
                Value::text(""),
            ],
            vec![
                Value::text("2005_ZAI"),
                Value::Int(2005),
                Value::Missing(SemanticType::Numeric),
                Value::Missing(SemanticType::Numeric),
                Value::Missing(SemanticType::Categorical),
            ],
        ])
    }

    #[test]
    fn test_write_then_read_is_identical() {
        let mut store = TableStore::open_in_memory().unwrap();
        let table = sample();
        store.write_table(&table).unwrap();
        assert_eq!(store.read_table("clean_dpi").unwrap(), table);
    }

    #[test]
    fn test_rewrite_replaces_contents_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TableStore::open(dir.path().join("pipeline.db")).unwrap();
        let first = store.write_table(&sample()).unwrap();

        let mut smaller = sample();
        smaller.rows.truncate(1);
        let second = store.write_table(&smaller).unwrap();

        assert_eq!(store.read_table("clean_dpi").unwrap(), smaller);
        assert_ne!(first.fingerprint, second.fingerprint);
        let manifest = store.manifest().unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest[0].row_count, 1);
        assert_eq!(manifest[0].run_id, store.run_id());
    }

    #[test]
    fn test_fingerprint_distinguishes_missing_from_empty() {
        let mut other = sample();
        other.rows[0][4] = Value::Missing(SemanticType::Categorical);
        assert_ne!(fingerprint(&sample()), fingerprint(&other));
    }

    #[test]
    fn test_invalid_table_name_is_rejected() {
        let mut store = TableStore::open_in_memory().unwrap();
        let mut table = sample();
        table.name = "clean; DROP TABLE x".into();
        assert!(matches!(store.write_table(&table), Err(PipelineError::InvalidTableName(_))));
        assert!(!store.has_table("clean_dpi").unwrap());
    }

    #[test]
    fn test_reading_unknown_table_fails() {
        let store = TableStore::open_in_memory().unwrap();
        assert!(store.read_table("joined").is_err());
    }

    #[test]
    fn test_failed_batch_publishes_no_table() {
        let mut store = TableStore::open_in_memory().unwrap();
        let broken = Table::new(
            "unmapped_dpi",
            vec![
                Column::new("raw_key", ColumnKind::Text),
                Column::new("raw_key", ColumnKind::Text),
            ],
        );
        assert!(store.write_tables(&[&sample(), &broken]).is_err());
        assert!(!store.has_table("clean_dpi").unwrap());
        assert!(store.manifest().unwrap().is_empty());

        let audit = Table::new("unmapped_dpi", vec![Column::new("raw_key", ColumnKind::Text)]);
        let entries = store.write_tables(&[&sample(), &audit]).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(store.manifest().unwrap().len(), 2);
    }
}
