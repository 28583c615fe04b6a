use serde::{Deserialize, Serialize};

use super::value::{ColumnKind, Value};

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// An in-memory table: ordered columns and rows of cells in column order.
///
/// Every pipeline stage takes a `Table` by value and returns a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Vec<Value>>) -> Self {
        self.rows = rows;
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Cell at (`row`, `column`), if both exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Append a column, filling every existing row from `values`.
    pub fn push_column(&mut self, column: Column, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.rows.len());
        self.columns.push(column);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }

    /// Remove a column and return its cells.
    pub fn remove_column(&mut self, name: &str) -> Option<(Column, Vec<Value>)> {
        let idx = self.column_index(name)?;
        let column = self.columns.remove(idx);
        let values = self.rows.iter_mut().map(|r| r.remove(idx)).collect();
        Some((column, values))
    }

    /// Keep only rows for which `keep` returns true. Returns the number removed.
    pub fn retain_rows<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&[Value]) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(|r| keep(r));
        before - self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(
            "sample",
            vec![
                Column::new("a", ColumnKind::Integer),
                Column::new("b", ColumnKind::Text),
            ],
        )
        .with_rows(vec![
            vec![Value::Int(1), Value::text("x")],
            vec![Value::Int(2), Value::text("y")],
        ])
    }

    #[test]
    fn test_remove_and_push_column() {
        let mut table = sample();
        let (column, values) = table.remove_column("a").unwrap();
        assert_eq!(column.name, "a");
        assert_eq!(values, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(table.column_names(), vec!["b"]);

        table.push_column(column, values);
        assert_eq!(table.column_names(), vec!["b", "a"]);
        assert_eq!(table.get(1, "a"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_retain_rows_reports_removed() {
        let mut table = sample();
        let removed = table.retain_rows(|r| r[0] == Value::Int(2));
        assert_eq!(removed, 1);
        assert_eq!(table.len(), 1);
    }
}
