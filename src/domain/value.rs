use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a column is measured on a numeric scale or holds category labels.
///
/// Each semantic type has its own canonical missing marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Numeric,
    Categorical,
}

/// Storage kind of a table column after cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
}

impl ColumnKind {
    pub fn semantic(self) -> SemanticType {
        match self {
            ColumnKind::Text => SemanticType::Categorical,
            _ => SemanticType::Numeric,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "integer" => Some(ColumnKind::Integer),
            "float" => Some(ColumnKind::Float),
            "boolean" => Some(ColumnKind::Boolean),
            "text" => Some(ColumnKind::Text),
            _ => None,
        }
    }
}

/// A single cell.
///
/// Raw cells are `Int`, `Float` or `Text` exactly as read. `Missing` only
/// appears once a sentinel has been normalized, and always carries the
/// semantic type of its column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Missing(SemanticType),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing(_))
    }

    /// Numeric view of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::Missing(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text used when the cell takes part in a composite key or a CSV export.
    /// Integral floats render without a fractional part so that `490.0` and
    /// `490` produce the same key fragment. Missing renders empty.
    pub fn render(&self) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Text(s) => s.trim().to_string(),
            Value::Missing(_) => String::new(),
        }
    }

    /// Parse a raw CSV cell without interpreting any sentinel.
    pub fn from_raw(cell: &str) -> Self {
        let trimmed = cell.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        if !trimmed.is_empty() {
            if let Ok(f) = trimmed.parse::<f64>() {
                if f.is_finite() {
                    return Value::Float(f);
                }
            }
        }
        Value::Text(cell.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing(SemanticType::Numeric) => write!(f, "<missing:numeric>"),
            Value::Missing(SemanticType::Categorical) => write!(f, "<missing:categorical>"),
            other => write!(f, "{}", other.render()),
        }
    }
}
