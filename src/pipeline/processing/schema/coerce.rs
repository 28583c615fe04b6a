use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::{ColumnKind, SemanticType, Value};
use crate::error::{PipelineError, Result};

/// Type a source column is declared with before cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredType {
    Integer,
    Float,
    Boolean,
    Text,
    /// A calendar date (or a bare year) reduced to its integer year.
    YearFromDate,
}

impl DeclaredType {
    pub fn kind(self) -> ColumnKind {
        match self {
            DeclaredType::Integer | DeclaredType::YearFromDate => ColumnKind::Integer,
            DeclaredType::Float => ColumnKind::Float,
            DeclaredType::Boolean => ColumnKind::Boolean,
            DeclaredType::Text => ColumnKind::Text,
        }
    }

    pub fn semantic(self) -> SemanticType {
        self.kind().semantic()
    }
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d%b%Y", "%m/%d/%Y", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

fn parse_year(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(y) = s.parse::<i64>() {
        return Some(y);
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.year() as i64);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.year() as i64);
        }
    }
    None
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "yes" => Some(true),
        "0" | "0.0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Coerce a sentinel-normalized cell to its declared type.
///
/// Missing values pass through with the declared semantic type. Anything
/// that cannot be represented in the declared type is an error.
pub fn coerce(value: Value, ty: DeclaredType, column: &str, row: usize) -> Result<Value> {
    let fail = |v: &Value| PipelineError::TypeCoercion {
        column: column.to_string(),
        row,
        value: v.render(),
        expected: ty.kind().as_str().to_string(),
    };

    let coerced = match (&value, ty) {
        (Value::Missing(_), _) => Some(Value::Missing(ty.semantic())),

        (Value::Int(i), DeclaredType::Integer | DeclaredType::YearFromDate) => Some(Value::Int(*i)),
        (Value::Float(f), DeclaredType::Integer | DeclaredType::YearFromDate) => {
            (f.fract() == 0.0).then(|| Value::Int(*f as i64))
        }
        (Value::Bool(b), DeclaredType::Integer) => Some(Value::Int(*b as i64)),
        (Value::Text(s), DeclaredType::Integer) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| {
                s.trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| f as i64)
            })
            .map(Value::Int),
        (Value::Text(s), DeclaredType::YearFromDate) => parse_year(s).map(Value::Int),

        (Value::Int(i), DeclaredType::Float) => Some(Value::Float(*i as f64)),
        (Value::Float(f), DeclaredType::Float) => Some(Value::Float(*f)),
        (Value::Bool(b), DeclaredType::Float) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),
        (Value::Text(s), DeclaredType::Float) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Float),

        (Value::Bool(b), DeclaredType::Boolean) => Some(Value::Bool(*b)),
        (Value::Int(0), DeclaredType::Boolean) => Some(Value::Bool(false)),
        (Value::Int(1), DeclaredType::Boolean) => Some(Value::Bool(true)),
        (Value::Float(f), DeclaredType::Boolean) if *f == 0.0 || *f == 1.0 => {
            Some(Value::Bool(*f == 1.0))
        }
        (Value::Text(s), DeclaredType::Boolean) => parse_bool(s).map(Value::Bool),

        (Value::Text(s), DeclaredType::Text) => Some(Value::Text(s.trim().to_string())),
        (other, DeclaredType::Text) => Some(Value::Text(other.render())),

        _ => None,
    };

    coerced.ok_or_else(|| fail(&value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_to_year() {
        let c = |s: &str| coerce(Value::text(s), DeclaredType::YearFromDate, "year", 0).unwrap();
        assert_eq!(c("1975-01-01"), Value::Int(1975));
        assert_eq!(c("2005-01-01 00:00:00"), Value::Int(2005));
        assert_eq!(c("01jan1999"), Value::Int(1999));
        assert_eq!(c("2017"), Value::Int(2017));
    }

    #[test]
    fn test_numeric_looking_text_to_float() {
        let v = coerce(Value::text(" 45.5 "), DeclaredType::Float, "percent1", 3).unwrap();
        assert_eq!(v, Value::Float(45.5));
        let v = coerce(Value::Int(12), DeclaredType::Float, "percent1", 3).unwrap();
        assert_eq!(v, Value::Float(12.0));
    }

    #[test]
    fn test_integral_float_to_integer() {
        let v = coerce(Value::Float(1990.0), DeclaredType::Integer, "startyear", 0).unwrap();
        assert_eq!(v, Value::Int(1990));
        assert!(coerce(Value::Float(1.5), DeclaredType::Integer, "startyear", 0).is_err());
    }

    #[test]
    fn test_boolean_rejects_other_codes() {
        assert_eq!(
            coerce(Value::Int(1), DeclaredType::Boolean, "military", 0).unwrap(),
            Value::Bool(true)
        );
        let err = coerce(Value::Int(2), DeclaredType::Boolean, "military", 7).unwrap_err();
        match err {
            PipelineError::TypeCoercion { column, row, .. } => {
                assert_eq!(column, "military");
                assert_eq!(row, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_takes_declared_semantic() {
        let v = coerce(
            Value::Missing(SemanticType::Numeric),
            DeclaredType::Text,
            "region",
            0,
        )
        .unwrap();
        assert_eq!(v, Value::Missing(SemanticType::Categorical));
    }
}
