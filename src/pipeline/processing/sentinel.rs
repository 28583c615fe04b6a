use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{SemanticType, Table, Value};

/// Placeholder values one source uses to mean "missing".
///
/// Numeric sentinels match integer, float and numeric-looking text cells.
/// Text sentinels are compared against the trimmed cell text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentinelSet {
    #[serde(default)]
    pub numeric: Vec<f64>,
    #[serde(default)]
    pub text: Vec<String>,
}

impl Default for SentinelSet {
    fn default() -> Self {
        Self {
            numeric: vec![-999.0],
            text: vec!["-999".to_string(), "NA".to_string(), String::new()],
        }
    }
}

/// Replaces configured placeholders with the canonical missing marker of the
/// column's semantic type.
#[derive(Debug, Clone)]
pub struct SentinelNormalizer {
    sentinels: SentinelSet,
}

impl SentinelNormalizer {
    pub fn new(sentinels: SentinelSet) -> Self {
        Self { sentinels }
    }

    fn is_numeric_sentinel(&self, x: f64) -> bool {
        self.sentinels.numeric.iter().any(|s| *s == x)
    }

    /// Normalize one cell. Values that are not placeholders are returned as-is,
    /// including real zeros and non-sentinel text.
    pub fn normalize_value(&self, value: Value, semantic: SemanticType) -> Value {
        match value {
            Value::Int(i) if self.is_numeric_sentinel(i as f64) => Value::Missing(semantic),
            Value::Float(f) if self.is_numeric_sentinel(f) => Value::Missing(semantic),
            Value::Text(ref s) => {
                let trimmed = s.trim();
                let text_hit = self.sentinels.text.iter().any(|t| t == trimmed);
                let numeric_hit = trimmed
                    .parse::<f64>()
                    .map(|f| self.is_numeric_sentinel(f))
                    .unwrap_or(false);
                if text_hit || numeric_hit {
                    Value::Missing(semantic)
                } else {
                    value
                }
            }
            Value::Missing(_) => Value::Missing(semantic),
            other => other,
        }
    }

    /// Normalize every cell of `table` against the declared semantic type of
    /// its column. Returns the table and the number of cells replaced.
    pub fn normalize_table(&self, mut table: Table, semantics: &[SemanticType]) -> (Table, usize) {
        debug_assert_eq!(semantics.len(), table.columns.len());
        let mut replaced = 0usize;
        for row in table.rows.iter_mut() {
            for (cell, semantic) in row.iter_mut().zip(semantics) {
                let was_missing = cell.is_missing();
                let value = std::mem::replace(cell, Value::Missing(*semantic));
                *cell = self.normalize_value(value, *semantic);
                if !was_missing && cell.is_missing() {
                    replaced += 1;
                }
            }
        }
        debug!(table = %table.name, replaced, "Normalized sentinel values");
        (table, replaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, ColumnKind};

    fn normalizer() -> SentinelNormalizer {
        SentinelNormalizer::new(SentinelSet::default())
    }

    #[test]
    fn test_numeric_placeholders_become_numeric_missing() {
        let n = normalizer();
        let missing = Value::Missing(SemanticType::Numeric);
        assert_eq!(n.normalize_value(Value::Int(-999), SemanticType::Numeric), missing);
        assert_eq!(n.normalize_value(Value::Float(-999.0), SemanticType::Numeric), missing);
        assert_eq!(n.normalize_value(Value::text("-999"), SemanticType::Numeric), missing);
        assert_eq!(n.normalize_value(Value::text("-999.0"), SemanticType::Numeric), missing);
        assert_eq!(n.normalize_value(Value::text("NA"), SemanticType::Numeric), missing);
    }

    #[test]
    fn test_text_placeholders_become_categorical_missing() {
        let n = normalizer();
        let missing = Value::Missing(SemanticType::Categorical);
        assert_eq!(n.normalize_value(Value::text(""), SemanticType::Categorical), missing);
        assert_eq!(n.normalize_value(Value::text(" NA "), SemanticType::Categorical), missing);
        assert_eq!(n.normalize_value(Value::Int(-999), SemanticType::Categorical), missing);
    }

    #[test]
    fn test_real_zero_and_text_preserved() {
        let n = normalizer();
        assert_eq!(n.normalize_value(Value::Int(0), SemanticType::Numeric), Value::Int(0));
        assert_eq!(n.normalize_value(Value::Float(0.0), SemanticType::Numeric), Value::Float(0.0));
        assert_eq!(
            n.normalize_value(Value::text("Namibia"), SemanticType::Categorical),
            Value::text("Namibia")
        );
        assert_eq!(n.normalize_value(Value::Int(-99), SemanticType::Numeric), Value::Int(-99));
    }

    #[test]
    fn test_normalize_table_is_idempotent() {
        let table = Table::new(
            "t",
            vec![
                Column::new("percent1", ColumnKind::Float),
                Column::new("system", ColumnKind::Text),
            ],
        )
        .with_rows(vec![
            vec![Value::Float(45.0), Value::text("Presidential")],
            vec![Value::Float(-999.0), Value::text("NA")],
            vec![Value::Int(0), Value::text("")],
        ]);
        let semantics = vec![SemanticType::Numeric, SemanticType::Categorical];

        let n = normalizer();
        let (once, replaced) = n.normalize_table(table, &semantics);
        assert_eq!(replaced, 3);
        let (twice, replaced_again) = n.normalize_table(once.clone(), &semantics);
        assert_eq!(replaced_again, 0);
        assert_eq!(once, twice);
    }
}
