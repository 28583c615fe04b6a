use serde::{Deserialize, Serialize};

use crate::domain::{ColumnKind, SemanticType, Value};
use crate::error::{PipelineError, Result};

/// What a remap does with a value its rule does not list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Uncovered values become the canonical missing marker.
    #[default]
    Missing,
    /// Uncovered values are a data-integrity error.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdinalLevel {
    pub label: String,
    pub score: i64,
}

/// A codebook correction applied to every cell of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RemapRule {
    /// Flag codes that mean "not measured" become missing.
    ToMissing { values: Vec<f64> },
    /// Numeric values outside `[min, max]` become missing.
    Range { min: f64, max: f64 },
    /// Collapse a categorical into a boolean.
    Boolean {
        truthy: Vec<String>,
        falsy: Vec<String>,
        #[serde(default)]
        fallback: Fallback,
    },
    /// Recode textual categories to ordinal scores.
    Ordinal {
        levels: Vec<OrdinalLevel>,
        #[serde(default)]
        fallback: Fallback,
    },
    /// Fix one category spelling.
    Rename { from: String, to: String },
}

/// A rule bound to the column it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remap {
    pub column: String,
    #[serde(flatten)]
    pub rule: RemapRule,
}

impl Remap {
    pub fn new(column: &str, rule: RemapRule) -> Self {
        Self {
            column: column.to_string(),
            rule,
        }
    }
}

impl RemapRule {
    /// Kind of the column after this rule has run.
    pub fn output_kind(&self, input: ColumnKind) -> ColumnKind {
        match self {
            RemapRule::ToMissing { .. } | RemapRule::Range { .. } | RemapRule::Rename { .. } => input,
            RemapRule::Boolean { .. } => ColumnKind::Boolean,
            RemapRule::Ordinal { .. } => ColumnKind::Integer,
        }
    }

    fn uncovered(fallback: Fallback, column: &str, value: &Value, out: SemanticType) -> Result<Value> {
        match fallback {
            Fallback::Missing => Ok(Value::Missing(out)),
            Fallback::Reject => Err(PipelineError::UnmappedCategory {
                column: column.to_string(),
                value: value.render(),
            }),
        }
    }

    /// Apply the rule to one cell. Defined for every input: missing stays
    /// missing (retyped to the output kind), listed values are mapped, and
    /// anything else follows the rule's fallback.
    pub fn apply(&self, column: &str, input: ColumnKind, value: Value) -> Result<Value> {
        let out = self.output_kind(input).semantic();
        if value.is_missing() {
            return Ok(Value::Missing(out));
        }

        match self {
            RemapRule::ToMissing { values } => {
                let hit = value.as_f64().map(|x| values.contains(&x)).unwrap_or(false);
                Ok(if hit { Value::Missing(out) } else { value })
            }
            RemapRule::Range { min, max } => match value.as_f64() {
                Some(x) if x >= *min && x <= *max => Ok(value),
                _ => Ok(Value::Missing(out)),
            },
            RemapRule::Boolean {
                truthy,
                falsy,
                fallback,
            } => {
                let label = value.render();
                if truthy.iter().any(|t| *t == label) {
                    Ok(Value::Bool(true))
                } else if falsy.iter().any(|f| *f == label) {
                    Ok(Value::Bool(false))
                } else {
                    Self::uncovered(*fallback, column, &value, out)
                }
            }
            RemapRule::Ordinal { levels, fallback } => {
                let label = value.render();
                match levels.iter().find(|l| l.label == label) {
                    Some(level) => Ok(Value::Int(level.score)),
                    None => Self::uncovered(*fallback, column, &value, out),
                }
            }
            RemapRule::Rename { from, to } => match value {
                Value::Text(ref s) if s == from => Ok(Value::Text(to.clone())),
                other => Ok(other),
            },
        }
    }
}
