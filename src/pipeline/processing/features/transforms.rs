use crate::domain::{SemanticType, Value};

/// `last` unless it is missing, then `first`, then missing.
pub fn coalesce(first: &Value, last: &Value) -> Value {
    if !last.is_missing() {
        last.clone()
    } else if !first.is_missing() {
        first.clone()
    } else {
        Value::Missing(SemanticType::Numeric)
    }
}

/// Map a percentage in `[0, 100]` to `[0, 1]`. The missing marker passes
/// through untouched; non-numeric cells have no rescaled value.
pub fn rescale_percent(value: &Value) -> Option<Value> {
    match value {
        Value::Missing(s) => Some(Value::Missing(*s)),
        other => other.as_f64().map(|x| Value::Float(x / 100.0)),
    }
}

pub fn inverse_rescale_percent(value: &Value) -> Option<Value> {
    match value {
        Value::Missing(s) => Some(Value::Missing(*s)),
        other => other.as_f64().map(|x| Value::Float(x * 100.0)),
    }
}

/// `ln(1 + max(x, 0))`. Returns the transformed cell and whether the input
/// was negative and had to be clamped.
pub fn log1p_clamped(value: &Value) -> Option<(Value, bool)> {
    match value {
        Value::Missing(s) => Some((Value::Missing(*s), false)),
        other => other.as_f64().map(|x| {
            let clamped = x < 0.0;
            (Value::Float(x.max(0.0).ln_1p()), clamped)
        }),
    }
}
