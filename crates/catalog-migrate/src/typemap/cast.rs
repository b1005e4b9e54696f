//! Runtime value casts for columns whose type changed between catalogs.
//!
//! Every cast is total: null passes through, and malformed input degrades to
//! a neutral value instead of failing the row.

use serde_json::{Number, Value};

use super::ColumnType;

/// Conversion applied to a value headed for a column of a given type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Integer,
    Float,
    Boolean,
    String,
    Json,
    /// Left to the database's own input parsing.
    Passthrough,
}

impl CastKind {
    /// Cast keyed on the target column type.
    pub fn for_type(ty: ColumnType) -> Self {
        match ty {
            ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt => CastKind::Integer,
            ColumnType::Numeric | ColumnType::Real | ColumnType::Double => CastKind::Float,
            ColumnType::Boolean => CastKind::Boolean,
            ColumnType::Char | ColumnType::Varchar | ColumnType::Text => CastKind::String,
            ColumnType::Json | ColumnType::Jsonb => CastKind::Json,
            ColumnType::Date
            | ColumnType::Time
            | ColumnType::Timestamp
            | ColumnType::TimestampTz
            | ColumnType::Uuid
            | ColumnType::Bytea
            | ColumnType::Other => CastKind::Passthrough,
        }
    }

    /// Cast keyed on a catalog type name.
    pub fn for_catalog_type(catalog_type: &str) -> Self {
        Self::for_type(ColumnType::parse(catalog_type))
    }

    /// Apply the cast. Null is returned unchanged.
    pub fn apply(self, value: Value) -> Value {
        if value.is_null() {
            return value;
        }
        match self {
            CastKind::Integer => to_integer(value),
            CastKind::Float => to_float(value),
            CastKind::Boolean => to_boolean(value),
            CastKind::String => to_string(value),
            CastKind::Json => to_json(value),
            CastKind::Passthrough => value,
        }
    }
}

fn to_integer(value: Value) -> Value {
    let n = match &value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::Bool(b) => i64::from(*b),
        Value::String(s) => parse_integer(s),
        Value::Array(_) | Value::Object(_) | Value::Null => 0,
    };
    Value::from(n)
}

fn parse_integer(s: &str) -> i64 {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        .unwrap_or(0)
}

fn to_float(value: Value) -> Value {
    let f = match &value {
        Value::Number(n) => return Value::Number(n.clone()),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Array(_) | Value::Object(_) | Value::Null => 0.0,
    };
    Number::from_f64(f).map(Value::Number).unwrap_or_else(|| Value::from(0))
}

fn to_boolean(value: Value) -> Value {
    let b = match &value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "" | "0" | "false" | "f" | "no" | "n" | "off"
        ),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    };
    Value::Bool(b)
}

fn to_string(value: Value) -> Value {
    match value {
        Value::String(_) => value,
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        other => Value::String(other.to_string()),
    }
}

fn to_json(value: Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}
