//! Suggested defaults for columns the target requires but the source lacks.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::ColumnType;
use crate::core::ColumnDescriptor;

/// Default recorded in the mapping for a new required column.
///
/// In the mapping file a literal is written as the plain JSON value and
/// `Null` as `null`. The generated kinds are small objects:
/// `{"sentinel": "now"}`, `{"sentinel": "generated_uuid"}` and
/// `{"expression": "<catalog default>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DefaultRepr", into = "DefaultRepr")]
pub enum DefaultValue {
    /// A fixed JSON value written into every row.
    Literal(Value),
    /// Current time, taken when the row is built.
    Now,
    /// A fresh v4 UUID per row.
    GeneratedUuid,
    /// The column's own catalog default; the database evaluates it.
    Expression(String),
    /// No known default.
    Null,
}

impl DefaultValue {
    /// True when the database, not the migrator, produces the value.
    pub fn is_database_side(&self) -> bool {
        matches!(self, DefaultValue::Expression(_))
    }

    /// True when there is nothing to write.
    pub fn is_null(&self) -> bool {
        matches!(self, DefaultValue::Null) || matches!(self, DefaultValue::Literal(Value::Null))
    }

    /// Materialize the value for one row.
    ///
    /// Returns None for database-side defaults, whose column is left out of
    /// the insert.
    pub fn materialize(&self) -> Option<Value> {
        match self {
            DefaultValue::Literal(v) => Some(v.clone()),
            DefaultValue::Now => Some(Value::String(
                Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            )),
            DefaultValue::GeneratedUuid => Some(Value::String(Uuid::new_v4().to_string())),
            DefaultValue::Expression(_) => None,
            DefaultValue::Null => Some(Value::Null),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Sentinel {
    Now,
    GeneratedUuid,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DefaultRepr {
    Sentinel { sentinel: Sentinel },
    Expression { expression: String },
    Literal(Value),
}

impl From<DefaultRepr> for DefaultValue {
    fn from(repr: DefaultRepr) -> Self {
        match repr {
            DefaultRepr::Sentinel {
                sentinel: Sentinel::Now,
            } => DefaultValue::Now,
            DefaultRepr::Sentinel {
                sentinel: Sentinel::GeneratedUuid,
            } => DefaultValue::GeneratedUuid,
            DefaultRepr::Expression { expression } => DefaultValue::Expression(expression),
            DefaultRepr::Literal(Value::Null) => DefaultValue::Null,
            DefaultRepr::Literal(value) => DefaultValue::Literal(value),
        }
    }
}

impl From<DefaultValue> for DefaultRepr {
    fn from(value: DefaultValue) -> Self {
        match value {
            DefaultValue::Now => DefaultRepr::Sentinel {
                sentinel: Sentinel::Now,
            },
            DefaultValue::GeneratedUuid => DefaultRepr::Sentinel {
                sentinel: Sentinel::GeneratedUuid,
            },
            DefaultValue::Expression(expression) => DefaultRepr::Expression { expression },
            DefaultValue::Literal(value) => DefaultRepr::Literal(value),
            DefaultValue::Null => DefaultRepr::Literal(Value::Null),
        }
    }
}

/// Suggest a default for a new NOT NULL column.
///
/// The column's own catalog default wins; otherwise the type-keyed table in
/// [`type_default`] applies.
pub fn suggest_default(column: &ColumnDescriptor) -> DefaultValue {
    match &column.default {
        Some(expr) => DefaultValue::Expression(expr.clone()),
        None => type_default(ColumnType::parse(&column.data_type)),
    }
}

/// Type-keyed default table.
pub fn type_default(ty: ColumnType) -> DefaultValue {
    match ty {
        ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt => {
            DefaultValue::Literal(json!(0))
        }
        ColumnType::Numeric | ColumnType::Real | ColumnType::Double => {
            DefaultValue::Literal(json!(0))
        }
        ColumnType::Boolean => DefaultValue::Literal(json!(false)),
        ColumnType::Char | ColumnType::Varchar | ColumnType::Text => {
            DefaultValue::Literal(json!(""))
        }
        ColumnType::Json | ColumnType::Jsonb => DefaultValue::Literal(json!({})),
        ColumnType::Date | ColumnType::Timestamp | ColumnType::TimestampTz => DefaultValue::Now,
        ColumnType::Uuid => DefaultValue::GeneratedUuid,
        ColumnType::Time | ColumnType::Bytea | ColumnType::Other => DefaultValue::Null,
    }
}
