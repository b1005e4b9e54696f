//! Catalog metadata types: columns, tables and foreign-key edges.
//!
//! These are immutable snapshots taken at introspection time and shared by
//! the diff, migration and verification phases.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Represents a primary key value of various types.
///
/// Used for keyset pagination, random sampling and single-row lookups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PkValue {
    /// Integer primary key (covers smallint, integer, bigint).
    Int(i64),
    /// UUID primary key.
    Uuid(Uuid),
    /// String primary key (varchar, text, char).
    String(String),
}

impl PkValue {
    /// Convert to a SQL literal string for use in queries.
    ///
    /// # Security Note
    ///
    /// Single quotes are doubled, which is sufficient for the key values this
    /// is used with (integers, UUIDs, short identifiers read back from the
    /// database itself).
    pub fn to_sql_literal(&self) -> String {
        match self {
            PkValue::Int(v) => v.to_string(),
            PkValue::Uuid(v) => format!("'{}'", v),
            PkValue::String(v) => format!("'{}'", v.replace('\'', "''")),
        }
    }

    /// Build a key from a JSON value as produced by `to_jsonb`.
    ///
    /// Returns None for null, floats, booleans and nested values.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(PkValue::Int),
            // Only PostgreSQL's own uuid spelling; other text stays verbatim
            // so literals and comparisons match the stored value.
            Value::String(s) => Some(
                Uuid::parse_str(s)
                    .ok()
                    .filter(|u| u.to_string() == *s)
                    .map(PkValue::Uuid)
                    .unwrap_or_else(|| PkValue::String(s.clone())),
            ),
            _ => None,
        }
    }

    /// Convert back to the JSON representation used in rows.
    pub fn to_json(&self) -> Value {
        match self {
            PkValue::Int(v) => Value::from(*v),
            PkValue::Uuid(v) => Value::String(v.to_string()),
            PkValue::String(v) => Value::String(v.clone()),
        }
    }
}

impl std::fmt::Display for PkValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PkValue::Int(v) => write!(f, "{}", v),
            PkValue::Uuid(v) => write!(f, "{}", v),
            PkValue::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for PkValue {
    fn from(v: i64) -> Self {
        PkValue::Int(v)
    }
}

impl From<&str> for PkValue {
    fn from(v: &str) -> Self {
        PkValue::String(v.to_string())
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,

    /// Catalog type name (e.g. "integer", "character varying", "jsonb").
    pub data_type: String,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Declared default expression, if any.
    pub default: Option<String>,

    /// Ordinal position (1-based).
    pub ordinal_position: i32,
}

impl ColumnDescriptor {
    /// Create a nullable column without a default.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, ordinal_position: i32) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            ordinal_position,
        }
    }

    /// Mark the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Attach a catalog default expression.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Columns of one table, ordered by ordinal position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,

    /// Column definitions in ordinal order.
    pub columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    /// Create a table, sorting the columns by ordinal position.
    pub fn new(name: impl Into<String>, mut columns: Vec<ColumnDescriptor>) -> Self {
        columns.sort_by_key(|c| c.ordinal_position);
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names in ordinal order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Introspected schema of one connection, keyed by table name.
pub type SchemaSnapshot = BTreeMap<String, TableSchema>;

/// One column participating in a foreign-key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    /// Constraint name.
    pub constraint_name: String,

    /// Referencing column in the owning table.
    pub column_name: String,

    /// Referenced table name.
    pub referenced_table: String,

    /// Referenced column name.
    pub referenced_column: String,
}

impl ForeignKeyEdge {
    pub fn new(
        constraint_name: impl Into<String>,
        column_name: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            column_name: column_name.into(),
            referenced_table: referenced_table.into(),
            referenced_column: referenced_column.into(),
        }
    }
}

/// Foreign-key edges of one connection, keyed by owning table.
pub type ForeignKeyGraph = BTreeMap<String, Vec<ForeignKeyEdge>>;
