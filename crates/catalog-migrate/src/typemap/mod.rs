//! Canonical column types and the type-keyed tables built on them.
//!
//! Catalog type names vary between catalogs and spellings ("int4",
//! "integer", "int"). Every name is folded into a [`ColumnType`] first; the
//! compatibility, widening, default and cast tables are then keyed on the
//! canonical type.
//!
//! - [`compat`]: documented compatibility and widening pairs
//! - [`defaults`]: suggested defaults for new required columns
//! - [`cast`]: runtime value casts for changed column types

pub mod cast;
pub mod compat;
pub mod defaults;

pub use cast::CastKind;
pub use compat::{is_compatible, is_widening, same_type};
pub use defaults::{suggest_default, DefaultValue};

/// Canonical type family of a catalog column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Numeric,
    /// Single-precision float ("real", "float4", "float").
    Real,
    /// Double-precision float ("double precision", "float8").
    Double,
    Char,
    Varchar,
    Text,
    Json,
    Jsonb,
    Date,
    Time,
    /// Timestamp without time zone.
    Timestamp,
    /// Timestamp with time zone.
    TimestampTz,
    Uuid,
    Bytea,
    /// Anything not listed above; compared by exact name only.
    Other,
}

impl ColumnType {
    /// Fold a catalog type name into its canonical family.
    pub fn parse(catalog_type: &str) -> Self {
        match normalize_type_name(catalog_type).as_str() {
            "boolean" | "bool" => ColumnType::Boolean,
            "smallint" | "int2" | "tinyint" | "smallserial" => ColumnType::SmallInt,
            "integer" | "int" | "int4" | "serial" | "mediumint" => ColumnType::Integer,
            "bigint" | "int8" | "bigserial" => ColumnType::BigInt,
            "numeric" | "decimal" => ColumnType::Numeric,
            "real" | "float4" | "float" => ColumnType::Real,
            "double precision" | "double" | "float8" => ColumnType::Double,
            "character" | "char" | "bpchar" => ColumnType::Char,
            "character varying" | "varchar" => ColumnType::Varchar,
            "text" | "citext" | "tinytext" | "mediumtext" | "longtext" => ColumnType::Text,
            "json" => ColumnType::Json,
            "jsonb" => ColumnType::Jsonb,
            "date" => ColumnType::Date,
            "time" | "time without time zone" | "time with time zone" | "timetz" => {
                ColumnType::Time
            }
            "timestamp" | "timestamp without time zone" | "datetime" => ColumnType::Timestamp,
            "timestamptz" | "timestamp with time zone" => ColumnType::TimestampTz,
            "uuid" => ColumnType::Uuid,
            "bytea" => ColumnType::Bytea,
            _ => ColumnType::Other,
        }
    }

    /// Integer family (smallint, integer, bigint).
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt
        )
    }

    /// Date and time family.
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            ColumnType::Date | ColumnType::Time | ColumnType::Timestamp | ColumnType::TimestampTz
        )
    }
}

/// Lowercase a catalog type name and strip length/precision modifiers.
///
/// `"Character Varying(255)"` becomes `"character varying"`.
pub fn normalize_type_name(catalog_type: &str) -> String {
    let lowered = catalog_type.trim().to_lowercase();
    let base = match lowered.find('(') {
        Some(idx) => {
            // keep any suffix after the modifier, e.g. "timestamp(3) with time zone"
            let suffix = lowered[idx..]
                .find(')')
                .map(|end| lowered[idx + end + 1..].trim())
                .unwrap_or("");
            let head = lowered[..idx].trim();
            if suffix.is_empty() {
                head.to_string()
            } else {
                format!("{} {}", head, suffix)
            }
        }
        None => lowered,
    };
    base.split_whitespace().collect::<Vec<_>>().join(" ")
}
