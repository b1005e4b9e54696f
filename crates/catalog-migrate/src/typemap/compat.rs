//! Documented type-compatibility and widening tables.
//!
//! Classification checks identity first, then [`COMPATIBLE_PAIRS`], then
//! [`WIDENING_PAIRS`]. A widening pair that is also a compatible pair
//! therefore classifies as a direct match.

use super::{normalize_type_name, ColumnType};

/// Pairs whose values copy across without transformation (symmetric).
pub const COMPATIBLE_PAIRS: &[(ColumnType, ColumnType)] = &[
    (ColumnType::Varchar, ColumnType::Text),
    (ColumnType::SmallInt, ColumnType::Integer),
    (ColumnType::SmallInt, ColumnType::BigInt),
    (ColumnType::SmallInt, ColumnType::Numeric),
    (ColumnType::Integer, ColumnType::BigInt),
    (ColumnType::Integer, ColumnType::Numeric),
    (ColumnType::BigInt, ColumnType::Numeric),
    (ColumnType::Real, ColumnType::Numeric),
    (ColumnType::Timestamp, ColumnType::TimestampTz),
    (ColumnType::Boolean, ColumnType::SmallInt),
];

/// `(source, target)` pairs where the target represents every source value.
pub const WIDENING_PAIRS: &[(ColumnType, ColumnType)] = &[
    (ColumnType::Varchar, ColumnType::Text),
    (ColumnType::Char, ColumnType::Varchar),
    (ColumnType::Char, ColumnType::Text),
    (ColumnType::SmallInt, ColumnType::Integer),
    (ColumnType::SmallInt, ColumnType::BigInt),
    (ColumnType::Integer, ColumnType::BigInt),
    (ColumnType::Real, ColumnType::Numeric),
    (ColumnType::Real, ColumnType::Double),
    (ColumnType::Date, ColumnType::Timestamp),
    (ColumnType::Date, ColumnType::TimestampTz),
    (ColumnType::Json, ColumnType::Jsonb),
];

/// Identical declared types.
///
/// Spellings of the same canonical type ("int4" and "integer") count as
/// identical; unrecognized types must match by normalized name.
pub fn same_type(source: &str, target: &str) -> bool {
    let (a, b) = (normalize_type_name(source), normalize_type_name(target));
    if a == b {
        return true;
    }
    let (sa, sb) = (ColumnType::parse(&a), ColumnType::parse(&b));
    sa == sb && sa != ColumnType::Other
}

/// Listed in [`COMPATIBLE_PAIRS`], in either direction.
pub fn is_compatible(source: &str, target: &str) -> bool {
    let (s, t) = (ColumnType::parse(source), ColumnType::parse(target));
    COMPATIBLE_PAIRS
        .iter()
        .any(|&(a, b)| (a == s && b == t) || (a == t && b == s))
}

/// Listed in [`WIDENING_PAIRS`] as `(source, target)`.
pub fn is_widening(source: &str, target: &str) -> bool {
    let pair = (ColumnType::parse(source), ColumnType::parse(target));
    WIDENING_PAIRS.contains(&pair)
}

/// Readable name of a canonical type for rationale notes.
pub fn describe(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Boolean => "boolean",
        ColumnType::SmallInt => "smallint",
        ColumnType::Integer => "integer",
        ColumnType::BigInt => "bigint",
        ColumnType::Numeric => "numeric",
        ColumnType::Real => "real",
        ColumnType::Double => "double precision",
        ColumnType::Char => "char",
        ColumnType::Varchar => "varchar",
        ColumnType::Text => "text",
        ColumnType::Json => "json",
        ColumnType::Jsonb => "jsonb",
        ColumnType::Date => "date",
        ColumnType::Time => "time",
        ColumnType::Timestamp => "timestamp",
        ColumnType::TimestampTz => "timestamptz",
        ColumnType::Uuid => "uuid",
        ColumnType::Bytea => "bytea",
        ColumnType::Other => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_type_across_spellings() {
        assert!(same_type("int4", "integer"));
        assert!(same_type("character varying", "varchar(100)"));
        assert!(same_type("USER-DEFINED", "user-defined"));
        assert!(!same_type("USER-DEFINED", "ARRAY"));
        assert!(!same_type("integer", "bigint"));
    }

    #[test]
    fn test_compatibility_is_symmetric() {
        for &(a, b) in COMPATIBLE_PAIRS {
            let (a, b) = (describe(a), describe(b));
            assert!(is_compatible(a, b), "{} -> {}", a, b);
            assert!(is_compatible(b, a), "{} -> {}", b, a);
        }
    }

    #[test]
    fn test_widening_is_directional() {
        assert!(is_widening("real", "double precision"));
        assert!(!is_widening("double precision", "real"));
        assert!(is_widening("json", "jsonb"));
        assert!(!is_widening("jsonb", "json"));
    }

    #[test]
    fn test_unlisted_pair() {
        assert!(!is_compatible("text", "uuid"));
        assert!(!is_widening("text", "uuid"));
    }

    #[test]
    fn test_describe_round_trips_through_parse() {
        for &(a, b) in COMPATIBLE_PAIRS.iter().chain(WIDENING_PAIRS) {
            assert_eq!(ColumnType::parse(describe(a)), a);
            assert_eq!(ColumnType::parse(describe(b)), b);
        }
    }
}
