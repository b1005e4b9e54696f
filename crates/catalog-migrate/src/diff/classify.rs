//! Column classification for one matched table.
//!
//! Rules, first match wins:
//!
//! 1. both sides, identical type: direct match
//! 2. both sides, compatible pair: direct match with a note
//! 3. both sides, widening pair: type widened
//! 4. both sides, anything else: type changed
//! 5. target only: renamed from a nearby source-only column of the same or a
//!    compatible type, else new nullable / new required
//! 6. source only and not consumed by a rename: removed

use std::collections::{BTreeMap, BTreeSet};

use crate::core::{ColumnDescriptor, TableSchema};
use crate::mapping::ColumnDiff;
use crate::typemap::{compat, is_compatible, is_widening, same_type, suggest_default, ColumnType};

/// Maximum ordinal distance between a target-only column and its rename source.
pub const RENAME_MAX_DISTANCE: i32 = 3;

/// Classify a column present on both sides.
pub fn classify_pair(source_type: &str, target_type: &str) -> ColumnDiff {
    let (source_type_s, target_type_s) = (source_type.to_string(), target_type.to_string());

    if same_type(source_type, target_type) {
        return ColumnDiff::DirectMatch {
            source_type: source_type_s,
            target_type: target_type_s,
            note: None,
        };
    }
    if is_compatible(source_type, target_type) {
        return ColumnDiff::DirectMatch {
            note: Some(format!("compatible types: {}", pair_label(source_type, target_type))),
            source_type: source_type_s,
            target_type: target_type_s,
        };
    }
    if is_widening(source_type, target_type) {
        return ColumnDiff::TypeWidened {
            note: format!("widened: {}", pair_label(source_type, target_type)),
            source_type: source_type_s,
            target_type: target_type_s,
        };
    }
    ColumnDiff::TypeChanged {
        source_type: source_type_s,
        target_type: target_type_s,
    }
}

fn pair_label(source_type: &str, target_type: &str) -> String {
    format!(
        "{} -> {}",
        compat::describe(ColumnType::parse(source_type)),
        compat::describe(ColumnType::parse(target_type))
    )
}

/// Classify every column in the union of both tables' columns.
pub fn classify_columns(source: &TableSchema, target: &TableSchema) -> BTreeMap<String, ColumnDiff> {
    let mut columns = BTreeMap::new();

    for tcol in &target.columns {
        if let Some(scol) = source.column(&tcol.name) {
            columns.insert(tcol.name.clone(), classify_pair(&scol.data_type, &tcol.data_type));
        }
    }

    // rename candidates, in lexical order
    let mut candidates: BTreeMap<&str, &ColumnDescriptor> = source
        .columns
        .iter()
        .filter(|c| !target.has_column(&c.name))
        .map(|c| (c.name.as_str(), c))
        .collect();
    let mut consumed: BTreeSet<String> = BTreeSet::new();

    for tcol in target.columns.iter().filter(|c| !source.has_column(&c.name)) {
        let diff = match find_rename_source(tcol, &candidates) {
            Some(scol) => {
                let note = (!same_type(&scol.data_type, &tcol.data_type))
                    .then(|| format!("compatible types: {}", pair_label(&scol.data_type, &tcol.data_type)));
                let diff = ColumnDiff::Renamed {
                    possible_source: scol.name.clone(),
                    source_type: scol.data_type.clone(),
                    target_type: tcol.data_type.clone(),
                    note,
                };
                consumed.insert(scol.name.clone());
                candidates.remove(scol.name.as_str());
                diff
            }
            None => new_column(tcol),
        };
        columns.insert(tcol.name.clone(), diff);
    }

    for scol in &source.columns {
        if !target.has_column(&scol.name) && !consumed.contains(&scol.name) {
            columns.insert(
                scol.name.clone(),
                ColumnDiff::Removed {
                    source_type: scol.data_type.clone(),
                },
            );
        }
    }

    columns
}

/// Nearest qualifying candidate; ties go to the first in lexical order.
fn find_rename_source<'a>(
    target: &ColumnDescriptor,
    candidates: &BTreeMap<&str, &'a ColumnDescriptor>,
) -> Option<&'a ColumnDescriptor> {
    let mut best: Option<(i32, &'a ColumnDescriptor)> = None;
    for candidate in candidates.values() {
        if !(same_type(&candidate.data_type, &target.data_type)
            || is_compatible(&candidate.data_type, &target.data_type))
        {
            continue;
        }
        let distance = (candidate.ordinal_position - target.ordinal_position).abs();
        if distance > RENAME_MAX_DISTANCE {
            continue;
        }
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, candidate));
        }
    }
    best.map(|(_, c)| c)
}

fn new_column(column: &ColumnDescriptor) -> ColumnDiff {
    if column.nullable {
        ColumnDiff::NewNullable {
            target_type: column.data_type.clone(),
        }
    } else {
        ColumnDiff::NewRequired {
            target_type: column.data_type.clone(),
            default: suggest_default(column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ColumnAction;
    use crate::typemap::compat::{COMPATIBLE_PAIRS, WIDENING_PAIRS};
    use crate::typemap::DefaultValue;
    use serde_json::json;

    fn col(name: &str, ty: &str, ord: i32) -> ColumnDescriptor {
        ColumnDescriptor::new(name, ty, ord)
    }

    #[test]
    fn test_identical_types_direct_match() {
        let diff = classify_pair("integer", "int4");
        assert_eq!(
            diff,
            ColumnDiff::DirectMatch {
                source_type: "integer".into(),
                target_type: "int4".into(),
                note: None,
            }
        );
    }

    #[test]
    fn test_every_compatible_pair_is_direct_match_with_note() {
        for &(a, b) in COMPATIBLE_PAIRS {
            let (a, b) = (compat::describe(a), compat::describe(b));
            for (s, t) in [(a, b), (b, a)] {
                match classify_pair(s, t) {
                    ColumnDiff::DirectMatch { note: Some(_), .. } => {}
                    other => panic!("{} -> {}: {:?}", s, t, other),
                }
            }
        }
    }

    #[test]
    fn test_widening_pairs_not_compatible_are_widened() {
        for &(s, t) in WIDENING_PAIRS {
            let (s, t) = (compat::describe(s), compat::describe(t));
            let action = classify_pair(s, t).action();
            if is_compatible(s, t) {
                assert_eq!(action, ColumnAction::DirectMatch, "{} -> {}", s, t);
            } else {
                assert_eq!(action, ColumnAction::TypeWidened, "{} -> {}", s, t);
            }
        }
        assert_eq!(classify_pair("json", "jsonb").action(), ColumnAction::TypeWidened);
        assert_eq!(classify_pair("date", "timestamptz").action(), ColumnAction::TypeWidened);
    }

    #[test]
    fn test_unlisted_pair_is_type_changed() {
        assert_eq!(classify_pair("text", "integer").action(), ColumnAction::TypeChanged);
        // widening is directional
        assert_eq!(classify_pair("jsonb", "json").action(), ColumnAction::TypeChanged);
        assert_eq!(
            classify_pair("double precision", "real").action(),
            ColumnAction::TypeChanged
        );
    }

    #[test]
    fn test_rename_detected_within_distance() {
        let source = TableSchema::new("users", vec![col("id", "bigint", 1), col("old_name", "text", 2)]);
        let target = TableSchema::new("users", vec![col("id", "bigint", 1), col("new_name", "text", 3)]);

        let columns = classify_columns(&source, &target);
        assert_eq!(
            columns["new_name"],
            ColumnDiff::Renamed {
                possible_source: "old_name".into(),
                source_type: "text".into(),
                target_type: "text".into(),
                note: None,
            }
        );
        // consumed source column has no entry of its own
        assert!(!columns.contains_key("old_name"));
        assert_eq!(columns.len(), 2);
    }

    #[test]
    fn test_rename_picks_nearest_then_lexical() {
        let source = TableSchema::new(
            "posts",
            vec![
                col("id", "bigint", 1),
                col("zeta", "text", 3),
                col("alpha", "text", 5),
                col("far", "text", 8),
            ],
        );
        let target = TableSchema::new("posts", vec![col("id", "bigint", 1), col("title", "text", 4)]);

        let columns = classify_columns(&source, &target);
        // alpha and zeta are both at distance 1; alpha is first lexically
        match &columns["title"] {
            ColumnDiff::Renamed { possible_source, .. } => assert_eq!(possible_source, "alpha"),
            other => panic!("expected rename, got {:?}", other),
        }
        assert_eq!(columns["zeta"].action(), ColumnAction::Removed);
        assert_eq!(columns["far"].action(), ColumnAction::Removed);
    }

    #[test]
    fn test_rename_nearest_distance_wins() {
        let source = TableSchema::new(
            "posts",
            vec![col("id", "bigint", 1), col("aaa", "text", 2), col("bbb", "text", 4)],
        );
        let target = TableSchema::new("posts", vec![col("id", "bigint", 1), col("body", "text", 5)]);
        match &classify_columns(&source, &target)["body"] {
            ColumnDiff::Renamed { possible_source, .. } => assert_eq!(possible_source, "bbb"),
            other => panic!("expected rename, got {:?}", other),
        }
    }

    #[test]
    fn test_rename_accepts_compatible_type_with_note() {
        let source = TableSchema::new("t", vec![col("label", "character varying", 2)]);
        let target = TableSchema::new("t", vec![col("caption", "text", 2)]);
        match &classify_columns(&source, &target)["caption"] {
            ColumnDiff::Renamed { note: Some(n), .. } => assert!(n.contains("varchar -> text")),
            other => panic!("expected rename with note, got {:?}", other),
        }
    }

    #[test]
    fn test_no_rename_beyond_distance_or_type() {
        let source = TableSchema::new(
            "t",
            vec![col("id", "bigint", 1), col("legacy", "text", 2), col("flag", "uuid", 6)],
        );
        let target = TableSchema::new(
            "t",
            vec![col("id", "bigint", 1), col("extra", "text", 6), col("notes", "text", 7).not_null()],
        );
        let columns = classify_columns(&source, &target);
        // legacy is 4 away from extra and 5 from notes; flag has the wrong type
        assert_eq!(columns["extra"].action(), ColumnAction::NewNullable);
        assert_eq!(columns["notes"].action(), ColumnAction::NewRequired);
        assert_eq!(columns["legacy"].action(), ColumnAction::Removed);
        assert_eq!(columns["flag"].action(), ColumnAction::Removed);
    }

    #[test]
    fn test_candidate_used_once() {
        let source = TableSchema::new("t", vec![col("a", "text", 2)]);
        let target = TableSchema::new("t", vec![col("b", "text", 2), col("c", "text", 3)]);
        let columns = classify_columns(&source, &target);
        assert_eq!(columns["b"].action(), ColumnAction::Renamed);
        assert_eq!(columns["c"].action(), ColumnAction::NewNullable);
    }

    #[test]
    fn test_new_required_defaults() {
        let source = TableSchema::new("posts", vec![col("id", "bigint", 1)]);
        let target = TableSchema::new(
            "posts",
            vec![
                col("id", "bigint", 1),
                col("status", "character varying", 9).not_null(),
                col("state", "text", 12).not_null().with_default("'draft'::text"),
            ],
        );
        let columns = classify_columns(&source, &target);
        assert_eq!(
            columns["status"],
            ColumnDiff::NewRequired {
                target_type: "character varying".into(),
                default: DefaultValue::Literal(json!("")),
            }
        );
        assert_eq!(
            columns["state"],
            ColumnDiff::NewRequired {
                target_type: "text".into(),
                default: DefaultValue::Expression("'draft'::text".into()),
            }
        );
    }

    #[test]
    fn test_classification_is_total() {
        let source = TableSchema::new(
            "t",
            vec![col("id", "bigint", 1), col("a", "integer", 2), col("gone", "uuid", 3)],
        );
        let target = TableSchema::new(
            "t",
            vec![col("id", "bigint", 1), col("a", "text", 2), col("fresh", "jsonb", 9)],
        );
        let columns = classify_columns(&source, &target);
        let names: Vec<&str> = columns.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "fresh", "gone", "id"]);
    }
}
