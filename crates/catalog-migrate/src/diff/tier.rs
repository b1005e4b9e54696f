//! Import tiers and import order.
//!
//! Tiers are a coarse approximation of foreign-key dependency order:
//!
//! | Tier | Meaning |
//! |------|---------|
//! | 0 | independent lookup tables, or tables without foreign keys |
//! | 1 | ownership-linking tables (users, organizations) |
//! | 2 | primary entities |
//! | 3 | content, and any dependent table not otherwise known |
//! | 4 | transactional tables |
//! | 5 | pivot/junction tables |
//!
//! Known table names take their tier from a static reference table, which
//! configuration can extend. Everything else is resolved from its foreign
//! keys.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::ForeignKeyEdge;

/// Tier of pivot/junction tables, imported last.
pub const PIVOT_TIER: u8 = 5;

/// Tier of dependent tables not in the reference table.
pub const DEPENDENT_TIER: u8 = 3;

/// Highest tier the reference table may assign.
pub const MAX_REFERENCE_TIER: u8 = 4;

/// Minimum ratio of foreign-key columns to name segments for a pivot table.
const PIVOT_FK_RATIO: f64 = 0.8;

/// Substrings that mark a linking table.
const PIVOT_MARKERS: &[&str] = &["_has_", "_to_", "pivot", "_link", "_map"];

const REFERENCE_TIERS: &[(&str, u8)] = &[
    // independent
    ("roles", 0),
    ("permissions", 0),
    ("categories", 0),
    ("tags", 0),
    ("settings", 0),
    ("countries", 0),
    ("languages", 0),
    // ownership-linking
    ("users", 1),
    ("organizations", 1),
    ("accounts", 1),
    ("teams", 1),
    // primary entity
    ("authors", 2),
    ("publications", 2),
    ("sites", 2),
    ("brands", 2),
    // content
    ("posts", 3),
    ("articles", 3),
    ("pages", 3),
    ("media", 3),
    ("comments", 3),
    // transactional
    ("orders", 4),
    ("payments", 4),
    ("subscriptions", 4),
    ("invoices", 4),
    ("audit_logs", 4),
    ("notifications", 4),
];

/// Static table-name to tier reference.
#[derive(Debug, Clone)]
pub struct TierTable {
    entries: BTreeMap<String, u8>,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            entries: REFERENCE_TIERS
                .iter()
                .map(|&(name, tier)| (name.to_string(), tier))
                .collect(),
        }
    }
}

impl TierTable {
    /// Built-in reference table with `overrides` merged on top.
    pub fn with_overrides(overrides: &BTreeMap<String, u8>) -> Self {
        let mut table = Self::default();
        for (name, tier) in overrides {
            table.entries.insert(name.clone(), (*tier).min(MAX_REFERENCE_TIER));
        }
        table
    }

    pub fn get(&self, table: &str) -> Option<u8> {
        self.entries.get(table).copied()
    }
}

/// Resolve the import tier of one table from its target-side foreign keys.
pub fn resolve_import_tier(table: &str, foreign_keys: &[ForeignKeyEdge], tiers: &TierTable) -> u8 {
    if let Some(tier) = tiers.get(table) {
        return tier;
    }

    let fk_columns: BTreeSet<&str> = foreign_keys.iter().map(|e| e.column_name.as_str()).collect();
    if fk_columns.is_empty() {
        return 0;
    }

    if fk_columns.len() >= 2 && looks_like_pivot(table, fk_columns.len()) {
        return PIVOT_TIER;
    }

    DEPENDENT_TIER
}

fn looks_like_pivot(table: &str, fk_count: usize) -> bool {
    let name = table.to_lowercase();
    if PIVOT_MARKERS.iter().any(|m| name.contains(m)) {
        return true;
    }
    let segments = name.split('_').filter(|s| !s.is_empty()).count().max(1);
    fk_count as f64 / segments as f64 >= PIVOT_FK_RATIO
}

/// Order table names by (tier, name).
pub fn compute_import_order<'a, I>(tiers: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, u8)>,
{
    let mut entries: Vec<(u8, &str)> = tiers.into_iter().map(|(name, tier)| (tier, name)).collect();
    entries.sort();
    entries.into_iter().map(|(_, name)| name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fk(column: &str, table: &str) -> ForeignKeyEdge {
        ForeignKeyEdge::new(format!("fk_{}", column), column, table, "id")
    }

    #[test]
    fn test_reference_table_takes_precedence() {
        let tiers = TierTable::default();
        assert_eq!(resolve_import_tier("users", &[], &tiers), 1);
        // reference entry wins over the pivot heuristic
        let edges = vec![fk("post_id", "posts"), fk("user_id", "users")];
        assert_eq!(resolve_import_tier("comments", &edges, &tiers), 3);
        assert_eq!(resolve_import_tier("audit_logs", &[], &tiers), 4);
    }

    #[test]
    fn test_no_foreign_keys_is_tier_zero() {
        assert_eq!(resolve_import_tier("widgets", &[], &TierTable::default()), 0);
    }

    #[test]
    fn test_pivot_by_marker() {
        let edges = vec![fk("user_id", "users"), fk("role_id", "roles")];
        assert_eq!(
            resolve_import_tier("user_has_roles", &edges, &TierTable::default()),
            PIVOT_TIER
        );
    }

    #[test]
    fn test_pivot_by_segment_ratio() {
        let edges = vec![fk("post_id", "posts"), fk("tag_id", "tags")];
        assert_eq!(resolve_import_tier("post_tag", &edges, &TierTable::default()), PIVOT_TIER);
    }

    #[test]
    fn test_single_fk_is_dependent() {
        let edges = vec![fk("post_id", "posts")];
        assert_eq!(
            resolve_import_tier("post_revisions", &edges, &TierTable::default()),
            DEPENDENT_TIER
        );
    }

    #[test]
    fn test_low_ratio_is_dependent() {
        // 2 FK columns over 3 segments
        let edges = vec![fk("site_id", "sites"), fk("author_id", "authors")];
        assert_eq!(
            resolve_import_tier("newsletter_issue_drafts", &edges, &TierTable::default()),
            DEPENDENT_TIER
        );
    }

    #[test]
    fn test_duplicate_fk_column_counts_once() {
        // composite constraint listing the same column twice does not make a pivot
        let edges = vec![fk("owner_id", "users"), fk("owner_id", "users")];
        assert_eq!(resolve_import_tier("boxes", &edges, &TierTable::default()), DEPENDENT_TIER);
    }

    #[test]
    fn test_overrides_merge_and_clamp() {
        let mut overrides = BTreeMap::new();
        overrides.insert("widgets".to_string(), 2);
        overrides.insert("users".to_string(), 9);
        let tiers = TierTable::with_overrides(&overrides);
        assert_eq!(tiers.get("widgets"), Some(2));
        assert_eq!(tiers.get("users"), Some(MAX_REFERENCE_TIER));
        assert_eq!(tiers.get("posts"), Some(3));
    }

    #[test]
    fn test_import_order_by_tier_then_name() {
        let order = compute_import_order(vec![
            ("post_tag", 5),
            ("users", 1),
            ("tags", 0),
            ("roles", 0),
            ("posts", 3),
            ("comments", 3),
        ]);
        assert_eq!(
            order,
            vec!["roles", "tags", "users", "comments", "posts", "post_tag"]
        );
    }
}
