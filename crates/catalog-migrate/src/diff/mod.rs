//! Schema diff: table and column classification plus import ordering.
//!
//! - [`classify`]: per-column actions for matched tables
//! - [`tier`]: import tiers and the (tier, name) import order

pub mod classify;
pub mod tier;

pub use classify::{classify_columns, classify_pair};
pub use tier::{compute_import_order, resolve_import_tier, TierTable};

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::core::{ForeignKeyGraph, SchemaSnapshot};
use crate::mapping::{MigrationMapping, TableDiff, TableStatus};

/// Compare two snapshots and build the migration mapping.
///
/// `target_fks` supplies the foreign-key edges recorded on each table and
/// used for tier resolution.
pub fn diff_schemas(
    source: &SchemaSnapshot,
    target: &SchemaSnapshot,
    target_fks: &ForeignKeyGraph,
    tiers: &TierTable,
) -> MigrationMapping {
    let names: BTreeSet<&str> = source.keys().chain(target.keys()).map(String::as_str).collect();

    let mut tables = BTreeMap::new();
    for name in names {
        let foreign_keys = target_fks.get(name).cloned().unwrap_or_default();
        let import_tier = resolve_import_tier(name, &foreign_keys, tiers);

        let (status, columns) = match (source.get(name), target.get(name)) {
            (Some(s), Some(t)) => (TableStatus::Matched, classify_columns(s, t)),
            (Some(_), None) => (TableStatus::NewInSource, BTreeMap::new()),
            _ => (TableStatus::RemovedFromSource, BTreeMap::new()),
        };
        debug!("{}: {} (tier {})", name, status, import_tier);

        tables.insert(
            name.to_string(),
            TableDiff {
                status,
                columns,
                foreign_keys,
                import_tier,
            },
        );
    }

    let import_order = compute_import_order(
        tables.iter().map(|(name, table)| (name.as_str(), table.import_tier)),
    );

    info!(
        "Diffed {} source tables against {} target tables",
        source.len(),
        target.len()
    );

    MigrationMapping {
        generated_at: Utc::now(),
        source_table_count: source.len(),
        target_table_count: target.len(),
        tables,
        import_order,
    }
}
