//! Data migration: stream, transform and batch-write rows table by table.
//!
//! Tables are processed sequentially in the mapping's import order. Each
//! table is read in primary-key order, one page per batch, transformed per
//! its column actions and written with insert-or-ignore, so a table can be
//! re-run in full after a crash without duplicates.
//!
//! Failures are folded into the returned [`MigrationStats`]: a failed batch
//! counts all its rows as errors, a table-level failure counts one error, and
//! the run moves on either way. Only tables that finish with zero errors are
//! added to the checkpoint.

mod transform;

pub use transform::RowTransformer;

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::core::{PageCursor, TableReader, TargetWriter};
use crate::error::{MigrateError, Result};
use crate::mapping::{MigrationMapping, TableDiff, TableStatus};
use crate::state::ProgressCheckpoint;

/// Options for one migration run.
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    /// Rows per read page and write batch.
    pub batch_size: usize,

    /// Only migrate this table.
    pub table_filter: Option<String>,

    /// Read and transform, but write nothing.
    pub dry_run: bool,

    /// Disable referential integrity on the target for the run.
    pub skip_fk_checks: bool,

    /// Where the checkpoint is persisted after each completed table.
    pub checkpoint_path: Option<PathBuf>,

    /// Name-keyed defaults for required columns without one.
    pub default_overrides: BTreeMap<String, Value>,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            batch_size: 500,
            table_filter: None,
            dry_run: false,
            skip_fk_checks: false,
            checkpoint_path: None,
            default_overrides: BTreeMap::new(),
        }
    }
}

/// Outcome for one table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableStats {
    pub table: String,
    pub imported: u64,
    pub skipped: u64,
    pub errors: u64,
    pub batches: u64,
    pub duration_ms: u64,
}

/// Outcome for the whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationStats {
    /// Rows inserted (transformed rows in a dry run).
    pub imported: u64,
    /// Rows already present in the target.
    pub skipped: u64,
    /// Errored rows plus one per failed table.
    pub errors: u64,
    /// Tables checkpointed in this run. Always empty in a dry run.
    pub tables_completed: Vec<String>,
    /// Tables passed over (already completed, or not matched).
    pub tables_skipped: Vec<String>,
    /// Per-table detail.
    pub tables: Vec<TableStats>,
    pub dry_run: bool,
    pub duration_secs: f64,
}

impl MigrationStats {
    /// True when no error was recorded.
    pub fn success(&self) -> bool {
        self.errors == 0
    }

    fn add_table(&mut self, table: TableStats) {
        self.imported += table.imported;
        self.skipped += table.skipped;
        self.errors += table.errors;
        if table.errors == 0 && !self.dry_run {
            self.tables_completed.push(table.table.clone());
        }
        self.tables.push(table);
    }
}

/// Streams rows from the source into the target.
pub struct DataMigrator<'a> {
    source: &'a dyn TableReader,
    target: &'a dyn TargetWriter,
    options: MigrateOptions,
}

impl<'a> DataMigrator<'a> {
    pub fn new(source: &'a dyn TableReader, target: &'a dyn TargetWriter, options: MigrateOptions) -> Self {
        Self {
            source,
            target,
            options,
        }
    }

    /// Migrate every matched table of `mapping` not yet in `checkpoint`.
    ///
    /// Referential integrity, when disabled, is re-enabled before this
    /// returns, whatever the outcome.
    pub async fn run(
        &self,
        mapping: &MigrationMapping,
        checkpoint: &mut ProgressCheckpoint,
    ) -> Result<MigrationStats> {
        if self.options.batch_size == 0 {
            return Err(MigrateError::Config("batch_size must be at least 1".into()));
        }
        if let Some(filter) = &self.options.table_filter {
            if !mapping.tables.contains_key(filter) {
                return Err(MigrateError::Config(format!(
                    "table {} is not in the mapping",
                    filter
                )));
            }
        }

        let toggle = self.options.skip_fk_checks && !self.options.dry_run;
        if toggle {
            info!("Disabling referential integrity on target");
            self.target.set_referential_integrity(false).await?;
        }

        let result = self.migrate_tables(mapping, checkpoint).await;

        if toggle {
            info!("Re-enabling referential integrity on target");
            if let Err(e) = self.target.set_referential_integrity(true).await {
                warn!("Failed to re-enable referential integrity: {}", e);
                if result.is_ok() {
                    return Err(e);
                }
            }
        }

        result
    }

    async fn migrate_tables(
        &self,
        mapping: &MigrationMapping,
        checkpoint: &mut ProgressCheckpoint,
    ) -> Result<MigrationStats> {
        let start = Instant::now();
        let mut stats = MigrationStats {
            dry_run: self.options.dry_run,
            ..Default::default()
        };

        for name in &mapping.import_order {
            if let Some(filter) = &self.options.table_filter {
                if filter != name {
                    continue;
                }
            }
            let Some(table) = mapping.tables.get(name) else {
                continue;
            };

            if table.status != TableStatus::Matched {
                debug!("{}: {} - nothing to migrate", name, table.status);
                stats.tables_skipped.push(name.clone());
                continue;
            }
            if checkpoint.is_table_completed(name) {
                info!("{}: already completed, skipping", name);
                stats.tables_skipped.push(name.clone());
                continue;
            }

            let table_start = Instant::now();
            let mut table_stats = TableStats {
                table: name.clone(),
                ..Default::default()
            };
            if let Err(e) = self.migrate_table(name, table, &mut table_stats).await {
                warn!("{}: {}", name, e);
                table_stats.errors += 1;
            }
            table_stats.duration_ms = table_start.elapsed().as_millis() as u64;

            info!(
                "{}: imported {}, skipped {}, errors {} in {}ms",
                name,
                table_stats.imported,
                table_stats.skipped,
                table_stats.errors,
                table_stats.duration_ms
            );

            if table_stats.errors == 0 && !self.options.dry_run {
                checkpoint.mark_completed(name);
                if let Some(path) = &self.options.checkpoint_path {
                    checkpoint.save(path)?;
                }
            }
            stats.add_table(table_stats);
        }

        stats.duration_secs = start.elapsed().as_secs_f64();
        Ok(stats)
    }

    /// Migrate one table, accumulating into `stats`.
    ///
    /// Batch failures are counted and skipped; an `Err` means the table
    /// could not continue.
    async fn migrate_table(&self, name: &str, table: &TableDiff, stats: &mut TableStats) -> Result<()> {
        let total = self
            .source
            .row_count(name)
            .await
            .map_err(|e| MigrateError::table_fatal(name, e))?;
        if total == 0 {
            debug!("{}: source is empty", name);
            return Ok(());
        }

        let key_columns = self
            .source
            .primary_key(name)
            .await
            .map_err(|e| MigrateError::table_fatal(name, e))?;
        if key_columns.is_empty() {
            return Err(MigrateError::NoPrimaryKey(name.to_string()));
        }
        if key_columns.len() > 1 {
            debug!("{}: composite key, using OFFSET pagination", name);
        }

        let transformer = RowTransformer::new(name, table, &self.options.default_overrides);
        let columns = transformer.columns();
        let batch_size = self.options.batch_size;

        info!("{}: migrating {} rows", name, total);

        let mut cursor = PageCursor::Start;
        loop {
            let page = self
                .source
                .read_page(name, &key_columns, &cursor, batch_size)
                .await
                .map_err(|e| MigrateError::table_fatal(name, e))?;
            if page.is_empty() {
                break;
            }
            stats.batches += 1;

            let rows: Vec<_> = page.iter().map(|r| transformer.transform(r)).collect();
            let count = rows.len() as u64;

            if self.options.dry_run {
                stats.imported += count;
            } else {
                match self.target.insert_ignore(name, &columns, &rows).await {
                    Ok(inserted) => {
                        stats.imported += inserted;
                        stats.skipped += count.saturating_sub(inserted);
                        debug!("{}: batch {} inserted {}/{}", name, stats.batches, inserted, count);
                    }
                    Err(e) => {
                        warn!("{}: batch {} failed ({} rows): {}", name, stats.batches, count, e);
                        stats.errors += count;
                    }
                }
            }

            if page.len() < batch_size {
                break;
            }
            cursor = cursor.advance(&key_columns, &page).ok_or_else(|| {
                MigrateError::table_fatal(name, "cannot read the key of the last row in a page")
            })?;
        }

        Ok(())
    }
}
