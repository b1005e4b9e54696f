//! Post-migration integrity verification.
//!
//! Every matched table is checked independently of migration state:
//!
//! - **Count parity**: source and target row counts must be equal
//! - **FK orphans**: no target row may reference a missing parent
//! - **Spot check**: sampled source rows exist in the target with the same
//!   creation timestamp
//! - **Timestamp range**: MIN and MAX creation timestamps agree
//! - **New nullable columns**: columns added as nullable stay entirely null
//!
//! The configured domain invariants then run once for the whole run. A check
//! query that fails to run is reported as an issue rather than aborting, so one
//! unreadable table does not hide findings elsewhere.

mod invariants;
pub mod normalize;
pub mod types;

pub use types::{IssueKind, TableVerifyResult, VerificationIssue, VerificationReport, GLOBAL_SCOPE};

use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{ColumnRef, VerifyConfig};
use crate::core::{PkValue, TableReader};
use crate::error::{MigrateError, Result};
use crate::mapping::{ColumnAction, MigrationMapping, TableDiff};
use normalize::normalize_timestamp;

/// Options for one verification run.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Only verify this table.
    pub table_filter: Option<String>,
    /// Creation-timestamp column (target naming).
    pub timestamp_column: String,
    /// Source rows spot-checked per table.
    pub sample_size: usize,
    pub credential_column: Option<ColumnRef>,
    pub external_id_column: Option<ColumnRef>,
    pub date_sample_column: Option<ColumnRef>,
    pub date_sample_size: usize,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self::from_config(&VerifyConfig::default(), None)
    }
}

impl VerifyOptions {
    pub fn from_config(config: &VerifyConfig, table_filter: Option<String>) -> Self {
        Self {
            table_filter,
            timestamp_column: config.timestamp_column.clone(),
            sample_size: config.sample_size,
            credential_column: config.credential_column.clone(),
            external_id_column: config.external_id_column.clone(),
            date_sample_column: config.date_sample_column.clone(),
            date_sample_size: config.date_sample_size,
        }
    }

    fn includes(&self, table: &str) -> bool {
        self.table_filter.as_deref().map_or(true, |f| f == table)
    }
}

/// Compares the target against the source after a migration.
pub struct IntegrityVerifier<'a> {
    source: &'a dyn TableReader,
    target: &'a dyn TableReader,
    options: VerifyOptions,
}

impl<'a> IntegrityVerifier<'a> {
    pub fn new(source: &'a dyn TableReader, target: &'a dyn TableReader, options: VerifyOptions) -> Self {
        Self {
            source,
            target,
            options,
        }
    }

    /// Verify every matched table of `mapping`, then the domain invariants.
    pub async fn run(&self, mapping: &MigrationMapping) -> Result<VerificationReport> {
        if let Some(filter) = &self.options.table_filter {
            if !mapping.tables.contains_key(filter) {
                return Err(MigrateError::Config(format!(
                    "table {} is not in the mapping",
                    filter
                )));
            }
        }

        let start = Instant::now();
        let mut report = VerificationReport::new();

        for (name, table) in mapping.matched_tables() {
            if !self.options.includes(name) {
                continue;
            }
            let (result, issues) = self.verify_table(name, table).await;
            if issues.is_empty() {
                info!("{}: OK", name);
            } else {
                warn!("{}: {} issues", name, issues.len());
            }
            report.add_table(result, issues);
        }

        if let Some(filter) = &self.options.table_filter {
            if report.tables.is_empty() {
                info!("{}: not present on both sides, nothing to verify", filter);
            }
        }

        report.add_global(self.verify_invariants(mapping).await);
        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    async fn verify_table(&self, name: &str, table: &TableDiff) -> (TableVerifyResult, Vec<VerificationIssue>) {
        let start = Instant::now();
        let mut result = TableVerifyResult {
            table: name.to_string(),
            ..Default::default()
        };
        let mut issues = Vec::new();

        self.check_counts(name, &mut result, &mut issues).await;
        self.check_orphans(name, table, &mut result, &mut issues).await;
        self.check_spot_sample(name, table, &mut result, &mut issues).await;
        self.check_timestamp_range(name, table, &mut result, &mut issues).await;
        self.check_new_nullable(name, table, &mut issues).await;

        result.duration_ms = start.elapsed().as_millis() as u64;
        (result, issues)
    }

    async fn check_counts(&self, name: &str, result: &mut TableVerifyResult, issues: &mut Vec<VerificationIssue>) {
        let source = self.source.row_count(name).await;
        let target = self.target.row_count(name).await;
        match (source, target) {
            (Ok(s), Ok(t)) => {
                result.source_row_count = s;
                result.target_row_count = t;
                if s != t {
                    issues.push(VerificationIssue::new(
                        name,
                        IssueKind::CountMismatch,
                        format!("source {}, target {} (delta {:+})", s, t, t - s),
                    ));
                }
            }
            (Err(e), _) | (_, Err(e)) => issues.push(check_failed(name, "row count", e)),
        }
    }

    async fn check_orphans(
        &self,
        name: &str,
        table: &TableDiff,
        result: &mut TableVerifyResult,
        issues: &mut Vec<VerificationIssue>,
    ) {
        for edge in &table.foreign_keys {
            result.edges_checked += 1;
            match self.target.orphan_count(name, edge).await {
                Ok(0) => {}
                Ok(n) => issues.push(VerificationIssue::new(
                    name,
                    IssueKind::ForeignKeyOrphans,
                    format!(
                        "{} rows in {} reference missing {}.{}",
                        n, edge.column_name, edge.referenced_table, edge.referenced_column
                    ),
                )),
                Err(e) => issues.push(check_failed(name, "orphan count", e)),
            }
        }
    }

    /// Target name and source name of the timestamp column, if the table has one.
    fn timestamp_columns<'t>(&'t self, table: &'t TableDiff) -> Option<(&'t str, &'t str)> {
        let target = self.options.timestamp_column.as_str();
        let source = table.columns.get(target)?.source_column(target)?;
        Some((target, source))
    }

    async fn check_spot_sample(
        &self,
        name: &str,
        table: &TableDiff,
        result: &mut TableVerifyResult,
        issues: &mut Vec<VerificationIssue>,
    ) {
        let key_columns = match self.source.primary_key(name).await {
            Ok(k) => k,
            Err(e) => {
                issues.push(check_failed(name, "spot check", e));
                return;
            }
        };
        let [key_column] = key_columns.as_slice() else {
            debug!("{}: spot check skipped, no single-column key", name);
            result
                .skipped_checks
                .push("spot check: needs a single-column primary key".into());
            return;
        };

        let timestamps = self.timestamp_columns(table);
        if timestamps.is_none() {
            result.skipped_checks.push(format!(
                "spot check timestamps: no {} column",
                self.options.timestamp_column
            ));
        }

        let keys = match self
            .source
            .sample_keys(name, key_column, self.options.sample_size)
            .await
        {
            Ok(k) => k,
            Err(e) => {
                issues.push(check_failed(name, "spot check", e));
                return;
            }
        };

        for key in &keys {
            result.rows_sampled += 1;
            if let Err(e) = self
                .spot_check_row(name, key_column, key, timestamps, issues)
                .await
            {
                issues.push(check_failed(name, "spot check", e));
            }
        }
    }

    async fn spot_check_row(
        &self,
        name: &str,
        key_column: &str,
        key: &PkValue,
        timestamps: Option<(&str, &str)>,
        issues: &mut Vec<VerificationIssue>,
    ) -> Result<()> {
        // Without a timestamp column, look the key itself up to test existence.
        let (target_column, source_column) = timestamps.unwrap_or((key_column, key_column));

        let Some(target_value) = self
            .target
            .lookup_value(name, key_column, key, target_column)
            .await?
        else {
            issues.push(VerificationIssue::new(
                name,
                IssueKind::SpotCheckMissing,
                format!("row {}={} missing in target", key_column, key),
            ));
            return Ok(());
        };

        if timestamps.is_none() {
            return Ok(());
        }
        let Some(source_value) = self
            .source
            .lookup_value(name, key_column, key, source_column)
            .await?
        else {
            return Ok(());
        };

        let expected = normalize_timestamp(&source_value);
        let actual = normalize_timestamp(&target_value);
        if expected != actual {
            issues.push(VerificationIssue::new(
                name,
                IssueKind::SpotCheckMismatch,
                format!(
                    "{} for {}={}: source {}, target {}",
                    target_column,
                    key_column,
                    key,
                    expected.as_deref().unwrap_or("NULL"),
                    actual.as_deref().unwrap_or("NULL")
                ),
            ));
        }
        Ok(())
    }

    async fn check_timestamp_range(
        &self,
        name: &str,
        table: &TableDiff,
        result: &mut TableVerifyResult,
        issues: &mut Vec<VerificationIssue>,
    ) {
        let Some((target_column, source_column)) = self.timestamp_columns(table) else {
            result.skipped_checks.push(format!(
                "timestamp range: no {} column",
                self.options.timestamp_column
            ));
            return;
        };

        let source = self.source.column_bounds(name, source_column).await;
        let target = self.target.column_bounds(name, target_column).await;
        let ((source_min, source_max), (target_min, target_max)) = match (source, target) {
            (Ok(s), Ok(t)) => (s, t),
            (Err(e), _) | (_, Err(e)) => {
                issues.push(check_failed(name, "timestamp range", e));
                return;
            }
        };

        for (bound, s, t) in [("MIN", source_min, target_min), ("MAX", source_max, target_max)] {
            let expected = normalize_timestamp(&s);
            let actual = normalize_timestamp(&t);
            if expected != actual {
                issues.push(VerificationIssue::new(
                    name,
                    IssueKind::TimestampRange,
                    format!(
                        "{}({}): source {}, target {}",
                        bound,
                        target_column,
                        expected.as_deref().unwrap_or("NULL"),
                        actual.as_deref().unwrap_or("NULL")
                    ),
                ));
            }
        }
    }

    async fn check_new_nullable(&self, name: &str, table: &TableDiff, issues: &mut Vec<VerificationIssue>) {
        for column in table.columns_with(ColumnAction::NewNullable) {
            match self.target.non_null_count(name, column).await {
                Ok(0) => {}
                Ok(n) => issues.push(VerificationIssue::new(
                    name,
                    IssueKind::NewNullablePopulated,
                    format!("new nullable column {} has {} non-null values", column, n),
                )),
                Err(e) => issues.push(check_failed(name, "new nullable check", e)),
            }
        }
    }

    async fn verify_invariants(&self, mapping: &MigrationMapping) -> Vec<VerificationIssue> {
        let mut issues = Vec::new();

        if let Some(column) = self.invariant_column(&self.options.credential_column) {
            issues.extend(invariants::check_credential(self.target, column).await);
        }
        if let Some(column) = self.invariant_column(&self.options.external_id_column) {
            issues.extend(
                invariants::check_external_ids(self.source, self.target, mapping, column).await,
            );
        }
        if let Some(column) = self.invariant_column(&self.options.date_sample_column) {
            issues.extend(
                invariants::check_date_sample(
                    self.source,
                    self.target,
                    mapping,
                    column,
                    self.options.date_sample_size,
                )
                .await,
            );
        }

        if !issues.is_empty() {
            warn!("domain invariants: {} issues", issues.len());
        }
        issues
    }

    fn invariant_column<'c>(&self, column: &'c Option<ColumnRef>) -> Option<&'c ColumnRef> {
        column.as_ref().filter(|c| self.options.includes(&c.table))
    }
}

fn check_failed(table: &str, check: &str, err: MigrateError) -> VerificationIssue {
    VerificationIssue::new(table, IssueKind::CheckFailed, format!("{}: {}", check, err))
}
