//! Verification issues and the aggregated report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Table name used for issues raised by the global domain checks.
pub const GLOBAL_SCOPE: &str = "(global)";

/// Category of a verification issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Source and target row counts differ.
    CountMismatch,
    /// Target rows reference a missing parent row.
    ForeignKeyOrphans,
    /// A sampled source row is absent from the target.
    SpotCheckMissing,
    /// A sampled row's timestamp differs.
    SpotCheckMismatch,
    /// MIN or MAX timestamp differs.
    TimestampRange,
    /// A new nullable column holds values in the target.
    NewNullablePopulated,
    /// The credential column has null or empty values.
    BlankCredential,
    /// External-identifier populations differ.
    ExternalIdCount,
    /// A sampled date differs at date granularity.
    DateSampleMismatch,
    /// A check query failed; the check could not run.
    CheckFailed,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueKind::CountMismatch => "count_mismatch",
            IssueKind::ForeignKeyOrphans => "foreign_key_orphans",
            IssueKind::SpotCheckMissing => "spot_check_missing",
            IssueKind::SpotCheckMismatch => "spot_check_mismatch",
            IssueKind::TimestampRange => "timestamp_range",
            IssueKind::NewNullablePopulated => "new_nullable_populated",
            IssueKind::BlankCredential => "blank_credential",
            IssueKind::ExternalIdCount => "external_id_count",
            IssueKind::DateSampleMismatch => "date_sample_mismatch",
            IssueKind::CheckFailed => "check_failed",
        };
        f.write_str(s)
    }
}

/// One finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationIssue {
    pub table: String,
    pub kind: IssueKind,
    pub detail: String,
}

impl VerificationIssue {
    pub fn new(table: impl Into<String>, kind: IssueKind, detail: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            kind,
            detail: detail.into(),
        }
    }
}

/// Per-table figures for the summary table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableVerifyResult {
    pub table: String,
    pub source_row_count: i64,
    pub target_row_count: i64,
    /// Foreign-key edges checked for orphans.
    pub edges_checked: usize,
    /// Source rows spot-checked.
    pub rows_sampled: usize,
    pub issues: usize,
    /// Checks that did not apply, with the reason.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_checks: Vec<String>,
    pub duration_ms: u64,
}

/// Outcome of a verification run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationReport {
    pub tables: Vec<TableVerifyResult>,
    pub issues: Vec<VerificationIssue>,
    pub duration_ms: u64,
}

impl VerificationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// PASS iff no issue was found.
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }

    /// Add a table's figures and issues.
    pub fn add_table(&mut self, mut result: TableVerifyResult, issues: Vec<VerificationIssue>) {
        result.issues = issues.len();
        self.issues.extend(issues);
        self.tables.push(result);
    }

    /// Add issues raised outside any one table.
    pub fn add_global(&mut self, issues: Vec<VerificationIssue>) {
        self.issues.extend(issues);
    }

    /// Issues grouped by table, tables in name order.
    pub fn issues_by_table(&self) -> BTreeMap<&str, Vec<&VerificationIssue>> {
        let mut grouped: BTreeMap<&str, Vec<&VerificationIssue>> = BTreeMap::new();
        for issue in &self.issues {
            grouped.entry(issue.table.as_str()).or_default().push(issue);
        }
        grouped
    }

    /// Issue count per kind.
    pub fn counts_by_kind(&self) -> BTreeMap<IssueKind, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.kind).or_default() += 1;
        }
        counts
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            writeln!(f, "Verification: PASS ({} tables)", self.tables.len())?;
        } else {
            writeln!(
                f,
                "Verification: FAIL ({} issues in {} tables)",
                self.issues.len(),
                self.issues_by_table().len()
            )?;
            for (table, issues) in self.issues_by_table() {
                writeln!(f)?;
                writeln!(f, "{}", table)?;
                for issue in issues {
                    writeln!(f, "  - [{}] {}", issue.kind, issue.detail)?;
                }
            }
        }

        if !self.tables.is_empty() {
            let width = self
                .tables
                .iter()
                .map(|t| t.table.len())
                .max()
                .unwrap_or(0)
                .max("Table".len());
            writeln!(f)?;
            writeln!(
                f,
                "{:<width$}  {:>12}  {:>12}  {:>6}",
                "Table",
                "Source",
                "Target",
                "Issues",
                width = width
            )?;
            for t in &self.tables {
                writeln!(
                    f,
                    "{:<width$}  {:>12}  {:>12}  {:>6}",
                    t.table,
                    t.source_row_count,
                    t.target_row_count,
                    t.issues,
                    width = width
                )?;
            }
        }
        Ok(())
    }
}
