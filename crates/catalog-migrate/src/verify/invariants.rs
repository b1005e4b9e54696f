//! Domain invariants checked once per run rather than per table.
//!
//! Each invariant is optional and names its column as `table.column` in the
//! target's naming; the source column is resolved through the mapping so a
//! renamed column is compared against its origin.

use tracing::debug;

use crate::config::ColumnRef;
use crate::core::TableReader;
use crate::mapping::MigrationMapping;

use super::normalize::normalize_date;
use super::types::{IssueKind, VerificationIssue, GLOBAL_SCOPE};

fn issue(kind: IssueKind, detail: String) -> VerificationIssue {
    VerificationIssue::new(GLOBAL_SCOPE, kind, detail)
}

fn failed(check: &str, column: &ColumnRef, err: impl std::fmt::Display) -> VerificationIssue {
    issue(
        IssueKind::CheckFailed,
        format!("{} on {}: {}", check, column, err),
    )
}

/// Source-side name of a target column.
pub(crate) fn source_column_for<'a>(mapping: &'a MigrationMapping, column: &'a ColumnRef) -> &'a str {
    mapping
        .tables
        .get(&column.table)
        .and_then(|t| t.columns.get(&column.column))
        .and_then(|diff| diff.source_column(&column.column))
        .unwrap_or(column.column.as_str())
}

/// The credential column must never be null or empty in the target.
pub(crate) async fn check_credential(target: &dyn TableReader, column: &ColumnRef) -> Vec<VerificationIssue> {
    match target.blank_count(&column.table, &column.column).await {
        Ok(0) => Vec::new(),
        Ok(n) => vec![issue(
            IssueKind::BlankCredential,
            format!("{} has {} null or empty values", column, n),
        )],
        Err(e) => vec![failed("credential check", column, e)],
    }
}

/// Non-null populations of the external-identifier column must match.
pub(crate) async fn check_external_ids(
    source: &dyn TableReader,
    target: &dyn TableReader,
    mapping: &MigrationMapping,
    column: &ColumnRef,
) -> Vec<VerificationIssue> {
    let source_column = source_column_for(mapping, column);
    let source_count = match source.non_null_count(&column.table, source_column).await {
        Ok(n) => n,
        Err(e) => return vec![failed("external id check", column, e)],
    };
    let target_count = match target.non_null_count(&column.table, &column.column).await {
        Ok(n) => n,
        Err(e) => return vec![failed("external id check", column, e)],
    };

    if source_count == target_count {
        debug!("{}: {} external ids on both sides", column, source_count);
        Vec::new()
    } else {
        vec![issue(
            IssueKind::ExternalIdCount,
            format!(
                "{} non-null count: source {}, target {}",
                column, source_count, target_count
            ),
        )]
    }
}

/// Dates on a random sample of source rows must match at date granularity.
pub(crate) async fn check_date_sample(
    source: &dyn TableReader,
    target: &dyn TableReader,
    mapping: &MigrationMapping,
    column: &ColumnRef,
    sample_size: usize,
) -> Vec<VerificationIssue> {
    let table = column.table.as_str();
    let source_column = source_column_for(mapping, column);

    let key_columns = match source.primary_key(table).await {
        Ok(k) => k,
        Err(e) => return vec![failed("date sample", column, e)],
    };
    let [key_column] = key_columns.as_slice() else {
        return vec![failed(
            "date sample",
            column,
            "a single-column primary key is required",
        )];
    };

    let keys = match source.sample_keys(table, key_column, sample_size).await {
        Ok(k) => k,
        Err(e) => return vec![failed("date sample", column, e)],
    };

    let mut issues = Vec::new();
    for key in &keys {
        let source_value = match source.lookup_value(table, key_column, key, source_column).await {
            Ok(Some(v)) => v,
            Ok(None) => continue,
            Err(e) => {
                issues.push(failed("date sample", column, e));
                continue;
            }
        };
        match target.lookup_value(table, key_column, key, &column.column).await {
            Ok(Some(target_value)) => {
                let expected = normalize_date(&source_value);
                let actual = normalize_date(&target_value);
                if expected != actual {
                    issues.push(issue(
                        IssueKind::DateSampleMismatch,
                        format!(
                            "{} for {}={}: source {}, target {}",
                            column,
                            key_column,
                            key,
                            expected.as_deref().unwrap_or("NULL"),
                            actual.as_deref().unwrap_or("NULL")
                        ),
                    ));
                }
            }
            Ok(None) => issues.push(issue(
                IssueKind::DateSampleMismatch,
                format!("{}: row {}={} missing in target", column, key_column, key),
            )),
            Err(e) => issues.push(failed("date sample", column, e)),
        }
    }
    debug!("{}: date sample of {} rows checked", column, keys.len());
    issues
}
