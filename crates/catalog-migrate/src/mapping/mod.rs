//! The persisted migration mapping.
//!
//! Produced by `analyze`, consumed by `migrate` and `verify`. The mapping is
//! a plain JSON document so it can be reviewed (and edited) between phases.

mod types;

pub use types::{ColumnAction, ColumnDiff, TableDiff, TableStatus};

use crate::error::{MigrateError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Full diff between the source and target catalogs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationMapping {
    /// When the mapping was generated.
    pub generated_at: DateTime<Utc>,

    /// Number of base tables in the source catalog.
    #[serde(rename = "publishing_table_count")]
    pub source_table_count: usize,

    /// Number of base tables in the target catalog.
    #[serde(rename = "climactic_table_count")]
    pub target_table_count: usize,

    /// Per-table classification, keyed by table name.
    pub tables: BTreeMap<String, TableDiff>,

    /// Every table name, ordered by (tier, name).
    pub import_order: Vec<String>,
}

/// Counts shown after analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappingSummary {
    pub matched_tables: usize,
    pub new_in_source: usize,
    pub removed_from_source: usize,
    /// Column count per action across matched tables.
    pub column_actions: BTreeMap<ColumnAction, usize>,
    /// Table count per import tier.
    pub tiers: BTreeMap<u8, usize>,
}

impl MigrationMapping {
    /// Load a mapping from a JSON file.
    ///
    /// A missing or malformed file is a mapping error, as is an import order
    /// that does not list every table exactly once.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::MappingFile(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mapping: Self = serde_json::from_str(&content).map_err(|e| {
            MigrateError::MappingFile(format!("{} is not a valid mapping: {}", path.display(), e))
        })?;
        mapping.check_import_order()?;
        Ok(mapping)
    }

    /// Save the mapping as pretty JSON (atomic write).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// SHA-256 over the tables and import order.
    ///
    /// `generated_at` is excluded so that re-running analysis against
    /// unchanged catalogs yields the same fingerprint.
    pub fn fingerprint(&self) -> String {
        #[derive(Serialize)]
        struct Fingerprinted<'a> {
            tables: &'a BTreeMap<String, TableDiff>,
            import_order: &'a [String],
        }

        let body = Fingerprinted {
            tables: &self.tables,
            import_order: &self.import_order,
        };
        // BTreeMap keys and struct fields serialize in a fixed order
        let json = serde_json::to_string(&body).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Matched tables in import order.
    pub fn matched_tables(&self) -> impl Iterator<Item = (&str, &TableDiff)> {
        self.import_order.iter().filter_map(move |name| {
            self.tables
                .get(name)
                .filter(|t| t.status == TableStatus::Matched)
                .map(|t| (name.as_str(), t))
        })
    }

    /// Summary counts for display.
    pub fn summary(&self) -> MappingSummary {
        let mut summary = MappingSummary::default();
        for table in self.tables.values() {
            match table.status {
                TableStatus::Matched => {
                    summary.matched_tables += 1;
                    for diff in table.columns.values() {
                        *summary.column_actions.entry(diff.action()).or_default() += 1;
                    }
                }
                TableStatus::NewInSource => summary.new_in_source += 1,
                TableStatus::RemovedFromSource => summary.removed_from_source += 1,
            }
            *summary.tiers.entry(table.import_tier).or_default() += 1;
        }
        summary
    }

    fn check_import_order(&self) -> Result<()> {
        let ordered: BTreeSet<&str> = self.import_order.iter().map(String::as_str).collect();
        if ordered.len() != self.import_order.len() {
            return Err(MigrateError::MappingFile(
                "import_order lists a table more than once".into(),
            ));
        }
        let keys: BTreeSet<&str> = self.tables.keys().map(String::as_str).collect();
        if ordered != keys {
            let missing: Vec<&str> = keys.difference(&ordered).copied().collect();
            let unknown: Vec<&str> = ordered.difference(&keys).copied().collect();
            return Err(MigrateError::MappingFile(format!(
                "import_order does not match tables (missing: {:?}, unknown: {:?})",
                missing, unknown
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typemap::DefaultValue;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_mapping() -> MigrationMapping {
        let mut columns = BTreeMap::new();
        columns.insert(
            "id".to_string(),
            ColumnDiff::DirectMatch {
                source_type: "bigint".into(),
                target_type: "bigint".into(),
                note: None,
            },
        );
        columns.insert(
            "score".to_string(),
            ColumnDiff::NewRequired {
                target_type: "integer".into(),
                default: DefaultValue::Literal(json!(0)),
            },
        );

        let mut tables = BTreeMap::new();
        tables.insert(
            "users".to_string(),
            TableDiff {
                status: TableStatus::Matched,
                columns,
                foreign_keys: vec![],
                import_tier: 1,
            },
        );
        tables.insert(
            "legacy_log".to_string(),
            TableDiff {
                status: TableStatus::NewInSource,
                columns: BTreeMap::new(),
                foreign_keys: vec![],
                import_tier: 0,
            },
        );

        MigrationMapping {
            generated_at: Utc::now(),
            source_table_count: 2,
            target_table_count: 1,
            tables,
            import_order: vec!["legacy_log".into(), "users".into()],
        }
    }

    #[test]
    fn test_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mapping.json");

        let mapping = sample_mapping();
        mapping.save(&path).unwrap();

        let loaded = MigrationMapping::load(&path).unwrap();
        assert_eq!(loaded, mapping);
        assert!(!dir.path().join("mapping.tmp").exists());
    }

    #[test]
    fn test_serialized_field_names() {
        let value = serde_json::to_value(sample_mapping()).unwrap();
        assert_eq!(value["publishing_table_count"], json!(2));
        assert_eq!(value["climactic_table_count"], json!(1));
        assert_eq!(value["tables"]["users"]["status"], json!("matched"));
        assert_eq!(
            value["tables"]["users"]["columns"]["score"]["action"],
            json!("new_required")
        );
    }

    #[test]
    fn test_fingerprint_ignores_generated_at() {
        let a = sample_mapping();
        let mut b = a.clone();
        b.generated_at = a.generated_at + chrono::Duration::hours(1);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        b.import_order.reverse();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_load_missing_file_is_mapping_error() {
        let dir = TempDir::new().unwrap();
        let err = MigrationMapping::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, MigrateError::MappingFile(_)));
    }

    #[test]
    fn test_load_invalid_json_is_mapping_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mapping.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = MigrationMapping::load(&path).unwrap_err();
        assert!(matches!(err, MigrateError::MappingFile(_)));
    }

    #[test]
    fn test_load_rejects_incomplete_import_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mapping.json");
        let mut mapping = sample_mapping();
        mapping.import_order.pop();
        std::fs::write(&path, serde_json::to_string(&mapping).unwrap()).unwrap();

        let err = MigrationMapping::load(&path).unwrap_err();
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn test_matched_tables_and_summary() {
        let mapping = sample_mapping();
        let matched: Vec<&str> = mapping.matched_tables().map(|(n, _)| n).collect();
        assert_eq!(matched, vec!["users"]);

        let summary = mapping.summary();
        assert_eq!(summary.matched_tables, 1);
        assert_eq!(summary.new_in_source, 1);
        assert_eq!(summary.column_actions[&ColumnAction::DirectMatch], 1);
        assert_eq!(summary.column_actions[&ColumnAction::NewRequired], 1);
        assert_eq!(summary.tiers[&0], 1);
        assert_eq!(summary.tiers[&1], 1);
    }
}
