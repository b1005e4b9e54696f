//! File-based checkpoint for resume capability.
//!
//! The checkpoint is append-only: a table is added once it has migrated with
//! zero errors and is never removed except by a reset. Writes are atomic
//! (temp file, then rename). A single writer is assumed; concurrent runs
//! against the same file are not coordinated.

use crate::error::{MigrateError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Tables completed by earlier runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressCheckpoint {
    /// Tables fully migrated with zero errors.
    pub completed_tables: BTreeSet<String>,

    /// When the checkpoint was last written.
    pub last_updated: DateTime<Utc>,

    /// Fingerprint of the mapping the checkpoint was written against.
    /// Optional for checkpoints written without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_hash: Option<String>,
}

impl Default for ProgressCheckpoint {
    fn default() -> Self {
        Self {
            completed_tables: BTreeSet::new(),
            last_updated: Utc::now(),
            mapping_hash: None,
        }
    }
}

impl ProgressCheckpoint {
    pub fn new(mapping_hash: impl Into<String>) -> Self {
        Self {
            mapping_hash: Some(mapping_hash.into()),
            ..Self::default()
        }
    }

    /// Load a checkpoint. A missing file is an empty checkpoint.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            MigrateError::State(format!("{} is not a valid checkpoint: {}", path.display(), e))
        })
    }

    /// Save the checkpoint (atomic write).
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.last_updated = Utc::now();

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| MigrateError::State(format!("Failed to serialize checkpoint: {}", e)))?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Check that the checkpoint belongs to `mapping_hash`.
    ///
    /// An empty checkpoint, or one without a recorded hash, adopts the
    /// mapping.
    pub fn validate_mapping(&mut self, mapping_hash: &str) -> Result<()> {
        match &self.mapping_hash {
            Some(hash) if hash != mapping_hash && !self.completed_tables.is_empty() => {
                Err(MigrateError::MappingChanged)
            }
            _ => {
                self.mapping_hash = Some(mapping_hash.to_string());
                Ok(())
            }
        }
    }

    pub fn is_table_completed(&self, table: &str) -> bool {
        self.completed_tables.contains(table)
    }

    /// Record a table as completed. Returns false if it already was.
    pub fn mark_completed(&mut self, table: &str) -> bool {
        self.completed_tables.insert(table.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_checkpoint_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");

        let mut checkpoint = ProgressCheckpoint::new("abc123");
        checkpoint.mark_completed("users");
        checkpoint.save(&path).unwrap();

        let loaded = ProgressCheckpoint::load(&path).unwrap();
        assert!(loaded.is_table_completed("users"));
        assert!(!loaded.is_table_completed("posts"));
        assert_eq!(loaded.mapping_hash.as_deref(), Some("abc123"));
        assert!(!dir.path().join("checkpoint.tmp").exists());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let loaded = ProgressCheckpoint::load(dir.path().join("none.json")).unwrap();
        assert!(loaded.completed_tables.is_empty());
        assert!(loaded.mapping_hash.is_none());
    }

    #[test]
    fn test_file_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");

        let mut checkpoint = ProgressCheckpoint::default();
        checkpoint.mark_completed("tags");
        checkpoint.mark_completed("roles");
        checkpoint.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["completed_tables"], serde_json::json!(["roles", "tags"]));
        assert!(value["last_updated"].is_string());
        assert!(value.get("mapping_hash").is_none());
        assert!(content.contains('\n'), "checkpoint should be pretty-printed");
    }

    #[test]
    fn test_older_file_without_hash_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");
        std::fs::write(
            &path,
            r#"{"completed_tables": ["users"], "last_updated": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let mut loaded = ProgressCheckpoint::load(&path).unwrap();
        assert!(loaded.is_table_completed("users"));
        assert!(loaded.validate_mapping("anything").is_ok());
        assert_eq!(loaded.mapping_hash.as_deref(), Some("anything"));
    }

    #[test]
    fn test_corrupt_file_is_state_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(
            ProgressCheckpoint::load(&path).unwrap_err(),
            MigrateError::State(_)
        ));
    }

    #[test]
    fn test_mapping_validation() {
        let mut checkpoint = ProgressCheckpoint::new("abc123");
        assert!(checkpoint.validate_mapping("other").is_ok(), "empty checkpoint adopts");

        let mut checkpoint = ProgressCheckpoint::new("abc123");
        checkpoint.mark_completed("users");
        assert!(checkpoint.validate_mapping("abc123").is_ok());
        assert!(matches!(
            checkpoint.validate_mapping("different"),
            Err(MigrateError::MappingChanged)
        ));
    }

    #[test]
    fn test_mark_completed_is_idempotent() {
        let mut checkpoint = ProgressCheckpoint::default();
        assert!(checkpoint.mark_completed("users"));
        assert!(!checkpoint.mark_completed("users"));
        assert_eq!(checkpoint.completed_tables.len(), 1);
    }
}
