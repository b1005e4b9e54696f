//! Error types for the migration library.

use thiserror::Error;

/// Main error type for analyze, migrate and verify operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database query error
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Catalog metadata could not be read. No partial schema is usable.
    #[error("Schema introspection failed: {0}")]
    SchemaIntrospection(String),

    /// Mapping file missing or not valid JSON
    #[error("Mapping file error: {0}")]
    MappingFile(String),

    /// A batch write failed; the whole batch counts as errored
    #[error("Batch write failed for table {table}: {message}")]
    BatchWrite { table: String, message: String },

    /// A table could not be migrated at all (e.g. source unreadable)
    #[error("Migration failed for table {table}: {message}")]
    TableFatal { table: String, message: String },

    /// Table has no primary key (required for ordered streaming and insert-or-ignore)
    #[error("Table {0} has no primary key - migration requires primary keys")]
    NoPrimaryKey(String),

    /// Checkpoint file error
    #[error("Checkpoint error: {0}")]
    State(String),

    /// Checkpoint was written against a different mapping
    #[error("Mapping has changed since the checkpoint was written - cannot resume. Use --reset-checkpoint to start fresh.")]
    MappingChanged,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a BatchWrite error
    pub fn batch_write(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::BatchWrite {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a TableFatal error
    pub fn table_fatal(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::TableFatal {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this error class.
    ///
    /// 1 is reserved for "ran to completion but found errors or issues".
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 2,
            MigrateError::MappingFile(_) | MigrateError::State(_) | MigrateError::MappingChanged => 3,
            MigrateError::Database(_)
            | MigrateError::Pool { .. }
            | MigrateError::SchemaIntrospection(_) => 4,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
