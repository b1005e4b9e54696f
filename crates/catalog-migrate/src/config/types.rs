//! Configuration types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source (legacy) database, read from.
    pub source: DatabaseConfig,

    /// Target (newer) database, written to.
    pub target: DatabaseConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Verification configuration.
    #[serde(default)]
    pub verify: VerifyConfig,
}

/// PostgreSQL connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schema holding the tables (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// TLS mode (default: require).
    #[serde(default)]
    pub ssl_mode: SslMode,

    /// Pool size (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// TLS mode, spelled as in libpq.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    /// Plain TCP.
    Disable,
    /// Encrypted, server certificate not checked.
    #[default]
    Require,
    VerifyCa,
    VerifyFull,
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SslMode::Disable => "disable",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        })
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Mapping file written by analyze and read by migrate/verify.
    #[serde(default = "default_mapping_file")]
    pub mapping_file: String,

    /// Checkpoint file for resume.
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,

    /// Rows per read page and write batch (default: 500).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Defaults for required columns that have none, keyed by column name
    /// or `table.column`.
    #[serde(default)]
    pub default_overrides: BTreeMap<String, Value>,

    /// Import tiers (0-4) for table names, merged over the built-in table.
    #[serde(default)]
    pub tier_overrides: BTreeMap<String, u8>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            mapping_file: default_mapping_file(),
            checkpoint_file: default_checkpoint_file(),
            batch_size: default_batch_size(),
            default_overrides: BTreeMap::new(),
            tier_overrides: BTreeMap::new(),
        }
    }
}

/// Verification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Creation-timestamp column used by the spot check and range check.
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,

    /// Source rows spot-checked per table (default: 5).
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Column that must never be null or empty in the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_column: Option<ColumnRef>,

    /// Column whose non-null count must match between source and target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id_column: Option<ColumnRef>,

    /// Date column compared on a random sample at date granularity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_sample_column: Option<ColumnRef>,

    /// Rows in the date sample (default: 10).
    #[serde(default = "default_date_sample_size")]
    pub date_sample_size: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            timestamp_column: default_timestamp_column(),
            sample_size: default_sample_size(),
            credential_column: None,
            external_id_column: None,
            date_sample_column: None,
            date_sample_size: default_date_sample_size(),
        }
    }
}

/// A `table.column` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl TryFrom<String> for ColumnRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.split_once('.') {
            Some((table, column))
                if !table.is_empty() && !column.is_empty() && !column.contains('.') =>
            {
                Ok(Self::new(table, column))
            }
            _ => Err(format!("expected table.column, got '{}'", value)),
        }
    }
}

impl From<ColumnRef> for String {
    fn from(value: ColumnRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_max_connections() -> usize {
    4
}

fn default_mapping_file() -> String {
    "migration_mapping.json".to_string()
}

fn default_checkpoint_file() -> String {
    "migration_checkpoint.json".to_string()
}

fn default_batch_size() -> usize {
    500
}

fn default_timestamp_column() -> String {
    "created_at".to_string()
}

fn default_sample_size() -> usize {
    5
}

fn default_date_sample_size() -> usize {
    10
}
