//! Core traits for database-agnostic introspection, migration and verification.
//!
//! - [`CatalogReader`]: reads catalog metadata (tables, columns, foreign keys)
//! - [`TableReader`]: reads rows and aggregate queries from one connection
//! - [`TargetWriter`]: writes rows to the target and toggles referential integrity
//!
//! The PostgreSQL driver implements all three; tests use an in-memory
//! implementation.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

use super::schema::{ColumnDescriptor, ForeignKeyEdge, PkValue};
use super::value::{PageCursor, Row};

/// Read catalog metadata from a connection.
///
/// Purely informational reads; no side effects.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Base tables (no views) of the primary schema, in name order.
    async fn base_tables(&self) -> Result<Vec<String>>;

    /// Columns of a table ordered by ordinal position.
    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Every foreign-key column as `(owning table, edge)`.
    async fn foreign_key_edges(&self) -> Result<Vec<(String, ForeignKeyEdge)>>;

    /// Short label for logging ("postgres", "memory").
    fn db_type(&self) -> &str;
}

/// Read rows and aggregate queries from a connection.
///
/// Used on both the source (streaming, sampling) and the target
/// (verification).
#[async_trait]
pub trait TableReader: Send + Sync {
    /// Exact row count.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Primary key columns in key order. Empty if the table has none.
    async fn primary_key(&self, table: &str) -> Result<Vec<String>>;

    /// Read up to `limit` rows ordered by `key_columns`, starting at `cursor`.
    async fn read_page(
        &self,
        table: &str,
        key_columns: &[String],
        cursor: &PageCursor,
        limit: usize,
    ) -> Result<Vec<Row>>;

    /// Up to `n` random key values.
    async fn sample_keys(&self, table: &str, key_column: &str, n: usize) -> Result<Vec<PkValue>>;

    /// Value of `column` in the row whose key equals `key`.
    ///
    /// Returns None if no such row exists, `Some(Value::Null)` if the row
    /// exists and the column is null.
    async fn lookup_value(
        &self,
        table: &str,
        key_column: &str,
        key: &PkValue,
        column: &str,
    ) -> Result<Option<Value>>;

    /// MIN and MAX of a column (null when the table is empty).
    async fn column_bounds(&self, table: &str, column: &str) -> Result<(Value, Value)>;

    /// Rows where `column` is not null.
    async fn non_null_count(&self, table: &str, column: &str) -> Result<i64>;

    /// Rows where `column` is null or the empty string.
    async fn blank_count(&self, table: &str, column: &str) -> Result<i64>;

    /// Rows whose FK column is non-null but references no existing row.
    async fn orphan_count(&self, table: &str, edge: &ForeignKeyEdge) -> Result<i64>;
}

/// Write rows to the target connection.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Enable or disable referential-integrity enforcement for the writer's session.
    async fn set_referential_integrity(&self, enabled: bool) -> Result<()>;

    /// Insert rows, ignoring rows whose primary key already exists.
    ///
    /// Only `columns` are written; columns left out take their database
    /// default. Returns the number of rows actually inserted.
    async fn insert_ignore(&self, table: &str, columns: &[String], rows: &[Row]) -> Result<u64>;
}
