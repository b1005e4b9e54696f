//! Catalog introspection.
//!
//! Reads base tables, columns and foreign keys through a [`CatalogReader`].
//! Any failure is fatal: a partial snapshot is never returned.

use tracing::{debug, info};

use crate::core::{CatalogReader, ForeignKeyGraph, SchemaSnapshot, TableSchema};
use crate::error::{MigrateError, Result};

/// Snapshot every base table of the reader's primary schema.
pub async fn introspect(reader: &dyn CatalogReader) -> Result<SchemaSnapshot> {
    let tables = reader.base_tables().await.map_err(|e| {
        MigrateError::SchemaIntrospection(format!("{}: listing tables: {}", reader.db_type(), e))
    })?;

    let mut snapshot = SchemaSnapshot::new();
    for name in tables {
        let columns = reader.table_columns(&name).await.map_err(|e| {
            MigrateError::SchemaIntrospection(format!(
                "{}: reading columns of {}: {}",
                reader.db_type(),
                name,
                e
            ))
        })?;
        debug!("{}: {} columns", name, columns.len());
        snapshot.insert(name.clone(), TableSchema::new(name, columns));
    }

    info!("Introspected {} tables from {}", snapshot.len(), reader.db_type());
    Ok(snapshot)
}

/// Group foreign-key columns by owning table.
///
/// One edge per (table, column) participating in a constraint.
pub async fn introspect_foreign_keys(reader: &dyn CatalogReader) -> Result<ForeignKeyGraph> {
    let edges = reader.foreign_key_edges().await.map_err(|e| {
        MigrateError::SchemaIntrospection(format!(
            "{}: reading foreign keys: {}",
            reader.db_type(),
            e
        ))
    })?;

    let mut graph = ForeignKeyGraph::new();
    for (table, edge) in edges {
        graph.entry(table).or_default().push(edge);
    }
    Ok(graph)
}
