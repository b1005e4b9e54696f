//! Catalog metadata queries.

use async_trait::async_trait;
use tracing::debug;

use super::PostgresDb;
use crate::core::{CatalogReader, ColumnDescriptor, ForeignKeyEdge};
use crate::error::Result;

const BASE_TABLES_QUERY: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = $1
      AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

const COLUMNS_QUERY: &str = r#"
    SELECT
        column_name::text,
        data_type::text,
        is_nullable = 'YES',
        column_default::text,
        ordinal_position::int4
    FROM information_schema.columns
    WHERE table_schema = $1 AND table_name = $2
    ORDER BY ordinal_position
"#;

// One row per (constraint, column) pair; composite keys contribute one
// edge per column.
const FOREIGN_KEYS_QUERY: &str = r#"
    SELECT
        t.relname::text AS table_name,
        c.conname::text AS constraint_name,
        a.attname::text AS column_name,
        rt.relname::text AS referenced_table,
        ra.attname::text AS referenced_column
    FROM pg_catalog.pg_constraint c
    JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
    JOIN pg_catalog.pg_class rt ON rt.oid = c.confrelid
    CROSS JOIN LATERAL unnest(c.conkey, c.confkey) AS k(attnum, refnum)
    JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
    JOIN pg_catalog.pg_attribute ra ON ra.attrelid = rt.oid AND ra.attnum = k.refnum
    WHERE n.nspname = $1
      AND c.contype = 'f'
    ORDER BY t.relname, c.conname, a.attname
"#;

#[async_trait]
impl CatalogReader for PostgresDb {
    async fn base_tables(&self) -> Result<Vec<String>> {
        let client = self.client("listing tables").await?;
        let rows = client.query(BASE_TABLES_QUERY, &[&self.schema]).await?;
        let tables: Vec<String> = rows.iter().map(|r| r.get(0)).collect();
        debug!("Found {} base tables in {}", tables.len(), self.schema);
        Ok(tables)
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let client = self.client("loading columns").await?;
        let rows = client.query(COLUMNS_QUERY, &[&self.schema, &table]).await?;

        let columns: Vec<ColumnDescriptor> = rows
            .iter()
            .map(|row| ColumnDescriptor {
                name: row.get(0),
                data_type: row.get(1),
                nullable: row.get(2),
                default: row.get(3),
                ordinal_position: row.get(4),
            })
            .collect();

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    async fn foreign_key_edges(&self) -> Result<Vec<(String, ForeignKeyEdge)>> {
        let client = self.client("loading foreign keys").await?;
        let rows = client.query(FOREIGN_KEYS_QUERY, &[&self.schema]).await?;

        let edges: Vec<(String, ForeignKeyEdge)> = rows
            .iter()
            .map(|row| {
                (
                    row.get(0),
                    ForeignKeyEdge {
                        constraint_name: row.get(1),
                        column_name: row.get(2),
                        referenced_table: row.get(3),
                        referenced_column: row.get(4),
                    },
                )
            })
            .collect();

        debug!("Loaded {} foreign-key columns in {}", edges.len(), self.schema);
        Ok(edges)
    }

    fn db_type(&self) -> &str {
        "postgres"
    }
}
