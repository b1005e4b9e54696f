//! Row reads and aggregate queries.
//!
//! Rows are returned as `to_jsonb(t)` so every column type arrives in one
//! uniform JSON shape. Key values are interpolated as literals
//! (`PkValue::to_sql_literal`), identifiers through `ident::quote`.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::ident;
use super::PostgresDb;
use crate::core::{ForeignKeyEdge, PageCursor, PkValue, Row, TableReader};
use crate::error::{MigrateError, Result};

const PRIMARY_KEY_QUERY: &str = r#"
    SELECT a.attname::text
    FROM pg_catalog.pg_constraint c
    JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
    JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid
    WHERE n.nspname = $1
      AND t.relname = $2
      AND c.contype = 'p'
      AND a.attnum = ANY(c.conkey)
    ORDER BY array_position(c.conkey, a.attnum)
"#;

/// Build the query for one page of rows.
fn page_query(qualified: &str, key_columns: &[String], cursor: &PageCursor, limit: usize) -> Result<String> {
    let order = key_columns
        .iter()
        .map(|k| ident::quote(k).map(|q| format!("t.{}", q)))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let mut sql = format!("SELECT to_jsonb(t) FROM {} t", qualified);
    match cursor {
        PageCursor::Start => sql.push_str(&format!(" ORDER BY {} LIMIT {}", order, limit)),
        PageCursor::After(key) => {
            let [key_column] = key_columns else {
                return Err(MigrateError::Config(
                    "keyset pagination needs a single-column key".into(),
                ));
            };
            sql.push_str(&format!(
                " WHERE t.{} > {} ORDER BY {} LIMIT {}",
                ident::quote(key_column)?,
                key.to_sql_literal(),
                order,
                limit
            ));
        }
        PageCursor::Offset(offset) => sql.push_str(&format!(
            " ORDER BY {} LIMIT {} OFFSET {}",
            order, limit, offset
        )),
    }
    Ok(sql)
}

fn orphan_query(qualified: &str, referenced: &str, edge: &ForeignKeyEdge) -> Result<String> {
    let column = ident::quote(&edge.column_name)?;
    Ok(format!(
        "SELECT COUNT(*) FROM {} c WHERE c.{col} IS NOT NULL \
         AND NOT EXISTS (SELECT 1 FROM {} p WHERE p.{} = c.{col})",
        qualified,
        referenced,
        ident::quote(&edge.referenced_column)?,
        col = column
    ))
}

fn into_row(value: Value) -> Result<Row> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(MigrateError::Config(format!(
            "expected a JSON object row, got {}",
            other
        ))),
    }
}

impl PostgresDb {
    async fn count(&self, sql: &str, context: &str) -> Result<i64> {
        let client = self.client(context).await?;
        debug!("{}", sql);
        let row = client.query_one(sql, &[]).await?;
        Ok(row.get(0))
    }
}

#[async_trait]
impl TableReader for PostgresDb {
    async fn row_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.qualified(table)?);
        self.count(&sql, "counting rows").await
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>> {
        let client = self.client("loading primary key").await?;
        let rows = client
            .query(PRIMARY_KEY_QUERY, &[&self.schema, &table])
            .await?;
        let key: Vec<String> = rows.iter().map(|r| r.get(0)).collect();
        debug!("Primary key for {}: {:?}", table, key);
        Ok(key)
    }

    async fn read_page(
        &self,
        table: &str,
        key_columns: &[String],
        cursor: &PageCursor,
        limit: usize,
    ) -> Result<Vec<Row>> {
        let sql = page_query(&self.qualified(table)?, key_columns, cursor, limit)?;
        let client = self.client("reading rows").await?;
        debug!("{}", sql);
        let rows = client.query(sql.as_str(), &[]).await?;
        rows.iter().map(|r| into_row(r.get(0))).collect()
    }

    async fn sample_keys(&self, table: &str, key_column: &str, n: usize) -> Result<Vec<PkValue>> {
        let sql = format!(
            "SELECT to_jsonb({}) FROM {} ORDER BY random() LIMIT {}",
            ident::quote(key_column)?,
            self.qualified(table)?,
            n
        );
        let client = self.client("sampling keys").await?;
        let rows = client.query(sql.as_str(), &[]).await?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get::<_, Option<Value>>(0))
            .filter_map(|v| PkValue::from_json(&v))
            .collect())
    }

    async fn lookup_value(
        &self,
        table: &str,
        key_column: &str,
        key: &PkValue,
        column: &str,
    ) -> Result<Option<Value>> {
        ident::validate(column)?;
        let sql = format!(
            "SELECT to_jsonb(t) -> $1::text FROM {} t WHERE t.{} = {} LIMIT 1",
            self.qualified(table)?,
            ident::quote(key_column)?,
            key.to_sql_literal()
        );
        let client = self.client("looking up row").await?;
        let row = client.query_opt(sql.as_str(), &[&column]).await?;
        Ok(row.map(|r| r.get::<_, Option<Value>>(0).unwrap_or(Value::Null)))
    }

    async fn column_bounds(&self, table: &str, column: &str) -> Result<(Value, Value)> {
        let col = ident::quote(column)?;
        let sql = format!(
            "SELECT to_jsonb(MIN({col})), to_jsonb(MAX({col})) FROM {}",
            self.qualified(table)?,
            col = col
        );
        let client = self.client("reading column bounds").await?;
        let row = client.query_one(sql.as_str(), &[]).await?;
        let min: Option<Value> = row.get(0);
        let max: Option<Value> = row.get(1);
        Ok((min.unwrap_or(Value::Null), max.unwrap_or(Value::Null)))
    }

    async fn non_null_count(&self, table: &str, column: &str) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT({}) FROM {}",
            ident::quote(column)?,
            self.qualified(table)?
        );
        self.count(&sql, "counting non-null values").await
    }

    async fn blank_count(&self, table: &str, column: &str) -> Result<i64> {
        let col = ident::quote(column)?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {col} IS NULL OR {col}::text = ''",
            self.qualified(table)?,
            col = col
        );
        self.count(&sql, "counting blank values").await
    }

    async fn orphan_count(&self, table: &str, edge: &ForeignKeyEdge) -> Result<i64> {
        let sql = orphan_query(
            &self.qualified(table)?,
            &self.qualified(&edge.referenced_table)?,
            edge,
        )?;
        self.count(&sql, "counting orphans").await
    }
}
