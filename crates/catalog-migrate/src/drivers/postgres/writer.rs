//! Insert-or-ignore batch writes and the referential-integrity toggle.
//!
//! A batch is sent as one JSON array parameter and expanded server-side with
//! `jsonb_populate_recordset`, so PostgreSQL casts each value to the column's
//! declared type. Conflicting primary keys are ignored.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::ident;
use super::PostgresDb;
use crate::core::{Row, TargetWriter};
use crate::error::{MigrateError, Result};

fn insert_ignore_query(qualified: &str, columns: &[String]) -> Result<String> {
    let column_list = ident::quote_list(columns)?;
    Ok(format!(
        "INSERT INTO {table} ({cols}) \
         SELECT {cols} FROM jsonb_populate_recordset(NULL::{table}, $1::jsonb) \
         ON CONFLICT DO NOTHING",
        table = qualified,
        cols = column_list
    ))
}

fn replication_role_statement(enabled: bool) -> &'static str {
    if enabled {
        "SET session_replication_role = DEFAULT"
    } else {
        "SET session_replication_role = replica"
    }
}

#[async_trait]
impl TargetWriter for PostgresDb {
    async fn set_referential_integrity(&self, enabled: bool) -> Result<()> {
        let session = self.session().await?;
        session
            .batch_execute(replication_role_statement(enabled))
            .await?;
        info!(
            "Referential integrity {} on {}",
            if enabled { "enabled" } else { "disabled" },
            self.name
        );
        Ok(())
    }

    async fn insert_ignore(&self, table: &str, columns: &[String], rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        if columns.is_empty() {
            return Err(MigrateError::batch_write(table, "no columns to write"));
        }

        let sql = insert_ignore_query(&self.qualified(table)?, columns)?;
        let payload = Value::Array(rows.iter().cloned().map(Value::Object).collect());

        let session = self.session().await?;
        let inserted = session
            .execute(sql.as_str(), &[&payload])
            .await
            .map_err(|e| MigrateError::batch_write(table, e))?;

        debug!("{}: inserted {} of {} rows", table, inserted, rows.len());
        Ok(inserted)
    }
}
