//! PostgreSQL driver.
//!
//! [`PostgresDb`] wraps one deadpool-postgres pool per configured database
//! and implements all three core traits:
//!
//! - `CatalogReader` in `catalog.rs` (information_schema / pg_catalog)
//! - `TableReader` in `reader.rs` (rows as `to_jsonb`, aggregate queries)
//! - `TargetWriter` in `writer.rs` (`jsonb_populate_recordset` inserts)
//!
//! Writes and the `session_replication_role` toggle share one dedicated
//! pooled session, held for the lifetime of the value.

mod catalog;
mod ident;
mod reader;
mod writer;

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::drivers::common::tls;
use crate::error::{MigrateError, Result};

/// A pooled connection to one PostgreSQL database and schema.
pub struct PostgresDb {
    pool: Pool,
    schema: String,
    name: String,
    session: Mutex<Option<Object>>,
}

impl PostgresDb {
    /// Create the pool and test one connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let name = config.display_name();
        let pg_config = config.pg_config();
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match tls::connector(config.ssl_mode, &name)? {
            None => {
                warn!("TLS is disabled for {}. Credentials will be transmitted in plaintext.", name);
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(config.max_connections)
                    .build()
                    .map_err(|e| MigrateError::pool(e, format!("creating pool for {}", name)))?
            }
            Some(tls) => {
                let mgr = Manager::from_config(pg_config, tls, mgr_config);
                Pool::builder(mgr)
                    .max_size(config.max_connections)
                    .build()
                    .map_err(|e| MigrateError::pool(e, format!("creating pool for {}", name)))?
            }
        };

        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, format!("testing connection to {}", name)))?;
        client.simple_query("SELECT 1").await?;

        info!("Connected to PostgreSQL: {} (schema {})", name, config.schema);

        Ok(Self {
            pool,
            schema: config.schema.clone(),
            name,
            session: Mutex::new(None),
        })
    }

    /// Schema holding the tables.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    async fn client(&self, context: &str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, format!("{} on {}", context, self.name)))
    }

    /// The dedicated writer session, acquired on first use.
    async fn session(&self) -> Result<MappedMutexGuard<'_, Object>> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.client("acquiring writer session").await?);
        }
        MutexGuard::try_map(guard, |s| s.as_mut())
            .map_err(|_| MigrateError::pool("writer session unavailable", self.name.clone()))
    }

    fn qualified(&self, table: &str) -> Result<String> {
        ident::qualify(&self.schema, table)
    }
}
