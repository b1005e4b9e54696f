//! # catalog-migrate
//!
//! Schema diff, data migration and integrity verification between two
//! PostgreSQL catalogs: a legacy source and a newer target.
//!
//! The library works in three phases:
//!
//! - **Analyze** introspects both catalogs, classifies every table and column
//!   and writes a JSON migration mapping with a tiered import order
//! - **Migrate** streams rows in primary-key order, transforms them per the
//!   mapping and inserts them with conflict-ignore, checkpointing completed
//!   tables so an interrupted run can resume
//! - **Verify** compares counts, referential integrity, sampled rows and
//!   timestamp ranges, plus configured domain invariants
//!
//! ## Example
//!
//! ```rust,no_run
//! use catalog_migrate::{Config, MigrateRequest, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> catalog_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     orchestrator.analyze(None).await?;
//!     let stats = orchestrator.migrate(&MigrateRequest::default()).await?;
//!     println!("Imported {} rows", stats.imported);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod diff;
pub mod drivers;
pub mod error;
pub mod introspect;
pub mod mapping;
pub mod orchestrator;
pub mod state;
pub mod transfer;
pub mod typemap;
pub mod verify;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, MigrationConfig, VerifyConfig};
pub use drivers::PostgresDb;
pub use error::{MigrateError, Result};
pub use mapping::{MappingSummary, MigrationMapping};
pub use orchestrator::{AnalyzeResult, MigrateRequest, Orchestrator, VerifyRequest};
pub use state::ProgressCheckpoint;
pub use transfer::{MigrationStats, TableStats};
pub use verify::VerificationReport;
