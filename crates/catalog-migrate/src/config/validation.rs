//! Configuration validation.

use super::{Config, DatabaseConfig};
use crate::diff::tier::MAX_REFERENCE_TIER;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_database("source", &config.source)?;
    validate_database("target", &config.target)?;

    // Cannot migrate into the tables being read
    if config.source.host == config.target.host
        && config.source.port == config.target.port
        && config.source.database == config.target.database
        && config.source.schema == config.target.schema
    {
        return Err(MigrateError::Config(
            "source and target cannot be the same database and schema".into(),
        ));
    }

    if config.migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    if config.migration.mapping_file.is_empty() {
        return Err(MigrateError::Config("migration.mapping_file is required".into()));
    }
    if config.migration.checkpoint_file.is_empty() {
        return Err(MigrateError::Config(
            "migration.checkpoint_file is required".into(),
        ));
    }
    for (table, tier) in &config.migration.tier_overrides {
        if *tier > MAX_REFERENCE_TIER {
            return Err(MigrateError::Config(format!(
                "migration.tier_overrides.{} must be between 0 and {}, got {}",
                table, MAX_REFERENCE_TIER, tier
            )));
        }
    }

    if config.verify.sample_size == 0 {
        return Err(MigrateError::Config(
            "verify.sample_size must be at least 1".into(),
        ));
    }
    if config.verify.date_sample_column.is_some() && config.verify.date_sample_size == 0 {
        return Err(MigrateError::Config(
            "verify.date_sample_size must be at least 1".into(),
        ));
    }
    if config.verify.timestamp_column.is_empty() {
        return Err(MigrateError::Config(
            "verify.timestamp_column is required".into(),
        ));
    }

    Ok(())
}

fn validate_database(side: &str, db: &DatabaseConfig) -> Result<()> {
    if db.host.is_empty() {
        return Err(MigrateError::Config(format!("{}.host is required", side)));
    }
    if db.database.is_empty() {
        return Err(MigrateError::Config(format!("{}.database is required", side)));
    }
    if db.user.is_empty() {
        return Err(MigrateError::Config(format!("{}.user is required", side)));
    }
    if db.max_connections == 0 {
        return Err(MigrateError::Config(format!(
            "{}.max_connections must be at least 1",
            side
        )));
    }
    Ok(())
}
