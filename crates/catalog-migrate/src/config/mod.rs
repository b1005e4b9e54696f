//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl DatabaseConfig {
    /// Build a tokio-postgres config. TLS is chosen separately from `ssl_mode`.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config.host(&self.host);
        pg_config.port(self.port);
        pg_config.dbname(&self.database);
        pg_config.user(&self.user);
        pg_config.password(&self.password);
        pg_config.application_name("catalog-migrate");
        pg_config
    }

    /// `host:port/database` for logging.
    pub fn display_name(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const YAML: &str = r#"
source:
  host: legacy-db
  database: publishing
  user: reader
  password: secret
target:
  host: new-db
  port: 6543
  database: climactic
  user: writer
  ssl_mode: disable
migration:
  batch_size: 250
  default_overrides:
    status: "active"
    stores.opened_at: "09:00:00"
  tier_overrides:
    widgets: 2
verify:
  credential_column: users.password_hash
  external_id_column: users.stripe_customer_id
"#;

    #[test]
    fn test_from_yaml_with_defaults() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.source.port, 5432);
        assert_eq!(config.source.schema, "public");
        assert_eq!(config.source.ssl_mode, SslMode::Require);
        assert_eq!(config.target.ssl_mode, SslMode::Disable);
        assert_eq!(config.source.max_connections, 4);
        assert_eq!(config.target.port, 6543);
        assert_eq!(config.target.password, "");

        assert_eq!(config.migration.batch_size, 250);
        assert_eq!(config.migration.mapping_file, "migration_mapping.json");
        assert_eq!(config.migration.checkpoint_file, "migration_checkpoint.json");
        assert_eq!(config.migration.default_overrides["status"], json!("active"));
        assert_eq!(config.migration.tier_overrides["widgets"], 2);

        assert_eq!(config.verify.timestamp_column, "created_at");
        assert_eq!(config.verify.sample_size, 5);
        assert_eq!(
            config.verify.credential_column,
            Some(ColumnRef::new("users", "password_hash"))
        );
        assert!(config.verify.date_sample_column.is_none());
    }

    #[test]
    fn test_malformed_column_ref_rejected() {
        let yaml = YAML.replace("users.password_hash", "password_hash");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("table.column"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_ssl_mode_names() {
        let yaml = YAML.replace("ssl_mode: disable", "ssl_mode: verify-ca");
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.target.ssl_mode, SslMode::VerifyCa);
        assert_eq!(config.target.ssl_mode.to_string(), "verify-ca");

        let yaml = YAML.replace("ssl_mode: disable", "ssl_mode: prefer");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, MigrateError::Yaml(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_section_rejected() {
        let err = Config::from_yaml("source:\n  host: x\n").unwrap_err();
        assert!(matches!(err, MigrateError::Yaml(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/config.yaml").unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[test]
    fn test_pg_config() {
        let config = Config::from_yaml(YAML).unwrap();
        let pg = config.target.pg_config();
        assert_eq!(pg.get_dbname(), Some("climactic"));
        assert_eq!(pg.get_user(), Some("writer"));
        assert_eq!(pg.get_ports(), &[6543]);
        assert_eq!(config.target.display_name(), "new-db:6543/climactic");
    }
}
