//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use crate::schema::NameCase;

    const YAML: &str = r#"
source:
  type: postgres
  host: localhost
  database: shop
  user: etl
  password: secret
  ssl_mode: disable
target:
  type: mssql
  host: warehouse
  database: dw
  user: sa
  password: secret
  trust_server_cert: true
loader:
  chunk_size: 500
  channel_capacity: 10000
jobs:
  - name: addresses
    extract: SELECT * FROM addresses
    write: INSERT INTO addresses (id, city) VALUES (:id, :city)
"#;

    #[test]
    fn test_from_yaml_with_defaults() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.source.db_type, DbType::Postgres);
        assert_eq!(config.source.port(), 5432);
        assert_eq!(config.target.port(), 1433);
        assert_eq!(config.target.max_connections, 5);
        assert_eq!(config.target.connect_timeout_secs, 15);
        assert!(config.target.encrypt);
        assert_eq!(config.loader.chunk_size, 500);
        assert_eq!(config.loader.channel_capacity, Some(10_000));
        assert_eq!(config.loader.progress_interval, 10_000);
        assert_eq!(config.loader.column_case, NameCase::Upper);
        assert_eq!(config.jobs.len(), 1);
    }

    #[test]
    fn test_loader_defaults_when_section_missing() {
        let yaml = YAML.replace("loader:\n  chunk_size: 500\n  channel_capacity: 10000\n", "");
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.loader.chunk_size, 2000);
        assert_eq!(config.loader.channel_capacity, None);
    }

    #[test]
    fn test_unknown_db_type_is_yaml_error() {
        let yaml = YAML.replace("type: mssql", "type: oracle");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, EtlError::Yaml(_)));
        assert_eq!(err.exit_code(), 2);
    }
}
