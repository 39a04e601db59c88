//! Configuration validation.

use std::collections::HashSet;

use super::{Config, DatabaseConfig, DbType};
use crate::drivers::common::SslMode;
use crate::error::{EtlError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_database("source", &config.source)?;
    validate_database("target", &config.target)?;

    if config.loader.chunk_size == 0 {
        return Err(EtlError::Config(
            "loader.chunk_size must be at least 1".into(),
        ));
    }
    if let Some(0) = config.loader.channel_capacity {
        return Err(EtlError::Config(
            "loader.channel_capacity must be at least 1 (omit it for an unbounded channel)".into(),
        ));
    }
    if config.loader.progress_interval == 0 {
        return Err(EtlError::Config(
            "loader.progress_interval must be at least 1".into(),
        ));
    }

    if config.jobs.is_empty() {
        return Err(EtlError::Config("at least one job is required".into()));
    }

    let mut names = HashSet::new();
    for (i, job) in config.jobs.iter().enumerate() {
        if job.name.trim().is_empty() {
            return Err(EtlError::Config(format!("jobs[{}].name is required", i)));
        }
        if !names.insert(job.name.as_str()) {
            return Err(EtlError::Config(format!(
                "duplicate job name '{}'",
                job.name
            )));
        }
        if job.extract.trim().is_empty() {
            return Err(EtlError::Config(format!(
                "job '{}': extract query is required",
                job.name
            )));
        }
        if job.write.trim().is_empty() {
            return Err(EtlError::Config(format!(
                "job '{}': write statement is required",
                job.name
            )));
        }
    }

    Ok(())
}

fn validate_database(section: &str, db: &DatabaseConfig) -> Result<()> {
    if db.host.is_empty() {
        return Err(EtlError::Config(format!("{}.host is required", section)));
    }
    if db.database.is_empty() {
        return Err(EtlError::Config(format!("{}.database is required", section)));
    }
    if db.user.is_empty() {
        return Err(EtlError::Config(format!("{}.user is required", section)));
    }
    if db.max_connections == 0 {
        return Err(EtlError::Config(format!(
            "{}.max_connections must be at least 1",
            section
        )));
    }
    if db.db_type == DbType::Postgres && SslMode::parse(&db.ssl_mode).is_err() {
        return Err(EtlError::Config(format!(
            "{}.ssl_mode must be one of disable, require, verify-ca, verify-full, got '{}'",
            section, db.ssl_mode
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DbType, JobConfig, LoaderConfig};

    fn database(db_type: DbType, database: &str) -> DatabaseConfig {
        DatabaseConfig {
            db_type,
            host: "localhost".to_string(),
            port: None,
            database: database.to_string(),
            user: "etl".to_string(),
            password: "password".to_string(),
            ssl_mode: "disable".to_string(),
            encrypt: false,
            trust_server_cert: true,
            max_connections: 5,
            connect_timeout_secs: 15,
        }
    }

    fn valid_config() -> Config {
        Config {
            source: database(DbType::Postgres, "source_db"),
            target: database(DbType::Mssql, "target_db"),
            loader: LoaderConfig::default(),
            jobs: vec![JobConfig {
                name: "addresses".to_string(),
                extract: "SELECT * FROM addresses".to_string(),
                write: "INSERT INTO addresses (id) VALUES (:id)".to_string(),
            }],
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_source_host() {
        let mut config = valid_config();
        config.source.host = "".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("source.host"));
    }

    #[test]
    fn test_zero_chunk_size() {
        let mut config = valid_config();
        config.loader.chunk_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_channel_capacity() {
        let mut config = valid_config();
        config.loader.channel_capacity = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_job_names() {
        let mut config = valid_config();
        let job = config.jobs[0].clone();
        config.jobs.push(job);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate job name 'addresses'"));
    }

    #[test]
    fn test_no_jobs() {
        let mut config = valid_config();
        config.jobs.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_ssl_mode() {
        let mut config = valid_config();
        config.source.ssl_mode = "sometimes".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_database_config_debug_redacts_password() {
        let mut config = valid_config();
        config.source.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.source);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }
}
