//! deadpool-postgres pool setup.

use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::drivers::common::{tls_connector, SslMode};
use crate::error::{EtlError, Result};

/// TCP keepalive idle time.
const KEEPALIVE_IDLE: Duration = Duration::from_secs(30);

fn pg_config(config: &DatabaseConfig) -> PgConfig {
    let mut pg_config = PgConfig::new();
    pg_config.host(&config.host);
    pg_config.port(config.port());
    pg_config.dbname(&config.database);
    pg_config.user(&config.user);
    pg_config.password(&config.password);
    pg_config.keepalives(true);
    pg_config.keepalives_idle(KEEPALIVE_IDLE);
    pg_config.connect_timeout(Duration::from_secs(config.connect_timeout_secs));
    pg_config
}

/// Build a pool for `config` and check that one connection works.
pub(crate) async fn connect_pool(config: &DatabaseConfig, role: &str) -> Result<Pool> {
    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let manager = match tls_connector(SslMode::parse(&config.ssl_mode)?)? {
        Some(tls) => Manager::from_config(pg_config(config), tls, mgr_config),
        None => {
            warn!(
                "PostgreSQL {} TLS is disabled. Credentials will be transmitted in plaintext.",
                role
            );
            Manager::from_config(pg_config(config), tokio_postgres::NoTls, mgr_config)
        }
    };

    let pool = Pool::builder(manager)
        .max_size(config.max_connections as usize)
        .build()
        .map_err(|e| EtlError::pool(e, format!("creating PostgreSQL {} pool", role)))?;

    let client = checkout(&pool, role).await?;
    client.simple_query("SELECT 1").await?;

    info!(
        "Connected to PostgreSQL {}: {} (pool_size={})",
        role,
        config.endpoint(),
        config.max_connections
    );
    Ok(pool)
}

/// Get a pooled client.
pub(crate) async fn checkout(pool: &Pool, role: &str) -> Result<Object> {
    pool.get()
        .await
        .map_err(|e| EtlError::pool(e, format!("getting PostgreSQL {} connection", role)))
}
