//! bb8 connection management for SQL Server.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::{EtlError, Result};

/// Maximum TDS packet size (32767 bytes, ~32KB).
const TDS_MAX_PACKET_SIZE: u32 = 32767;

/// Idle connection timeout (5 minutes).
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

pub(crate) type MssqlClient = Client<Compat<TcpStream>>;
pub(crate) type MssqlPool = Pool<TiberiusConnectionManager>;

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    config: DatabaseConfig,
}

impl TiberiusConnectionManager {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port());
        config.database(&self.config.database);
        config.authentication(AuthMethod::sql_server(
            &self.config.user,
            &self.config.password,
        ));

        if self.config.encrypt {
            if self.config.trust_server_cert {
                config.trust_cert();
            }
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }

        config.packet_size(TDS_MAX_PACKET_SIZE);
        config
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = MssqlClient;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;
        tcp.set_nodelay(true).ok();

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Build a pool for `config` and check that one connection works.
///
/// `role` ("source" or "target") only shows up in logs and errors.
pub(crate) async fn connect_pool(config: &DatabaseConfig, role: &str) -> Result<MssqlPool> {
    if !config.encrypt {
        warn!("SQL Server {} encryption is disabled", role);
    }

    let manager = TiberiusConnectionManager::new(config.clone());
    let pool = Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Some(POOL_IDLE_TIMEOUT))
        .test_on_check_out(true)
        .build(manager)
        .await
        .map_err(|e| EtlError::pool(e, format!("creating SQL Server {} pool", role)))?;

    {
        let mut conn = pool
            .get()
            .await
            .map_err(|e| EtlError::pool(e, format!("testing SQL Server {} connection", role)))?;
        conn.simple_query("SELECT 1").await?.into_row().await?;
    }

    info!(
        "Connected to SQL Server {}: {} (pool_size={})",
        role,
        config.endpoint(),
        config.max_connections
    );
    Ok(pool)
}

/// Get a pooled connection.
pub(crate) async fn checkout<'a>(
    pool: &'a MssqlPool,
    role: &str,
) -> Result<PooledConnection<'a, TiberiusConnectionManager>> {
    pool.get()
        .await
        .map_err(|e| EtlError::pool(e, format!("getting SQL Server {} connection", role)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(yaml: &str) -> DatabaseConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_build_config_uses_default_port() {
        let manager = TiberiusConnectionManager::new(config(
            "type: mssql\nhost: db.internal\ndatabase: sales\nuser: sa\npassword: secret\n",
        ));
        assert_eq!(manager.build_config().get_addr(), "db.internal:1433");
    }

    #[test]
    fn test_build_config_explicit_port() {
        let manager = TiberiusConnectionManager::new(config(
            "type: mssql\nhost: localhost\nport: 14330\ndatabase: sales\nuser: sa\nencrypt: false\n",
        ));
        assert_eq!(manager.build_config().get_addr(), "localhost:14330");
    }
}
