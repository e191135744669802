//! Snowflake driver implementation

use async_trait::async_trait;
use roots_core::{Connection, ConnectionConfig, DatabaseDriver, Result, RootsError};
use std::sync::Arc;

use crate::SnowflakeOptions;

/// Snowflake data warehouse driver
pub struct SnowflakeDriver;

impl SnowflakeDriver {
    /// Create a new Snowflake driver instance
    pub fn new() -> Self {
        tracing::debug!(odbc = cfg!(feature = "odbc"), "Snowflake driver initialized");
        Self
    }
}

impl Default for SnowflakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for SnowflakeDriver {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    #[tracing::instrument(skip(self, config), fields(account = %config.host))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let options = SnowflakeOptions::from_config(config)?;
        open(options).await
    }

    fn build_connection_string(&self, config: &ConnectionConfig) -> String {
        match SnowflakeOptions::from_config(config) {
            Ok(options) => options.redacted_connection_string(),
            Err(e) => format!("<incomplete: {}>", e),
        }
    }
}

#[cfg(feature = "odbc")]
async fn open(options: SnowflakeOptions) -> Result<Arc<dyn Connection>> {
    let conn = tokio::task::spawn_blocking(move || crate::OdbcConnection::open(&options))
        .await
        .map_err(|e| RootsError::Connection(format!("ODBC connect worker failed: {}", e)))?
        .map_err(|e| {
            tracing::error!(error = %e, "failed to connect to Snowflake");
            e
        })?;
    Ok(Arc::new(conn))
}

#[cfg(not(feature = "odbc"))]
async fn open(options: SnowflakeOptions) -> Result<Arc<dyn Connection>> {
    tracing::error!(
        connection = %options.redacted_connection_string(),
        "Snowflake driver built without ODBC support"
    );
    Err(RootsError::NotSupported(
        "this build has no ODBC support; rebuild with the `odbc` feature of roots-driver-snowflake"
            .into(),
    ))
}
