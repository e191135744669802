//! Connection factories used by the manager to open fresh sessions

use async_trait::async_trait;
use roots_core::{Connection, ConnectionConfig, DatabaseDriver, Result};
use std::sync::Arc;

/// Opens new connections on behalf of the manager
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Name of the driver behind this factory (selects catalog dialect)
    fn driver_name(&self) -> &str;

    /// Create a new connection
    async fn create(&self) -> Result<Arc<dyn Connection>>;
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    fn driver_name(&self) -> &str {
        (**self).driver_name()
    }

    async fn create(&self) -> Result<Arc<dyn Connection>> {
        (**self).create().await
    }
}

/// Factory backed by a registered driver and a fixed configuration
pub struct DriverFactory {
    driver: Arc<dyn DatabaseDriver>,
    config: ConnectionConfig,
}

impl DriverFactory {
    pub fn new(driver: Arc<dyn DatabaseDriver>, config: ConnectionConfig) -> Self {
        tracing::debug!(
            driver = driver.name(),
            target = %driver.build_connection_string(&config),
            "connection factory configured"
        );
        Self { driver, config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

#[async_trait]
impl ConnectionFactory for DriverFactory {
    fn driver_name(&self) -> &str {
        self.driver.name()
    }

    async fn create(&self) -> Result<Arc<dyn Connection>> {
        self.driver.connect(&self.config).await
    }
}
