//! Driver registry for looking up drivers by name

use roots_core::DatabaseDriver;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available database drivers
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn DatabaseDriver>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Create a registry with all compiled-in drivers registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "snowflake")]
        registry.register(Arc::new(crate::snowflake::SnowflakeDriver::new()));
        #[cfg(feature = "sqlite")]
        registry.register(Arc::new(crate::sqlite::SqliteDriver::new()));

        registry
    }

    /// Register a new driver
    pub fn register(&mut self, driver: Arc<dyn DatabaseDriver>) {
        let name = driver.name().to_string();
        tracing::info!(driver = %name, "registering database driver");
        self.drivers.insert(name, driver);
    }

    /// Get a driver by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn DatabaseDriver>> {
        let driver = self.drivers.get(&name.to_ascii_lowercase()).cloned();
        if driver.is_none() {
            tracing::warn!(driver = %name, "driver not found in registry");
        }
        driver
    }

    /// List all registered driver names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check if a driver is registered
    pub fn has(&self, name: &str) -> bool {
        self.drivers.contains_key(&name.to_ascii_lowercase())
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(all(test, feature = "sqlite", feature = "snowflake"))]
mod tests {
    use super::*;
    use roots_core::ConnectionConfig;

    #[test]
    fn test_defaults_register_both_drivers() {
        let registry = DriverRegistry::with_defaults();
        assert_eq!(registry.list(), vec!["snowflake", "sqlite"]);
        assert!(registry.has("Snowflake"));
        assert!(registry.get("postgres").is_none());
    }

    #[tokio::test]
    async fn test_lookup_and_connect_sqlite() {
        let registry = DriverRegistry::with_defaults();
        let driver = registry.get("sqlite").expect("sqlite driver registered");
        let conn = driver
            .connect(&ConnectionConfig::new_sqlite(":memory:"))
            .await
            .expect("connect");

        let result = conn.query("SELECT 1 AS one", &[]).await.expect("query");
        assert_eq!(result.row_count(), 1);
    }
}
