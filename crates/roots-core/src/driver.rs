//! Database driver trait definition

use crate::{Connection, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Trait implemented by every warehouse/database driver
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Driver identifier (e.g., "sqlite", "snowflake")
    fn name(&self) -> &'static str;

    /// Open a new connection
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>>;

    /// Open a connection, run a trivial query and close it again
    async fn test_connection(&self, config: &ConnectionConfig) -> Result<()> {
        let conn = self.connect(config).await?;
        let probe = conn.query("SELECT 1", &[]).await;
        if let Err(e) = conn.close().await {
            tracing::warn!(error = %e, "failed to close test connection");
        }
        probe.map(|_| ())
    }

    /// Build a connection string with credentials redacted, suitable for logs
    fn build_connection_string(&self, config: &ConnectionConfig) -> String;
}

/// Connection configuration handed to a driver
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Display name
    pub name: String,
    /// Driver ID (e.g., "snowflake", "sqlite")
    pub driver: String,
    /// Host or account identifier (empty for file-based databases)
    pub host: String,
    /// Database name or file path
    pub database: Option<String>,
    /// Username
    pub username: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Additional driver-specific parameters (schema, warehouse, role, timeouts)
    pub params: HashMap<String, String>,
}

impl ConnectionConfig {
    /// Create a new configuration with default values
    pub fn new(driver: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            driver: driver.to_string(),
            host: String::new(),
            database: None,
            username: None,
            password: None,
            params: HashMap::new(),
        }
    }

    /// Create a SQLite configuration
    pub fn new_sqlite(database_path: &str) -> Self {
        let mut config = Self::new("sqlite", "SQLite Database");
        config.database = Some(database_path.to_string());
        config
    }

    /// Set a connection parameter
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        let str_val = match value.into() {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        self.params.insert(key.to_string(), str_val);
        self
    }

    /// Get a string parameter
    pub fn get_string(&self, key: &str) -> Option<String> {
        if let Some(val) = self.params.get(key) {
            return Some(val.clone());
        }
        match key {
            "host" | "account" if !self.host.is_empty() => Some(self.host.clone()),
            "database" | "path" => self.database.clone(),
            "username" | "user" => self.username.clone(),
            "password" => self.password.clone(),
            _ => None,
        }
    }

    /// Get a numeric parameter
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get_string(key).and_then(|v| v.trim().parse().ok())
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("name", &self.name)
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("params", &self.params)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_string_prefers_params() {
        let mut config = ConnectionConfig::new("snowflake", "warehouse");
        config.host = "xy12345.ap-south-1".into();
        config.database = Some("ROOTS_ROUTES".into());
        let config = config.with_param("schema", "PUBLIC").with_param("login_timeout", 60);

        assert_eq!(config.get_string("account").as_deref(), Some("xy12345.ap-south-1"));
        assert_eq!(config.get_string("database").as_deref(), Some("ROOTS_ROUTES"));
        assert_eq!(config.get_string("schema").as_deref(), Some("PUBLIC"));
        assert_eq!(config.get_u64("login_timeout"), Some(60));
        assert_eq!(config.get_string("role"), None);
    }

    #[test]
    fn test_empty_host_is_absent() {
        let config = ConnectionConfig::new_sqlite(":memory:");
        assert_eq!(config.get_string("host"), None);
        assert_eq!(config.get_string("path").as_deref(), Some(":memory:"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = ConnectionConfig::new("snowflake", "warehouse");
        config.password = Some("hunter2".into());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }
}
