//! Startup settings for the warehouse connection
//!
//! Settings are assembled once at startup. Later sources win:
//!
//! 1. built-in defaults
//! 2. `settings.toml` (an explicit path, or the per-user config directory)
//! 3. a `.env` file in the working directory, loaded into the environment
//! 4. `SNOWFLAKE_*` and `ROOTS_*` environment variables

mod env;
mod error;
pub mod settings_file;

pub use env::ENV_VARS;
pub use error::{Result, SettingsError};

use roots_connection::ManagerConfig;
use roots_core::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub warehouse: WarehouseSettings,
    pub policy: ConnectionPolicy,
}

/// Where the analytics data lives and how to log in
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseSettings {
    /// `"snowflake"` or `"sqlite"`
    pub driver: String,
    pub account: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    /// Database file for the sqlite driver
    pub path: Option<String>,
    /// Name of the installed Snowflake ODBC driver
    pub odbc_driver: Option<String>,
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            driver: "snowflake".to_string(),
            account: None,
            user: None,
            password: None,
            database: None,
            schema: None,
            warehouse: None,
            role: None,
            path: None,
            odbc_driver: None,
        }
    }
}

impl std::fmt::Debug for WarehouseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseSettings")
            .field("driver", &self.driver)
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .field("path", &self.path)
            .field("odbc_driver", &self.odbc_driver)
            .finish()
    }
}

/// Timeouts and retry limits for the connection manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionPolicy {
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub statement_timeout_secs: u64,
    pub probe_timeout_secs: u64,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 60,
            idle_timeout_secs: 300,
            max_retries: 3,
            retry_delay_ms: 1000,
            statement_timeout_secs: 300,
            probe_timeout_secs: 5,
        }
    }
}

impl Settings {
    /// Load from every source, reading the real process environment.
    ///
    /// `explicit_path` must exist when given. Without it, the per-user
    /// `settings.toml` is used if present.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env file"),
        }
        Self::load_with(explicit_path, |key| std::env::var(key).ok())
    }

    /// Load the file layers, then overlay variables from `lookup`
    pub fn load_with<F>(explicit_path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None => match settings_file::settings_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        settings.apply_env(lookup)?;
        settings.validate()?;

        tracing::info!(
            driver = %settings.warehouse.driver,
            database = settings.warehouse.database.as_deref().unwrap_or(""),
            "settings loaded"
        );
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "read settings file");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let warehouse = &self.warehouse;
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());

        match warehouse.driver.as_str() {
            "snowflake" => {
                let required = [
                    ("account", &warehouse.account),
                    ("user", &warehouse.user),
                    ("password", &warehouse.password),
                    ("database", &warehouse.database),
                    ("schema", &warehouse.schema),
                    ("warehouse", &warehouse.warehouse),
                ];
                if let Some((name, _)) = required.into_iter().find(|(_, value)| !present(*value)) {
                    return Err(SettingsError::MissingField(name));
                }
            }
            "sqlite" => {
                if !present(&warehouse.path) {
                    return Err(SettingsError::MissingField("path"));
                }
            }
            other => {
                return Err(SettingsError::Invalid {
                    field: "driver".into(),
                    message: format!("unknown driver {other:?}, expected \"snowflake\" or \"sqlite\""),
                });
            }
        }

        if self.policy.max_retries < 1 {
            return Err(SettingsError::Invalid {
                field: "max_retries".into(),
                message: "at least one connection attempt is required".into(),
            });
        }
        Ok(())
    }

    /// Driver configuration for the selected warehouse
    pub fn to_connection_config(&self) -> ConnectionConfig {
        let warehouse = &self.warehouse;
        if warehouse.driver == "sqlite" {
            let path = warehouse.path.as_deref().unwrap_or(":memory:");
            let mut config = ConnectionConfig::new_sqlite(path);
            config.name = "roots-routes".to_string();
            return config;
        }

        let mut config = ConnectionConfig::new(&warehouse.driver, "roots-routes");
        config.host = warehouse.account.clone().unwrap_or_default();
        config.username = warehouse.user.clone();
        config.password = warehouse.password.clone();
        config.database = warehouse.database.clone();

        let optional = [
            ("schema", &warehouse.schema),
            ("warehouse", &warehouse.warehouse),
            ("role", &warehouse.role),
            ("odbc_driver", &warehouse.odbc_driver),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                config = config.with_param(key, value.as_str());
            }
        }
        config
            .with_param("login_timeout", self.policy.connect_timeout_secs)
            .with_param("statement_timeout", self.policy.statement_timeout_secs)
    }

    pub fn manager_config(&self) -> ManagerConfig {
        let policy = &self.policy;
        ManagerConfig::new()
            .with_idle_timeout(Duration::from_secs(policy.idle_timeout_secs))
            .with_max_retries(policy.max_retries)
            .with_retry_delay(Duration::from_millis(policy.retry_delay_ms))
            .with_connect_timeout(Duration::from_secs(policy.connect_timeout_secs))
            .with_probe_timeout(Duration::from_secs(policy.probe_timeout_secs))
            .with_statement_timeout(Duration::from_secs(policy.statement_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn snowflake_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("SNOWFLAKE_ACCOUNT", "xy12345.ap-south-1"),
            ("SNOWFLAKE_USER", "analyst"),
            ("SNOWFLAKE_PASSWORD", "hunter2"),
            ("SNOWFLAKE_DATABASE", "ROOTS_ROUTES"),
            ("SNOWFLAKE_SCHEMA", "PUBLIC"),
            ("SNOWFLAKE_WAREHOUSE", "COMPUTE_WH"),
        ]
    }

    fn write_settings(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write settings");
        file
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.warehouse.driver, "snowflake");
        assert_eq!(settings.policy, ConnectionPolicy::default());
        assert_eq!(settings.policy.max_retries, 3);
        assert_eq!(settings.policy.idle_timeout_secs, 300);
    }

    #[test]
    fn test_environment_only() {
        let file = write_settings("");
        let settings = Settings::load_with(Some(file.path()), vars(&snowflake_env())).expect("load");

        assert_eq!(settings.warehouse.account.as_deref(), Some("xy12345.ap-south-1"));
        assert_eq!(settings.warehouse.role, None);
        assert_eq!(settings.policy, ConnectionPolicy::default());
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_settings(
            r#"
            [warehouse]
            account = "from-file"
            user = "file-user"
            password = "file-pass"
            database = "FILE_DB"
            schema = "RAW"
            warehouse = "SMALL_WH"

            [policy]
            max_retries = 5
            idle_timeout_secs = 120
            "#,
        );
        let env = vars(&[
            ("SNOWFLAKE_DATABASE", "ENV_DB"),
            ("ROOTS_MAX_RETRIES", "2"),
            ("SNOWFLAKE_ROLE", "ANALYST"),
            ("SNOWFLAKE_SCHEMA", "   "),
        ]);

        let settings = Settings::load_with(Some(file.path()), env).expect("load");

        assert_eq!(settings.warehouse.account.as_deref(), Some("from-file"));
        assert_eq!(settings.warehouse.database.as_deref(), Some("ENV_DB"));
        assert_eq!(settings.warehouse.schema.as_deref(), Some("RAW"));
        assert_eq!(settings.warehouse.role.as_deref(), Some("ANALYST"));
        assert_eq!(settings.policy.max_retries, 2);
        assert_eq!(settings.policy.idle_timeout_secs, 120);
        assert_eq!(settings.policy.retry_delay_ms, 1000);
    }

    #[test]
    fn test_sqlite_selected_by_environment() {
        let file = write_settings("");
        let env = vars(&[("ROOTS_DB_DRIVER", "SQLite"), ("ROOTS_SQLITE_PATH", "/tmp/roots.db")]);

        let settings = Settings::load_with(Some(file.path()), env).expect("load");
        let config = settings.to_connection_config();

        assert_eq!(config.driver, "sqlite");
        assert_eq!(config.get_string("path").as_deref(), Some("/tmp/roots.db"));
    }

    #[test]
    fn test_missing_credentials() {
        let file = write_settings("");
        let mut env = snowflake_env();
        env.retain(|(k, _)| *k != "SNOWFLAKE_WAREHOUSE");

        let err = Settings::load_with(Some(file.path()), vars(&env)).expect_err("incomplete");
        assert!(matches!(err, SettingsError::MissingField("warehouse")));
    }

    #[test]
    fn test_invalid_numbers_are_reported() {
        let file = write_settings("");
        let mut env = snowflake_env();
        env.push(("ROOTS_RETRY_DELAY_MS", "soon"));

        let err = Settings::load_with(Some(file.path()), vars(&env)).expect_err("bad number");
        match err {
            SettingsError::Invalid { field, .. } => assert_eq!(field, "ROOTS_RETRY_DELAY_MS"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_retries_rejected() {
        let file = write_settings("[policy]\nmax_retries = 0\n");
        let err = Settings::load_with(Some(file.path()), vars(&snowflake_env())).expect_err("zero");
        assert!(matches!(err, SettingsError::Invalid { ref field, .. } if field == "max_retries"));
    }

    #[test]
    fn test_unknown_driver_rejected() {
        let file = write_settings("[warehouse]\ndriver = \"oracle\"\n");
        let err = Settings::load_with(Some(file.path()), vars(&[])).expect_err("unknown");
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        let err = Settings::load_with(Some(&missing), vars(&[])).expect_err("missing");
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn test_malformed_file() {
        let file = write_settings("[policy\nmax_retries = ");
        let err = Settings::from_file(file.path()).expect_err("malformed");
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_snowflake_connection_config() {
        let file = write_settings("");
        let mut env = snowflake_env();
        env.push(("SNOWFLAKE_ROLE", "REPORTER"));
        env.push(("ROOTS_STATEMENT_TIMEOUT_SECS", "120"));
        let settings = Settings::load_with(Some(file.path()), vars(&env)).expect("load");

        let config = settings.to_connection_config();

        assert_eq!(config.driver, "snowflake");
        assert_eq!(config.get_string("account").as_deref(), Some("xy12345.ap-south-1"));
        assert_eq!(config.get_string("user").as_deref(), Some("analyst"));
        assert_eq!(config.get_string("password").as_deref(), Some("hunter2"));
        assert_eq!(config.get_string("database").as_deref(), Some("ROOTS_ROUTES"));
        assert_eq!(config.get_string("schema").as_deref(), Some("PUBLIC"));
        assert_eq!(config.get_string("warehouse").as_deref(), Some("COMPUTE_WH"));
        assert_eq!(config.get_string("role").as_deref(), Some("REPORTER"));
        assert_eq!(config.get_u64("statement_timeout"), Some(120));
        assert_eq!(config.get_u64("login_timeout"), Some(60));
    }

    #[test]
    fn test_manager_config_mirrors_policy() {
        let settings = Settings {
            policy: ConnectionPolicy {
                idle_timeout_secs: 30,
                max_retries: 4,
                retry_delay_ms: 250,
                ..ConnectionPolicy::default()
            },
            ..Settings::default()
        };

        let config = settings.manager_config();

        assert_eq!(config.idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_retries(), 4);
        assert_eq!(
            config.retry_backoff().calculate_delay(2),
            Duration::from_millis(250)
        );
        assert_eq!(config.connect_timeout(), Duration::from_secs(60));
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_debug_hides_password() {
        let warehouse = WarehouseSettings {
            password: Some("hunter2".into()),
            ..WarehouseSettings::default()
        };
        let rendered = format!("{warehouse:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let mut settings = Settings::default();
        settings.warehouse.driver = "sqlite".into();
        settings.warehouse.path = Some("data/roots.db".into());

        let text = toml::to_string(&settings).expect("serialize");
        let parsed: Settings = toml::from_str(&text).expect("parse");
        assert_eq!(parsed, settings);
    }
}
