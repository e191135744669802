//! Snowflake connection options, ODBC connection string and session bootstrap

use roots_core::{ConnectionConfig, RootsError};
use thiserror::Error;

const DEFAULT_ODBC_DRIVER: &str = "SnowflakeDSIIDriver";
const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 60;
const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 300;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    #[error("Snowflake connection requires '{0}'")]
    Missing(&'static str),
}

impl From<OptionsError> for RootsError {
    fn from(err: OptionsError) -> Self {
        RootsError::Configuration(err.to_string())
    }
}

/// Everything needed to open and prepare a Snowflake session
#[derive(Clone)]
pub struct SnowflakeOptions {
    pub account: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub schema: String,
    pub warehouse: String,
    pub role: Option<String>,
    pub odbc_driver: String,
    pub login_timeout_secs: u64,
    pub statement_timeout_secs: u64,
}

impl SnowflakeOptions {
    pub fn from_config(config: &ConnectionConfig) -> Result<Self, OptionsError> {
        let required = |key: &'static str| {
            config
                .get_string(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(OptionsError::Missing(key))
        };

        Ok(Self {
            account: required("account")?,
            user: required("user")?,
            password: required("password")?,
            database: required("database")?,
            schema: required("schema")?,
            warehouse: required("warehouse")?,
            role: config.get_string("role").filter(|r| !r.trim().is_empty()),
            odbc_driver: config
                .get_string("odbc_driver")
                .unwrap_or_else(|| DEFAULT_ODBC_DRIVER.to_string()),
            login_timeout_secs: config
                .get_u64("login_timeout")
                .unwrap_or(DEFAULT_LOGIN_TIMEOUT_SECS),
            statement_timeout_secs: config
                .get_u64("statement_timeout")
                .unwrap_or(DEFAULT_STATEMENT_TIMEOUT_SECS),
        })
    }

    /// Account locator expanded to a host name
    pub fn server(&self) -> String {
        let account = self.account.trim();
        if account.ends_with(".snowflakecomputing.com") {
            account.to_string()
        } else {
            format!("{}.snowflakecomputing.com", account)
        }
    }

    /// ODBC connection string for the Snowflake driver
    pub fn connection_string(&self) -> String {
        self.render_connection_string(&self.password)
    }

    /// Connection string safe to log
    pub fn redacted_connection_string(&self) -> String {
        self.render_connection_string("***")
    }

    fn render_connection_string(&self, password: &str) -> String {
        let mut pairs = vec![
            ("Driver", format!("{{{}}}", self.odbc_driver)),
            ("Server", odbc_value(&self.server())),
            ("uid", odbc_value(&self.user)),
            ("pwd", odbc_value(password)),
            ("database", odbc_value(&self.database)),
            ("schema", odbc_value(&self.schema)),
            ("warehouse", odbc_value(&self.warehouse)),
        ];
        if let Some(role) = &self.role {
            pairs.push(("role", odbc_value(role)));
        }
        pairs.push(("login_timeout", self.login_timeout_secs.to_string()));

        pairs
            .into_iter()
            .map(|(k, v)| format!("{}={};", k, v))
            .collect()
    }

    /// Statements run once on every fresh session so that unqualified table
    /// names resolve and runaway queries are cut off server-side.
    pub fn session_statements(&self) -> Vec<String> {
        let mut statements = vec![
            format!("USE DATABASE {}", sql_identifier(&self.database)),
            format!("USE SCHEMA {}", sql_identifier(&self.schema)),
            format!("USE WAREHOUSE {}", sql_identifier(&self.warehouse)),
        ];
        if let Some(role) = &self.role {
            statements.push(format!("USE ROLE {}", sql_identifier(role)));
        }
        statements.push(format!(
            "ALTER SESSION SET STATEMENT_TIMEOUT_IN_SECONDS = {}",
            self.statement_timeout_secs
        ));
        statements
    }
}

impl std::fmt::Debug for SnowflakeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowflakeOptions")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .field("login_timeout_secs", &self.login_timeout_secs)
            .field("statement_timeout_secs", &self.statement_timeout_secs)
            .finish()
    }
}

/// Brace-quote attribute values that would otherwise break the
/// `key=value;` grammar.
fn odbc_value(value: &str) -> String {
    let needs_quoting = value.contains([';', '{', '}'])
        || value.starts_with(' ')
        || value.ends_with(' ');
    if needs_quoting {
        format!("{{{}}}", value.replace('}', "}}"))
    } else {
        value.to_string()
    }
}

/// Plain identifiers stay unquoted (Snowflake upper-cases them); anything
/// else is double-quoted so it is taken literally.
fn sql_identifier(name: &str) -> String {
    let mut chars = name.chars();
    let plain = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> ConnectionConfig {
        let mut config = ConnectionConfig::new("snowflake", "Roots & Routes");
        config.host = "xy12345.ap-south-1".into();
        config.username = Some("DASHBOARD".into());
        config.password = Some("s3cr;et".into());
        config.database = Some("ROOTS_ROUTES".into());
        config
            .with_param("schema", "PUBLIC")
            .with_param("warehouse", "COMPUTE_WH")
    }

    #[test]
    fn test_from_config_defaults() {
        let options = SnowflakeOptions::from_config(&config()).unwrap();
        assert_eq!(options.account, "xy12345.ap-south-1");
        assert_eq!(options.role, None);
        assert_eq!(options.odbc_driver, "SnowflakeDSIIDriver");
        assert_eq!(options.login_timeout_secs, 60);
        assert_eq!(options.statement_timeout_secs, 300);
    }

    #[test]
    fn test_missing_warehouse() {
        let mut config = config();
        config.params.remove("warehouse");
        let err = SnowflakeOptions::from_config(&config).unwrap_err();
        assert_eq!(err, OptionsError::Missing("warehouse"));
    }

    #[test]
    fn test_blank_password_counts_as_missing() {
        let mut config = config();
        config.password = Some("  ".into());
        let err = SnowflakeOptions::from_config(&config).unwrap_err();
        assert_eq!(err, OptionsError::Missing("password"));
    }

    #[test]
    fn test_connection_string() {
        let options = SnowflakeOptions::from_config(&config().with_param("role", "ANALYST")).unwrap();
        assert_eq!(
            options.connection_string(),
            "Driver={SnowflakeDSIIDriver};Server=xy12345.ap-south-1.snowflakecomputing.com;\
             uid=DASHBOARD;pwd={s3cr;et};database=ROOTS_ROUTES;schema=PUBLIC;\
             warehouse=COMPUTE_WH;role=ANALYST;login_timeout=60;"
        );
    }

    #[test]
    fn test_redacted_connection_string_hides_password() {
        let options = SnowflakeOptions::from_config(&config()).unwrap();
        let redacted = options.redacted_connection_string();
        assert!(redacted.contains("pwd=***;"));
        assert!(!redacted.contains("s3cr"));
        assert!(!format!("{:?}", options).contains("s3cr"));
    }

    #[test]
    fn test_full_host_is_not_suffixed_twice() {
        let mut config = config();
        config.host = "acme.snowflakecomputing.com".into();
        let options = SnowflakeOptions::from_config(&config).unwrap();
        assert_eq!(options.server(), "acme.snowflakecomputing.com");
    }

    #[test]
    fn test_session_statements() {
        let options = SnowflakeOptions::from_config(
            &config()
                .with_param("role", "analyst role")
                .with_param("statement_timeout", 120),
        )
        .unwrap();
        assert_eq!(
            options.session_statements(),
            vec![
                "USE DATABASE ROOTS_ROUTES".to_string(),
                "USE SCHEMA PUBLIC".to_string(),
                "USE WAREHOUSE COMPUTE_WH".to_string(),
                "USE ROLE \"analyst role\"".to_string(),
                "ALTER SESSION SET STATEMENT_TIMEOUT_IN_SECONDS = 120".to_string(),
            ]
        );
    }

    #[test]
    fn test_odbc_value_quoting() {
        assert_eq!(odbc_value("plain"), "plain");
        assert_eq!(odbc_value("a}b;"), "{a}}b;}");
        assert_eq!(odbc_value(" padded"), "{ padded}");
    }
}
