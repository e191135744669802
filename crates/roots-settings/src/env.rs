//! Environment variable overlay

use crate::error::{Result, SettingsError};
use crate::{ConnectionPolicy, Settings, WarehouseSettings};
use std::str::FromStr;

/// Variables read from the process environment, in the order applied
pub const ENV_VARS: &[&str] = &[
    "ROOTS_DB_DRIVER",
    "ROOTS_SQLITE_PATH",
    "SNOWFLAKE_ACCOUNT",
    "SNOWFLAKE_USER",
    "SNOWFLAKE_PASSWORD",
    "SNOWFLAKE_DATABASE",
    "SNOWFLAKE_SCHEMA",
    "SNOWFLAKE_WAREHOUSE",
    "SNOWFLAKE_ROLE",
    "ROOTS_IDLE_TIMEOUT_SECS",
    "ROOTS_MAX_RETRIES",
    "ROOTS_RETRY_DELAY_MS",
    "ROOTS_CONNECT_TIMEOUT_SECS",
    "ROOTS_STATEMENT_TIMEOUT_SECS",
];

impl Settings {
    /// Overwrite fields with any variables `lookup` returns. Blank values
    /// are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        apply_warehouse(&mut self.warehouse, &get);
        apply_policy(&mut self.policy, &get)?;

        let applied = ENV_VARS.iter().copied().filter(|&key| get(key).is_some()).count();
        tracing::debug!(applied, "environment overrides applied");
        Ok(())
    }
}

fn apply_warehouse(warehouse: &mut WarehouseSettings, get: &impl Fn(&str) -> Option<String>) {
    if let Some(driver) = get("ROOTS_DB_DRIVER") {
        warehouse.driver = driver.trim().to_ascii_lowercase();
    }

    let fields: [(&str, &mut Option<String>); 8] = [
        ("ROOTS_SQLITE_PATH", &mut warehouse.path),
        ("SNOWFLAKE_ACCOUNT", &mut warehouse.account),
        ("SNOWFLAKE_USER", &mut warehouse.user),
        ("SNOWFLAKE_PASSWORD", &mut warehouse.password),
        ("SNOWFLAKE_DATABASE", &mut warehouse.database),
        ("SNOWFLAKE_SCHEMA", &mut warehouse.schema),
        ("SNOWFLAKE_WAREHOUSE", &mut warehouse.warehouse),
        ("SNOWFLAKE_ROLE", &mut warehouse.role),
    ];
    for (key, slot) in fields {
        if let Some(value) = get(key) {
            *slot = Some(value);
        }
    }
}

fn apply_policy(policy: &mut ConnectionPolicy, get: &impl Fn(&str) -> Option<String>) -> Result<()> {
    let fields: [(&str, &mut u64); 4] = [
        ("ROOTS_IDLE_TIMEOUT_SECS", &mut policy.idle_timeout_secs),
        ("ROOTS_RETRY_DELAY_MS", &mut policy.retry_delay_ms),
        ("ROOTS_CONNECT_TIMEOUT_SECS", &mut policy.connect_timeout_secs),
        ("ROOTS_STATEMENT_TIMEOUT_SECS", &mut policy.statement_timeout_secs),
    ];
    for (key, slot) in fields {
        if let Some(value) = get(key) {
            *slot = parse(key, &value)?;
        }
    }

    if let Some(value) = get("ROOTS_MAX_RETRIES") {
        policy.max_retries = parse("ROOTS_MAX_RETRIES", &value)?;
    }
    Ok(())
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| SettingsError::Invalid {
        field: key.to_string(),
        message: format!("{value:?} is not a valid number ({e})"),
    })
}
