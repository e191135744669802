//! Settings file locations

use std::path::PathBuf;

const APP_DIR: &str = "roots-routes";

/// Per-user configuration directory, if the platform has one
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Default location of `settings.toml`
pub fn settings_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("settings.toml"))
}

/// Directory for rolling log files
pub fn log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join(APP_DIR).join("logs"))
}
