//! Warehouse connection management for Roots & Routes
//!
//! Every dashboard page reaches the warehouse through a single
//! [`ConnectionManager`]. The manager keeps at most one session open,
//! probes it before reuse, replaces it after an idle window or a failure,
//! and retries a failed statement once on a fresh session.
//!
//! # Example
//!
//! ```ignore
//! use roots_connection::{ConnectionManager, DriverFactory, ManagerConfig};
//!
//! let factory = DriverFactory::new(driver, connection_config);
//! let manager = ConnectionManager::new(factory, ManagerConfig::default());
//!
//! let visits = manager
//!     .execute("SELECT site_id, visitors FROM daily_visits WHERE day = ?", &[day.into()])
//!     .await?;
//! manager.close().await;
//! ```

pub mod catalog;
mod config;
mod error;
pub mod health;
mod manager;
pub mod reconnect;

#[cfg(test)]
mod testing;

pub use catalog::{Catalog, TableName};
pub use config::ManagerConfig;
pub use error::{ManagerError, Result};
pub use health::{HealthStatus, PingError, ping_database};
pub use manager::{ConnectionHandle, ConnectionManager, ManagerState};
pub use reconnect::{BackoffStrategy, ConnectionFactory, DriverFactory};
