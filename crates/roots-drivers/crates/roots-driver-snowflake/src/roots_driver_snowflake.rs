//! Snowflake warehouse driver
//!
//! Connects through the Snowflake ODBC driver when built with the `odbc`
//! feature. Without it the driver still registers so configuration can be
//! validated, but `connect` reports that ODBC support is missing.

mod driver;
#[cfg(feature = "odbc")]
mod odbc;
mod options;

pub use driver::SnowflakeDriver;
#[cfg(feature = "odbc")]
pub use odbc::OdbcConnection;
pub use options::{OptionsError, SnowflakeOptions};
