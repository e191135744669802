//! Roots Drivers - concrete warehouse driver implementations
//!
//! This crate collects the drivers implementing the traits defined in
//! `roots-core` and exposes them through a registry keyed by driver name.

#[cfg(feature = "snowflake")]
pub use roots_driver_snowflake as snowflake;
#[cfg(feature = "sqlite")]
pub use roots_driver_sqlite as sqlite;

mod registry;

pub use registry::DriverRegistry;

pub use roots_core::{
    ColumnMeta, Connection, ConnectionConfig, DatabaseDriver, QueryResult, Result, RootsError,
    Row, StatementResult, Value,
};
