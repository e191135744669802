//! SQLite database driver implementation
//!
//! Stands in for the warehouse during local development and in tests.

mod connection;
mod driver;

pub use connection::SqliteConnection;
pub use driver::SqliteDriver;
