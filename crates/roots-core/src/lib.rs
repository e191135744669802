//! Roots Core - Core abstractions for the Roots & Routes warehouse layer
//!
//! This crate provides the fundamental traits and types that all other
//! crates depend on. It defines:
//!
//! - `DatabaseDriver` - Trait for driver implementations
//! - `Connection` - Trait for a live warehouse session
//! - Common types like `Value`, `Row`, `QueryResult`

mod connection;
mod driver;
mod error;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use types::*;
