//! Connection re-establishment: retry delays and connection factories
//!
//! # Example
//!
//! ```ignore
//! use roots_connection::reconnect::{BackoffStrategy, DriverFactory};
//!
//! let factory = DriverFactory::new(driver, config);
//! let backoff = BackoffStrategy::fixed(Duration::from_secs(1));
//! ```

mod backoff;
mod factory;


pub use backoff::BackoffStrategy;
pub use factory::{ConnectionFactory, DriverFactory};
