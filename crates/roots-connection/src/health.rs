//! Connection health probing
//!
//! [`ping_database`] is the probe the manager runs before handing out a
//! reused connection; [`HealthStatus`] turns its latency into a label for
//! operators.

mod ping;
mod status;


pub use ping::{PROBE_QUERY, PingError, PingResult, ping_database};
pub use status::{HealthStatus, HealthThresholds};
