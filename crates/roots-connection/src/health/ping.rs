//! Liveness probe for warehouse connections

use roots_core::Connection;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Statement used to probe a connection
pub const PROBE_QUERY: &str = "SELECT 1";

/// Round-trip time of a successful probe, or why it failed
pub type PingResult = Result<Duration, PingError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PingError {
    #[error("connection is closed")]
    ConnectionClosed,

    #[error("probe query failed: {0}")]
    QueryFailed(String),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

/// Run [`PROBE_QUERY`] on `conn` and return the round-trip time.
///
/// A probe that does not answer within `timeout` counts as failed, so a
/// half-open network session cannot stall the caller indefinitely.
///
/// ```ignore
/// let latency = ping_database(handle.as_ref(), Duration::from_secs(5)).await?;
/// ```
pub async fn ping_database(conn: &dyn Connection, timeout: Duration) -> PingResult {
    if conn.is_closed() {
        return Err(PingError::ConnectionClosed);
    }

    let start = Instant::now();
    match tokio::time::timeout(timeout, conn.query(PROBE_QUERY, &[])).await {
        Ok(Ok(_)) => Ok(start.elapsed()),
        Ok(Err(e)) => Err(PingError::QueryFailed(e.to_string())),
        Err(_) => Err(PingError::Timeout(timeout)),
    }
}
