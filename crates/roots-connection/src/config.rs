//! Connection manager policy

use crate::reconnect::BackoffStrategy;
use std::time::Duration;

/// Timeouts and retry policy for a [`ConnectionManager`](crate::ConnectionManager)
///
/// Defaults: 300 s idle window, 3 connection attempts 1 s apart, 60 s
/// connect timeout, 5 s probe timeout, 300 s statement timeout.
///
/// # Example
///
/// ```
/// use roots_connection::ManagerConfig;
/// use std::time::Duration;
///
/// let config = ManagerConfig::new()
///     .with_max_retries(5)
///     .with_retry_delay(Duration::from_millis(500));
///
/// assert_eq!(config.max_retries(), 5);
/// assert_eq!(config.idle_timeout(), Duration::from_secs(300));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    idle_timeout: Duration,
    max_retries: u32,
    retry_backoff: BackoffStrategy,
    connect_timeout: Duration,
    probe_timeout: Duration,
    statement_timeout: Duration,
}

impl ManagerConfig {
    /// Create a config with the default policy
    pub fn new() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            max_retries: 3,
            retry_backoff: BackoffStrategy::default(),
            connect_timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(5),
            statement_timeout: Duration::from_secs(300),
        }
    }

    /// How long an unused connection may sit before it is replaced
    /// without probing
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Total connection attempts per acquisition. Values below 1 are raised to 1.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Fixed delay between connection attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_backoff = BackoffStrategy::fixed(delay);
        self
    }

    /// Replace the delay schedule between connection attempts
    ///
    /// # Arguments
    ///
    /// * `backoff` - Delay strategy; attempt `n` waits `calculate_delay(n - 1)`
    pub fn with_retry_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Upper bound for a single connection attempt
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Upper bound for the `SELECT 1` liveness probe, also used when closing
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Upper bound for one run of a caller's statement. Hitting it counts as
    /// a failed attempt.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Idle window after which a held connection is replaced unprobed
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Connection attempts per acquisition, always at least 1
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay schedule between connection attempts
    pub fn retry_backoff(&self) -> &BackoffStrategy {
        &self.retry_backoff
    }

    /// Upper bound for one connection attempt
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Upper bound for the liveness probe and for closing a session
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Upper bound for one run of a statement
    pub fn statement_timeout(&self) -> Duration {
        self.statement_timeout
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.max_retries(), 3);
        assert_eq!(
            config.retry_backoff().calculate_delay(0),
            Duration::from_secs(1)
        );
        assert_eq!(config.connect_timeout(), Duration::from_secs(60));
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.statement_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_max_retries_floor() {
        assert_eq!(ManagerConfig::new().with_max_retries(0).max_retries(), 1);
    }

    #[test]
    fn test_retry_delay_is_fixed() {
        let config = ManagerConfig::new().with_retry_delay(Duration::from_millis(250));
        assert_eq!(
            config.retry_backoff(),
            &BackoffStrategy::fixed(Duration::from_millis(250))
        );
    }
}
