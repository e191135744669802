//! Delay calculator for connection retries
//!
//! The warehouse connection retries with a fixed delay by default; an
//! exponential schedule is available for deployments that prefer it.

use std::time::Duration;

/// Delay schedule between connection attempts.
///
/// # Example
///
/// ```
/// use roots_connection::reconnect::BackoffStrategy;
/// use std::time::Duration;
///
/// let fixed = BackoffStrategy::fixed(Duration::from_secs(1));
/// assert_eq!(fixed.calculate_delay(0), Duration::from_secs(1));
/// assert_eq!(fixed.calculate_delay(5), Duration::from_secs(1));
///
/// let backoff = BackoffStrategy::new(100, 30_000);
/// assert_eq!(backoff.calculate_delay(1), Duration::from_millis(200));
/// assert!(backoff.calculate_delay(20) <= Duration::from_millis(30_000));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffStrategy {
    /// Delay in milliseconds before the first retry
    initial_ms: u64,
    /// Cap for exponential growth in milliseconds
    max_ms: u64,
    /// Growth factor per attempt (1.0 = fixed delay)
    multiplier: f64,
}

impl BackoffStrategy {
    /// Exponential backoff doubling from `initial_ms` up to `max_ms`.
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        let initial_ms = initial_ms.max(1);
        Self {
            initial_ms,
            max_ms: max_ms.max(initial_ms),
            multiplier: 2.0,
        }
    }

    /// The same delay before every retry. A zero delay retries immediately.
    pub fn fixed(delay: Duration) -> Self {
        let ms = delay.as_millis().min(u64::MAX as u128) as u64;
        Self {
            initial_ms: ms,
            max_ms: ms,
            multiplier: 1.0,
        }
    }

    /// Set the multiplier for exponential growth (at least 1.0).
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Delay before retry number `attempt` (0 = first retry).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms = (self.initial_ms as f64) * self.multiplier.powi(exponent);
        Duration::from_millis(delay_ms.min(self.max_ms as f64) as u64)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Worst-case total sleep across `attempts` connection attempts.
    pub fn total_delay(&self, attempts: u32) -> Duration {
        (0..attempts.saturating_sub(1))
            .map(|attempt| self.calculate_delay(attempt))
            .sum()
    }
}

impl Default for BackoffStrategy {
    /// One second between attempts
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}
