//! The warehouse connection manager
//!
//! One [`ConnectionManager`] owns at most one live warehouse session. It hands
//! that session out after a liveness probe, replaces it when it idles out or
//! fails, and retries a failed statement once on a fresh session.
//!
//! ```text
//! Uninitialized --get--> Connected --probe/idle/statement failure--> Stale
//!      ^                  |   ^                                        |
//!      |                  |   +---------------- reconnect ok ----------+
//!      +----- close ------+                                            |
//!                             Failed <------- attempts exhausted ------+
//! ```

mod handle;
mod state;


pub use handle::ConnectionHandle;
pub use state::ManagerState;

use crate::config::ManagerConfig;
use crate::error::{ManagerError, Result};
use crate::health::ping_database;
use crate::reconnect::ConnectionFactory;
use roots_core::{QueryResult, RootsError, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Statement text shown in logs and errors
pub(crate) fn statement_preview(statement: &str) -> String {
    const LIMIT: usize = 100;
    let flat = statement.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > LIMIT {
        let cut: String = flat.chars().take(LIMIT).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

struct Slot {
    handle: Option<ConnectionHandle>,
    state: ManagerState,
    generation: u64,
}

/// Single-session connection manager shared by every page of the dashboard
///
/// Construct one per process and share it behind an `Arc`. All operations
/// take `&self`; the internal lock serializes them.
pub struct ConnectionManager {
    factory: Arc<dyn ConnectionFactory>,
    config: ManagerConfig,
    slot: Mutex<Slot>,
}

impl ConnectionManager {
    /// Create a manager that opens sessions through `factory`. No session
    /// is opened until the first call that needs one.
    ///
    /// # Arguments
    ///
    /// * `factory` - Opens new warehouse sessions
    /// * `config` - Timeouts and retry policy
    pub fn new<F: ConnectionFactory>(factory: F, config: ManagerConfig) -> Self {
        Self::with_shared_factory(Arc::new(factory), config)
    }

    /// Like [`new`](Self::new) for a factory that is already shared
    pub fn with_shared_factory(factory: Arc<dyn ConnectionFactory>, config: ManagerConfig) -> Self {
        tracing::debug!(
            driver = factory.driver_name(),
            idle_timeout_secs = config.idle_timeout().as_secs(),
            max_retries = config.max_retries(),
            "connection manager created"
        );
        Self {
            factory,
            config,
            slot: Mutex::new(Slot {
                handle: None,
                state: ManagerState::Uninitialized,
                generation: 0,
            }),
        }
    }

    /// Policy this manager was built with
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Driver behind the factory, e.g. `"snowflake"` or `"sqlite"`
    pub fn driver_name(&self) -> &str {
        self.factory.driver_name()
    }

    /// Current lifecycle state, for status display
    pub async fn state(&self) -> ManagerState {
        self.slot.lock().await.state
    }

    /// Whether a session is currently held. It is not probed.
    pub async fn has_connection(&self) -> bool {
        self.slot.lock().await.handle.is_some()
    }

    /// Last successful use of the held session, if any
    pub async fn last_used_at(&self) -> Option<Instant> {
        self.slot
            .lock()
            .await
            .handle
            .as_ref()
            .map(ConnectionHandle::last_used_at)
    }

    /// Return a connection that answered a probe or was just opened.
    ///
    /// A held connection inside its idle window is probed with `SELECT 1`
    /// and returned when it answers. A connection past the idle window, or
    /// one that fails the probe, is closed and replaced.
    #[tracing::instrument(skip(self), fields(driver = self.factory.driver_name()))]
    pub async fn get_connection(&self) -> Result<ConnectionHandle> {
        let mut slot = self.slot.lock().await;
        self.acquire(&mut slot).await
    }

    /// Close the held connection, if any. Safe to call repeatedly.
    #[tracing::instrument(skip(self))]
    pub async fn close_connection(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(handle) = slot.handle.take() {
            self.close_quietly(&handle).await;
            tracing::info!(handle_id = handle.id(), "warehouse connection closed");
        }
        slot.state = ManagerState::Uninitialized;
    }

    /// Alias for [`close_connection`](Self::close_connection), used at shutdown
    pub async fn close(&self) {
        self.close_connection().await
    }

    /// Run a query and return its rows.
    ///
    /// A failure on the first attempt discards the connection, opens a new
    /// one and runs the statement exactly once more. A statement can
    /// therefore execute twice on the warehouse.
    #[tracing::instrument(
        skip(self, statement, params),
        fields(statement = %statement_preview(statement), params = params.len())
    )]
    pub async fn execute(&self, statement: &str, params: &[Value]) -> Result<QueryResult> {
        let result = self
            .run_with_retry(statement, |handle: ConnectionHandle| async move {
                handle.query(statement, params).await
            })
            .await?;
        tracing::debug!(rows = result.row_count(), "query completed");
        Ok(result)
    }

    /// Run a statement that returns no rows and report the affected row
    /// count. Retries once like [`execute`](Self::execute).
    #[tracing::instrument(
        skip(self, statement, params),
        fields(statement = %statement_preview(statement), params = params.len())
    )]
    pub async fn execute_update(&self, statement: &str, params: &[Value]) -> Result<u64> {
        let result = self
            .run_with_retry(statement, |handle: ConnectionHandle| async move {
                handle.execute(statement, params).await
            })
            .await?;
        tracing::debug!(affected_rows = result.affected_rows, "statement completed");
        Ok(result.affected_rows)
    }

    async fn run_with_retry<T, F, Fut>(&self, statement: &str, operation: F) -> Result<T>
    where
        F: Fn(ConnectionHandle) -> Fut,
        Fut: Future<Output = roots_core::Result<T>>,
    {
        let mut slot = self.slot.lock().await;

        let handle = self.acquire(&mut slot).await?;
        let first_error = match self.run_once(&operation, handle.clone()).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        tracing::warn!(
            handle_id = handle.id(),
            error = %first_error,
            "statement failed, reconnecting for one retry"
        );
        self.discard(&mut slot).await;

        let handle = self.acquire(&mut slot).await?;
        match self.run_once(&operation, handle.clone()).await {
            Ok(value) => Ok(value),
            Err(source) => {
                tracing::error!(
                    handle_id = handle.id(),
                    error = %source,
                    "statement failed after reconnect"
                );
                self.discard(&mut slot).await;
                Err(ManagerError::QueryFailed {
                    statement: statement_preview(statement),
                    source,
                })
            }
        }
    }

    async fn run_once<T, F, Fut>(&self, operation: &F, handle: ConnectionHandle) -> roots_core::Result<T>
    where
        F: Fn(ConnectionHandle) -> Fut,
        Fut: Future<Output = roots_core::Result<T>>,
    {
        let timeout = self.config.statement_timeout();
        match tokio::time::timeout(timeout, operation(handle)).await {
            Ok(result) => result,
            Err(_) => Err(RootsError::Timeout(format!(
                "statement did not finish within {timeout:?}"
            ))),
        }
    }

    async fn acquire(&self, slot: &mut Slot) -> Result<ConnectionHandle> {
        if let Some(current) = slot.handle.clone() {
            let idle_for = current.last_used_at().elapsed();

            if idle_for >= self.config.idle_timeout() {
                tracing::info!(
                    handle_id = current.id(),
                    idle_secs = idle_for.as_secs(),
                    "connection idle past timeout, replacing"
                );
                self.discard(slot).await;
            } else {
                match ping_database(&*current, self.config.probe_timeout()).await {
                    Ok(latency) => {
                        let mut handle = current;
                        handle.touch(Instant::now());
                        slot.handle = Some(handle.clone());
                        slot.state = ManagerState::Connected;
                        tracing::debug!(
                            handle_id = handle.id(),
                            latency_ms = latency.as_millis() as u64,
                            "reusing probed connection"
                        );
                        return Ok(handle);
                    }
                    Err(e) => {
                        tracing::warn!(
                            handle_id = current.id(),
                            error = %e,
                            "connection probe failed, replacing"
                        );
                        self.discard(slot).await;
                    }
                }
            }
        }

        self.establish(slot).await
    }

    async fn establish(&self, slot: &mut Slot) -> Result<ConnectionHandle> {
        let attempts = self.config.max_retries();
        let connect_timeout = self.config.connect_timeout();
        let mut last_error = String::from("no connection attempt was made");

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.config.retry_backoff().calculate_delay(attempt - 1);
                tracing::debug!(delay_ms = delay.as_millis() as u64, "waiting before next connection attempt");
                tokio::time::sleep(delay).await;
            }

            match tokio::time::timeout(connect_timeout, self.factory.create()).await {
                Ok(Ok(connection)) => {
                    slot.generation += 1;
                    let handle = ConnectionHandle::new(connection, slot.generation, Instant::now());
                    slot.handle = Some(handle.clone());
                    slot.state = ManagerState::Connected;
                    tracing::info!(
                        handle_id = handle.id(),
                        attempt = attempt + 1,
                        driver = self.factory.driver_name(),
                        "warehouse connection established"
                    );
                    return Ok(handle);
                }
                Ok(Err(e)) => {
                    tracing::warn!(attempt = attempt + 1, max_attempts = attempts, error = %e, "connection attempt failed");
                    last_error = e.to_string();
                }
                Err(_) => {
                    tracing::warn!(attempt = attempt + 1, max_attempts = attempts, "connection attempt timed out");
                    last_error = format!("connection attempt timed out after {connect_timeout:?}");
                }
            }
        }

        slot.state = ManagerState::Failed;
        tracing::error!(
            attempts,
            error = %last_error,
            "could not establish warehouse connection, retries exhausted"
        );
        Err(ManagerError::ConnectionUnavailable {
            attempts,
            last_error,
        })
    }

    /// Mark the held connection stale, close it and clear the slot
    async fn discard(&self, slot: &mut Slot) {
        slot.state = ManagerState::Stale;
        if let Some(handle) = slot.handle.take() {
            self.close_quietly(&handle).await;
        }
    }

    async fn close_quietly(&self, handle: &ConnectionHandle) {
        let timeout = self.config.probe_timeout();
        match tokio::time::timeout(timeout, handle.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(handle_id = handle.id(), error = %e, "error closing connection, ignoring");
            }
            Err(_) => {
                tracing::warn!(handle_id = handle.id(), "connection close timed out, abandoning it");
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("driver", &self.factory.driver_name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
