use roots_core::Connection;
use std::ops::Deref;
use std::sync::Arc;
use tokio::time::Instant;

/// A connection handed out by the manager.
///
/// Cloning is cheap. Request a fresh handle for every unit of work instead of
/// holding one across calls; the manager may close and replace the session
/// behind it at any time.
#[derive(Clone)]
pub struct ConnectionHandle {
    connection: Arc<dyn Connection>,
    id: u64,
    created_at: Instant,
    last_used_at: Instant,
}

impl ConnectionHandle {
    pub(crate) fn new(connection: Arc<dyn Connection>, id: u64, now: Instant) -> Self {
        Self {
            connection,
            id,
            created_at: now,
            last_used_at: now,
        }
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_used_at = now;
    }

    /// Generation number; increases every time a new session is opened
    pub fn id(&self) -> u64 {
        self.id
    }

    /// When the underlying session was opened
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Last successful use as of when this handle was returned
    pub fn last_used_at(&self) -> Instant {
        self.last_used_at
    }

    /// The shared session, for callers that need an owned `Arc`
    ///
    /// The session may be closed by the manager after this handle was
    /// returned; check [`Connection::is_closed`] before long-running work.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }
}

impl Deref for ConnectionHandle {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref()
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("driver", &self.connection.driver_name())
            .field("created_at", &self.created_at)
            .field("last_used_at", &self.last_used_at)
            .field("closed", &self.connection.is_closed())
            .finish()
    }
}
