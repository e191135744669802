use serde::{Deserialize, Serialize};

/// Lifecycle of the managed warehouse connection
///
/// `Failed` is not terminal: the next acquisition starts a fresh round of
/// connection attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    /// No connection has been opened, or the last one was closed
    #[default]
    Uninitialized,
    Connected,
    /// The held connection failed a probe, idled out, or failed a statement
    Stale,
    /// The last acquisition exhausted its connection attempts
    Failed,
}

impl ManagerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManagerState::Uninitialized => "uninitialized",
            ManagerState::Connected => "connected",
            ManagerState::Stale => "stale",
            ManagerState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ManagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
