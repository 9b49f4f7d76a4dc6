//! Connection status snapshots for health endpoints.

use serde::Serialize;

/// Where a gate is in its bootstrap lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// The connection factory has not returned yet.
    Connecting,
    /// The factory returned a handle.
    Ready,
    /// The factory returned an error or panicked.
    Failed,
    /// The bootstrap task was dropped before completing.
    Abandoned,
}

impl ConnectionStatus {
    /// Whether the status will never change again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ConnectionStatus::Connecting)
    }

    /// Whether the gate can serve requests.
    pub fn is_ready(self) -> bool {
        matches!(self, ConnectionStatus::Ready)
    }
}

/// A serializable snapshot of one gate's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Target namespace
    pub namespace: String,
    /// Target set
    pub set: String,
    /// `hostname:port` the factory was given
    pub endpoint: String,
    /// Current lifecycle status
    pub status: ConnectionStatus,
    /// Error text for failed or abandoned gates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
