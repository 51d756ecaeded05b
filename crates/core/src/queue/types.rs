//! Types returned by the queue service.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ticket::{ExpiryReason, TicketError};

/// What a client sees when it polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub active: bool,
    /// 1-based rank in the wait-line, 0 once active.
    pub position: usize,
    pub estimated_wait_seconds: u64,
}

impl QueueStatus {
    pub fn admitted() -> Self {
        Self {
            active: true,
            position: 0,
            estimated_wait_seconds: 0,
        }
    }
}

/// Result of `join`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub token: String,
    pub sequence: u64,
    pub status: QueueStatus,
    /// False when the identity already held a ticket.
    pub created: bool,
}

/// Result of `release`. Every variant is a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// An active slot was freed.
    Released,
    /// A waiting ticket left the line.
    LeftQueue,
    /// Unknown or already expired token.
    NoOp,
}

/// Point-in-time view of the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub capacity: usize,
    pub active: usize,
    pub waiting: usize,
    pub expired_retained: usize,
    pub last_sequence: u64,
    pub average_release_interval_seconds: f64,
}

/// Errors surfaced by the queue service.
///
/// `NotFound` and `Expired` are terminal for the token: the only recovery is
/// a fresh join.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue token not found")]
    NotFound(String),

    #[error("queue token expired ({reason})")]
    Expired { token: String, reason: ExpiryReason },

    /// Gate check on a ticket that is still waiting.
    #[error("queue token is not active yet (position {})", .0.position)]
    NotActive(QueueStatus),

    /// Internal invariant violation in the store.
    #[error("ticket store error: {0}")]
    Store(TicketError),
}

impl From<TicketError> for QueueError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::NotFound(token) => QueueError::NotFound(token),
            other => QueueError::Store(other),
        }
    }
}
