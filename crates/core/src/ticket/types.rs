//! Core ticket data types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a ticket left the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    /// Explicit release (leave, logout, session end).
    Released,
    /// Waiting ticket stopped polling.
    IdleWaiting,
    /// Active ticket stopped making requests.
    IdleActive,
    /// Active ticket hit the maximum active lifetime.
    LifetimeExceeded,
    /// Queue was reset by an administrator.
    Reset,
}

impl ExpiryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryReason::Released => "released",
            ExpiryReason::IdleWaiting => "idle_waiting",
            ExpiryReason::IdleActive => "idle_active",
            ExpiryReason::LifetimeExceeded => "lifetime_exceeded",
            ExpiryReason::Reset => "reset",
        }
    }
}

impl std::fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket lifecycle.
///
/// ```text
/// Waiting ──> Active ──> Expired
///    └───────────────────> Expired
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TicketState {
    /// In the wait-line, ordered by sequence.
    Waiting,
    /// Holds one of the admission slots.
    Active,
    /// Terminal. Kept until the retention window passes.
    Expired {
        expired_at: DateTime<Utc>,
        reason: ExpiryReason,
    },
}

impl TicketState {
    /// Returns the state type name for filtering/display.
    pub fn state_type(&self) -> &'static str {
        match self {
            TicketState::Waiting => "waiting",
            TicketState::Active => "active",
            TicketState::Expired { .. } => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketState::Expired { .. })
    }

    /// Whether moving from `self` to `next` respects the lifecycle order.
    pub fn can_transition_to(&self, next: &TicketState) -> bool {
        matches!(
            (self, next),
            (TicketState::Waiting, TicketState::Active)
                | (TicketState::Waiting, TicketState::Expired { .. })
                | (TicketState::Active, TicketState::Expired { .. })
        )
    }
}

/// One caller's place in the admission queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Opaque credential handed to the client.
    pub token: String,
    /// Caller identity the ticket is bound to.
    pub identity: String,
    /// Arrival order, unique and never reused.
    pub sequence: u64,
    pub state: TicketState,
    pub created_at: DateTime<Utc>,
    /// Last time the client polled or passed the gate.
    pub last_seen_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn new(identity: impl Into<String>, sequence: u64, now: DateTime<Utc>) -> Self {
        Self {
            token: generate_token(now),
            identity: identity.into(),
            sequence,
            state: TicketState::Waiting,
            created_at: now,
            last_seen_at: now,
            activated_at: None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.state, TicketState::Waiting)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, TicketState::Active)
    }

    pub fn is_expired(&self) -> bool {
        self.state.is_terminal()
    }

    /// Time since the client was last seen.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_seen_at
    }

    /// Time spent active so far (None if never promoted).
    pub fn active_for(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.activated_at.map(|at| now - at)
    }

    pub fn expired_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            TicketState::Expired { expired_at, .. } => Some(expired_at),
            _ => None,
        }
    }

    pub fn expiry_reason(&self) -> Option<ExpiryReason> {
        match self.state {
            TicketState::Expired { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// `<unix millis>-<32 hex chars>`.
fn generate_token(now: DateTime<Utc>) -> String {
    format!("{}-{}", now.timestamp_millis(), Uuid::new_v4().simple())
}

/// Shortened token for log lines.
pub fn mask_token(token: &str) -> String {
    match token.get(..8) {
        Some(prefix) if token.len() > 8 => format!("{}****", prefix),
        _ => "********".to_string(),
    }
}
