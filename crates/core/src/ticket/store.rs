//! In-memory ticket store.
//!
//! Not synchronized on its own: the queue service owns it behind a single
//! lock, which is what keeps promotion and expiry decisions consistent.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{ExpiryReason, Sequencer, Ticket, TicketState};

/// Error type for ticket operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketError {
    /// Unknown or already purged token.
    #[error("ticket not found: {0}")]
    NotFound(String),

    /// Identity already holds a live ticket.
    #[error("identity {identity} already holds ticket {token}")]
    AlreadyQueued { identity: String, token: String },

    /// The move violates `Waiting -> Active -> Expired`.
    #[error("cannot move ticket {token} from {from} to {to}")]
    InvalidTransition {
        token: String,
        from: &'static str,
        to: &'static str,
    },
}

/// Tickets indexed by token, identity, and (for the wait-line) sequence.
#[derive(Debug, Default)]
pub struct TicketStore {
    tickets: HashMap<String, Ticket>,
    /// identity -> token, live tickets only
    by_identity: HashMap<String, String>,
    /// sequence -> token, waiting tickets only
    waiting: BTreeMap<u64, String>,
    active: HashSet<String>,
}

impl TicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a waiting ticket for `identity`.
    ///
    /// The sequencer is only consulted once the identity is known to be free,
    /// so a duplicate join does not burn a sequence number.
    pub fn create(
        &mut self,
        identity: &str,
        sequencer: &Sequencer,
        now: DateTime<Utc>,
    ) -> Result<Ticket, TicketError> {
        if let Some(token) = self.by_identity.get(identity) {
            return Err(TicketError::AlreadyQueued {
                identity: identity.to_string(),
                token: token.clone(),
            });
        }

        let ticket = Ticket::new(identity, sequencer.next(), now);
        self.by_identity
            .insert(ticket.identity.clone(), ticket.token.clone());
        self.waiting.insert(ticket.sequence, ticket.token.clone());
        self.tickets.insert(ticket.token.clone(), ticket.clone());
        Ok(ticket)
    }

    /// Get a ticket by token, including expired ones still in retention.
    pub fn get(&self, token: &str) -> Result<&Ticket, TicketError> {
        self.tickets
            .get(token)
            .ok_or_else(|| TicketError::NotFound(token.to_string()))
    }

    /// Token of the live ticket held by `identity`, if any.
    pub fn token_for_identity(&self, identity: &str) -> Option<&str> {
        self.by_identity.get(identity).map(String::as_str)
    }

    /// Record that the client was seen.
    pub fn touch(&mut self, token: &str, now: DateTime<Utc>) -> Result<&Ticket, TicketError> {
        let ticket = self
            .tickets
            .get_mut(token)
            .ok_or_else(|| TicketError::NotFound(token.to_string()))?;
        if now > ticket.last_seen_at {
            ticket.last_seen_at = now;
        }
        Ok(ticket)
    }

    /// Move a ticket to `new_state`, keeping every index in step.
    pub fn transition(
        &mut self,
        token: &str,
        new_state: TicketState,
        now: DateTime<Utc>,
    ) -> Result<Ticket, TicketError> {
        let ticket = self
            .tickets
            .get_mut(token)
            .ok_or_else(|| TicketError::NotFound(token.to_string()))?;

        if !ticket.state.can_transition_to(&new_state) {
            return Err(TicketError::InvalidTransition {
                token: token.to_string(),
                from: ticket.state.state_type(),
                to: new_state.state_type(),
            });
        }

        match ticket.state {
            TicketState::Waiting => {
                self.waiting.remove(&ticket.sequence);
            }
            TicketState::Active => {
                self.active.remove(token);
            }
            TicketState::Expired { .. } => {}
        }

        match new_state {
            TicketState::Active => {
                self.active.insert(token.to_string());
                ticket.activated_at = Some(now);
            }
            TicketState::Expired { .. } => {
                if self.by_identity.get(&ticket.identity).map(String::as_str) == Some(token) {
                    self.by_identity.remove(&ticket.identity);
                }
            }
            TicketState::Waiting => {}
        }

        ticket.state = new_state;
        Ok(ticket.clone())
    }

    /// Convenience for `transition(token, Expired { now, reason })`.
    pub fn expire(
        &mut self,
        token: &str,
        reason: ExpiryReason,
        now: DateTime<Utc>,
    ) -> Result<Ticket, TicketError> {
        self.transition(
            token,
            TicketState::Expired {
                expired_at: now,
                reason,
            },
            now,
        )
    }

    /// The wait-line, ascending by sequence.
    pub fn waiting_in_order(&self) -> impl Iterator<Item = &Ticket> + '_ {
        self.waiting
            .values()
            .filter_map(move |token| self.tickets.get(token))
    }

    pub fn list_waiting_ordered_by_sequence(&self) -> Vec<Ticket> {
        self.waiting_in_order().cloned().collect()
    }

    pub fn count_active(&self) -> usize {
        self.active.len()
    }

    pub fn count_waiting(&self) -> usize {
        self.waiting.len()
    }

    pub fn count_expired(&self) -> usize {
        self.tickets.len() - self.active.len() - self.waiting.len()
    }

    /// 1-based rank among waiting tickets, 0 for anything not waiting.
    ///
    /// Counts the waiting entries ahead of the ticket, so cost grows with rank.
    pub fn position(&self, token: &str) -> Result<usize, TicketError> {
        let ticket = self.get(token)?;
        if !ticket.is_waiting() {
            return Ok(0);
        }
        Ok(self.waiting.range(..ticket.sequence).count() + 1)
    }

    pub fn tickets(&self) -> impl Iterator<Item = &Ticket> + '_ {
        self.tickets.values()
    }

    /// Tokens of every ticket that has not expired yet.
    pub fn live_tokens(&self) -> Vec<String> {
        self.tickets
            .values()
            .filter(|t| !t.is_expired())
            .map(|t| t.token.clone())
            .collect()
    }

    /// Drop expired tickets that expired at or before `cutoff`.
    /// Returns how many were removed.
    pub fn purge_expired(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.tickets.len();
        self.tickets
            .retain(|_, ticket| ticket.expired_at().map_or(true, |at| at > cutoff));
        before - self.tickets.len()
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}
