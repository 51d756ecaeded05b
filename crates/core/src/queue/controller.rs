//! Admission controller: fills free slots from the head of the wait-line.

use chrono::{DateTime, Utc};

use crate::config::QueueConfig;
use crate::ticket::{Ticket, TicketError, TicketState, TicketStore};

#[derive(Debug, Clone)]
pub struct AdmissionController {
    capacity: usize,
    max_per_pass: Option<usize>,
}

impl AdmissionController {
    pub fn new(capacity: usize, max_per_pass: Option<usize>) -> Self {
        Self {
            capacity,
            max_per_pass,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.capacity, config.max_promotions_per_tick)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_slots(&self, store: &TicketStore) -> usize {
        self.capacity.saturating_sub(store.count_active())
    }

    /// Promote the longest-waiting tickets into the free slots.
    ///
    /// Strict FIFO: the first `free` tickets by sequence, never a later one
    /// ahead of an earlier one. Must be called with exclusive access to the
    /// store so the active count cannot change underneath.
    pub fn promote(
        &self,
        store: &mut TicketStore,
        now: DateTime<Utc>,
    ) -> Result<Vec<Ticket>, TicketError> {
        let free = self.free_slots(store);
        if free == 0 {
            return Ok(Vec::new());
        }
        let batch = self.max_per_pass.map_or(free, |limit| free.min(limit));

        let tokens: Vec<String> = store
            .waiting_in_order()
            .take(batch)
            .map(|t| t.token.clone())
            .collect();

        let mut promoted = Vec::with_capacity(tokens.len());
        for token in tokens {
            promoted.push(store.transition(&token, TicketState::Active, now)?);
        }

        debug_assert!(store.count_active() <= self.capacity);
        Ok(promoted)
    }
}
