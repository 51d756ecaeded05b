//! Queue service: the public join/status/release operations.
//!
//! Every mutation and every read that feeds a promotion decision happens
//! while holding `state`. The background promotion tick and the sweeper go
//! through the same lock, so a freed slot can never be counted twice.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::metrics::{
    QUEUE_ACTIVE, QUEUE_EXPIRATIONS, QUEUE_JOINS, QUEUE_PROMOTIONS, QUEUE_PURGED,
    QUEUE_RELEASES, QUEUE_WAITING,
};
use crate::ticket::{
    mask_token, ExpiryReason, Sequencer, Ticket, TicketError, TicketState, TicketStore,
};

use super::cadence::ReleaseCadence;
use super::clock::{Clock, SystemClock};
use super::controller::AdmissionController;
use super::sweeper::{ExpiryPolicy, SweepReport, Sweeper};
use super::types::{JoinOutcome, QueueError, QueueStats, QueueStatus, ReleaseOutcome};

struct QueueState {
    store: TicketStore,
    cadence: ReleaseCadence,
}

pub struct QueueService {
    controller: AdmissionController,
    sweeper: Sweeper,
    sequencer: Sequencer,
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
}

impl QueueService {
    pub fn new(config: &QueueConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &QueueConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            controller: AdmissionController::from_config(config),
            sweeper: Sweeper::new(ExpiryPolicy::from_config(config)),
            sequencer: Sequencer::new(),
            clock,
            state: Mutex::new(QueueState {
                store: TicketStore::new(),
                cadence: ReleaseCadence::new(
                    config.release_sample_window,
                    config.default_release_interval_secs,
                ),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.controller.capacity()
    }

    /// Join the queue, or return the ticket the identity already holds.
    pub fn join(&self, identity: &str) -> Result<JoinOutcome, QueueError> {
        let now = self.clock.now();
        let mut state = self.lock();

        let (token, created) = match state.store.create(identity, &self.sequencer, now) {
            Ok(ticket) => {
                QUEUE_JOINS.with_label_values(&["created"]).inc();
                debug!(
                    "Ticket {} joined (sequence {})",
                    mask_token(&ticket.token),
                    ticket.sequence
                );
                (ticket.token, true)
            }
            Err(TicketError::AlreadyQueued { token, .. }) => {
                QUEUE_JOINS.with_label_values(&["existing"]).inc();
                (token, false)
            }
            Err(e) => return Err(e.into()),
        };

        if created {
            self.promote_locked(&mut state, now)?;
        }

        let sequence = state.store.touch(&token, now)?.sequence;
        let status = Self::status_locked(&state, &token, now)?;
        Self::publish_gauges(&state.store);

        Ok(JoinOutcome {
            token,
            sequence,
            status,
            created,
        })
    }

    /// Poll a ticket. Refreshes its idle timer.
    pub fn status(&self, token: &str) -> Result<QueueStatus, QueueError> {
        let now = self.clock.now();
        let mut state = self.lock();

        Self::ensure_live(state.store.get(token)?)?;
        state.store.touch(token, now)?;
        Self::status_locked(&state, token, now)
    }

    /// Admission check for protected routes.
    ///
    /// Succeeds only for active tickets, sliding their idle window forward.
    /// A waiting ticket yields `NotActive` with its current status.
    pub fn validate_active(&self, token: &str) -> Result<(), QueueError> {
        let now = self.clock.now();
        let mut state = self.lock();

        Self::ensure_live(state.store.get(token)?)?;
        let ticket = state.store.touch(token, now)?;
        if ticket.is_active() {
            return Ok(());
        }
        Err(QueueError::NotActive(Self::status_locked(
            &state, token, now,
        )?))
    }

    /// Release a ticket. Unknown and already expired tokens are a no-op.
    pub fn release(&self, token: &str) -> Result<ReleaseOutcome, QueueError> {
        let now = self.clock.now();
        let mut state = self.lock();
        let outcome = self.release_locked(&mut state, token, now)?;
        QUEUE_RELEASES.with_label_values(&[outcome_label(outcome)]).inc();
        Ok(outcome)
    }

    /// Release whatever ticket `identity` holds (logout / session end).
    pub fn release_identity(&self, identity: &str) -> Result<ReleaseOutcome, QueueError> {
        let now = self.clock.now();
        let mut state = self.lock();
        let token = match state.store.token_for_identity(identity) {
            Some(token) => token.to_string(),
            None => {
                QUEUE_RELEASES.with_label_values(&["no_op"]).inc();
                return Ok(ReleaseOutcome::NoOp);
            }
        };
        let outcome = self.release_locked(&mut state, &token, now)?;
        QUEUE_RELEASES.with_label_values(&[outcome_label(outcome)]).inc();
        Ok(outcome)
    }

    /// One promotion pass. Returns the number of tickets promoted.
    pub fn promote(&self) -> Result<usize, QueueError> {
        let now = self.clock.now();
        let mut state = self.lock();
        let promoted = self.promote_locked(&mut state, now)?;
        Self::publish_gauges(&state.store);
        Ok(promoted)
    }

    /// One sweep, followed by a promotion pass to refill freed slots.
    pub fn sweep(&self) -> Result<SweepReport, QueueError> {
        let now = self.clock.now();
        let mut state = self.lock();

        let (mut report, freed) = self.sweeper.sweep(&mut state.store, now)?;
        for ticket in &freed {
            state.cadence.record(now);
            Self::count_expiry(ticket);
        }
        if report.expired_waiting > 0 {
            QUEUE_EXPIRATIONS
                .with_label_values(&[ExpiryReason::IdleWaiting.as_str()])
                .inc_by(report.expired_waiting as u64);
        }
        QUEUE_PURGED.inc_by(report.purged as u64);

        report.promoted = self.promote_locked(&mut state, now)?;
        Self::publish_gauges(&state.store);

        if !report.is_empty() {
            info!(
                "Sweep: {} waiting expired, {} active expired, {} purged, {} promoted",
                report.expired_waiting, report.expired_active, report.purged, report.promoted
            );
        }
        Ok(report)
    }

    /// Expire every live ticket and forget release history.
    ///
    /// Sequence numbers keep increasing across resets.
    pub fn reset(&self) -> Result<usize, QueueError> {
        let now = self.clock.now();
        let mut state = self.lock();

        let tokens = state.store.live_tokens();
        for token in &tokens {
            state.store.expire(token, ExpiryReason::Reset, now)?;
        }
        state.cadence.clear();
        QUEUE_EXPIRATIONS
            .with_label_values(&[ExpiryReason::Reset.as_str()])
            .inc_by(tokens.len() as u64);
        Self::publish_gauges(&state.store);

        warn!("Queue reset: {} live tickets expired", tokens.len());
        Ok(tokens.len())
    }

    pub fn stats(&self) -> QueueStats {
        let now = self.clock.now();
        let state = self.lock();
        QueueStats {
            capacity: self.controller.capacity(),
            active: state.store.count_active(),
            waiting: state.store.count_waiting(),
            expired_retained: state.store.count_expired(),
            last_sequence: self.sequencer.last_issued(),
            average_release_interval_seconds: state.cadence.average_interval_secs(now),
        }
    }

    /// Snapshot of one ticket (expired ones included while retained).
    pub fn ticket(&self, token: &str) -> Result<Ticket, QueueError> {
        Ok(self.lock().store.get(token)?.clone())
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("Queue state lock was poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn release_locked(
        &self,
        state: &mut QueueState,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, QueueError> {
        let was_active = match state.store.get(token) {
            Ok(ticket) if ticket.is_expired() => return Ok(ReleaseOutcome::NoOp),
            Ok(ticket) => ticket.is_active(),
            Err(TicketError::NotFound(_)) => return Ok(ReleaseOutcome::NoOp),
            Err(e) => return Err(e.into()),
        };

        let ticket = state.store.expire(token, ExpiryReason::Released, now)?;
        Self::count_expiry(&ticket);

        let outcome = if was_active {
            state.cadence.record(now);
            info!("Ticket {} released its slot", mask_token(token));
            self.promote_locked(state, now)?;
            ReleaseOutcome::Released
        } else {
            debug!("Ticket {} left the queue", mask_token(token));
            ReleaseOutcome::LeftQueue
        };
        Self::publish_gauges(&state.store);
        Ok(outcome)
    }

    fn promote_locked(&self, state: &mut QueueState, now: DateTime<Utc>) -> Result<usize, QueueError> {
        let promoted = self
            .controller
            .promote(&mut state.store, now)
            .map_err(|e| {
                error!("Promotion pass failed: {}", e);
                QueueError::from(e)
            })?;

        if promoted.is_empty() {
            return Ok(0);
        }

        QUEUE_PROMOTIONS.inc_by(promoted.len() as u64);
        info!(
            "Promoted {} tickets (sequences {}..={}, active {}/{})",
            promoted.len(),
            promoted[0].sequence,
            promoted[promoted.len() - 1].sequence,
            state.store.count_active(),
            self.controller.capacity()
        );
        Ok(promoted.len())
    }

    fn status_locked(
        state: &QueueState,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<QueueStatus, QueueError> {
        let ticket = state.store.get(token)?;
        Self::ensure_live(ticket)?;
        if ticket.is_active() {
            return Ok(QueueStatus::admitted());
        }

        let position = state.store.position(token)?;
        Ok(QueueStatus {
            active: false,
            position,
            estimated_wait_seconds: state.cadence.estimate_wait_secs(position, now),
        })
    }

    fn ensure_live(ticket: &Ticket) -> Result<(), QueueError> {
        match ticket.state {
            TicketState::Expired { reason, .. } => Err(QueueError::Expired {
                token: ticket.token.clone(),
                reason,
            }),
            _ => Ok(()),
        }
    }

    fn count_expiry(ticket: &Ticket) {
        if let Some(reason) = ticket.expiry_reason() {
            QUEUE_EXPIRATIONS.with_label_values(&[reason.as_str()]).inc();
        }
    }

    fn publish_gauges(store: &TicketStore) {
        QUEUE_ACTIVE.set(store.count_active() as i64);
        QUEUE_WAITING.set(store.count_waiting() as i64);
    }
}

fn outcome_label(outcome: ReleaseOutcome) -> &'static str {
    match outcome {
        ReleaseOutcome::Released => "released",
        ReleaseOutcome::LeftQueue => "left_queue",
        ReleaseOutcome::NoOp => "no_op",
    }
}
