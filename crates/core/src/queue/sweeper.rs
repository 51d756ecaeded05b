//! Expiry sweeper: evicts abandoned and over-lifetime tickets.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::QueueConfig;
use crate::ticket::{ExpiryReason, Ticket, TicketError, TicketState, TicketStore};

/// Idle and lifetime limits applied on every sweep.
#[derive(Debug, Clone)]
pub struct ExpiryPolicy {
    pub max_idle_wait: Duration,
    pub max_idle_active: Duration,
    pub max_active_lifetime: Duration,
    pub retention_window: Duration,
}

impl ExpiryPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            max_idle_wait: config.max_idle_wait(),
            max_idle_active: config.max_idle_active(),
            max_active_lifetime: config.max_active_lifetime(),
            retention_window: config.retention_window(),
        }
    }

    /// Why `ticket` should expire at `now`, if it should.
    pub fn check(&self, ticket: &Ticket, now: DateTime<Utc>) -> Option<ExpiryReason> {
        match ticket.state {
            TicketState::Waiting => {
                (ticket.idle_for(now) > self.max_idle_wait).then_some(ExpiryReason::IdleWaiting)
            }
            TicketState::Active => {
                let over_lifetime = ticket
                    .active_for(now)
                    .is_some_and(|active| active > self.max_active_lifetime);
                if over_lifetime {
                    Some(ExpiryReason::LifetimeExceeded)
                } else if ticket.idle_for(now) > self.max_idle_active {
                    Some(ExpiryReason::IdleActive)
                } else {
                    None
                }
            }
            TicketState::Expired { .. } => None,
        }
    }
}

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired_waiting: usize,
    pub expired_active: usize,
    pub purged: usize,
    /// Filled in by the service after its follow-up promotion pass.
    pub promoted: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired_waiting == 0 && self.expired_active == 0 && self.purged == 0
    }
}

#[derive(Debug, Clone)]
pub struct Sweeper {
    policy: ExpiryPolicy,
}

impl Sweeper {
    pub fn new(policy: ExpiryPolicy) -> Self {
        Self { policy }
    }

    /// Purge tickets past retention, then expire idle and over-lifetime ones.
    ///
    /// Returns the report plus the tickets that were active when they expired
    /// (each of those freed a slot).
    pub fn sweep(
        &self,
        store: &mut TicketStore,
        now: DateTime<Utc>,
    ) -> Result<(SweepReport, Vec<Ticket>), TicketError> {
        // A window reaching past the earliest representable time purges nothing
        let purged = now
            .checked_sub_signed(self.policy.retention_window)
            .map_or(0, |cutoff| store.purge_expired(cutoff));
        let mut report = SweepReport {
            purged,
            ..Default::default()
        };

        let due: Vec<(String, bool, ExpiryReason)> = store
            .tickets()
            .filter_map(|t| {
                self.policy
                    .check(t, now)
                    .map(|reason| (t.token.clone(), t.is_active(), reason))
            })
            .collect();

        let mut freed = Vec::new();
        for (token, was_active, reason) in due {
            let ticket = store.expire(&token, reason, now)?;
            if was_active {
                report.expired_active += 1;
                freed.push(ticket);
            } else {
                report.expired_waiting += 1;
            }
        }

        Ok((report, freed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::Sequencer;

    fn policy() -> ExpiryPolicy {
        ExpiryPolicy {
            max_idle_wait: Duration::seconds(30),
            max_idle_active: Duration::seconds(60),
            max_active_lifetime: Duration::seconds(300),
            retention_window: Duration::seconds(120),
        }
    }

    #[test]
    fn test_check_waiting_idle() {
        let t0 = Utc::now();
        let ticket = Ticket::new("a", 1, t0);
        let p = policy();
        assert_eq!(p.check(&ticket, t0 + Duration::seconds(30)), None);
        assert_eq!(
            p.check(&ticket, t0 + Duration::seconds(31)),
            Some(ExpiryReason::IdleWaiting)
        );
    }

    #[test]
    fn test_check_active_idle_and_lifetime() {
        let t0 = Utc::now();
        let mut ticket = Ticket::new("a", 1, t0);
        ticket.state = TicketState::Active;
        ticket.activated_at = Some(t0);
        let p = policy();

        assert_eq!(
            p.check(&ticket, t0 + Duration::seconds(61)),
            Some(ExpiryReason::IdleActive)
        );

        // kept busy, but active too long
        ticket.last_seen_at = t0 + Duration::seconds(300);
        assert_eq!(p.check(&ticket, t0 + Duration::seconds(300)), None);
        assert_eq!(
            p.check(&ticket, t0 + Duration::seconds(301)),
            Some(ExpiryReason::LifetimeExceeded)
        );
    }

    #[test]
    fn test_sweep_expires_and_reports_freed_slots() {
        let mut store = TicketStore::new();
        let seq = Sequencer::new();
        let t0 = Utc::now();
        let idle_waiter = store.create("w", &seq, t0).unwrap();
        let idle_active = store.create("a", &seq, t0).unwrap();
        let fresh = store.create("f", &seq, t0).unwrap();
        store
            .transition(&idle_active.token, TicketState::Active, t0)
            .unwrap();

        let now = t0 + Duration::seconds(61);
        store.touch(&fresh.token, now).unwrap();

        let (report, freed) = Sweeper::new(policy()).sweep(&mut store, now).unwrap();
        assert_eq!(report.expired_waiting, 1);
        assert_eq!(report.expired_active, 1);
        assert_eq!(report.purged, 0);
        assert_eq!(freed.len(), 1);
        assert_eq!(freed[0].token, idle_active.token);
        assert_eq!(
            store.get(&idle_waiter.token).unwrap().expiry_reason(),
            Some(ExpiryReason::IdleWaiting)
        );
        assert!(store.get(&fresh.token).unwrap().is_waiting());
    }

    #[test]
    fn test_sweep_purges_after_retention() {
        let mut store = TicketStore::new();
        let seq = Sequencer::new();
        let t0 = Utc::now();
        let ticket = store.create("a", &seq, t0).unwrap();
        store
            .expire(&ticket.token, ExpiryReason::Released, t0)
            .unwrap();
        let sweeper = Sweeper::new(policy());

        let (report, _) = sweeper
            .sweep(&mut store, t0 + Duration::seconds(119))
            .unwrap();
        assert_eq!(report.purged, 0);
        assert!(store.get(&ticket.token).is_ok());

        let (report, _) = sweeper
            .sweep(&mut store, t0 + Duration::seconds(120))
            .unwrap();
        assert_eq!(report.purged, 1);
        assert!(store.get(&ticket.token).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_of_healthy_queue_is_empty() {
        let mut store = TicketStore::new();
        let seq = Sequencer::new();
        let t0 = Utc::now();
        store.create("a", &seq, t0).unwrap();

        let (report, freed) = Sweeper::new(policy())
            .sweep(&mut store, t0 + Duration::seconds(5))
            .unwrap();
        assert!(report.is_empty());
        assert!(freed.is_empty());
    }

    #[test]
    fn test_sweep_with_unbounded_limits_does_not_panic() {
        let config = QueueConfig {
            max_idle_wait_secs: u64::MAX,
            max_idle_active_secs: 10_000_000_000_000_000,
            max_active_lifetime_secs: u64::MAX,
            retention_window_secs: 10_000_000_000_000,
            ..QueueConfig::default()
        };
        let mut store = TicketStore::new();
        let seq = Sequencer::new();
        let t0 = Utc::now();
        let released = store.create("a", &seq, t0).unwrap();
        store
            .expire(&released.token, ExpiryReason::Released, t0)
            .unwrap();
        store.create("b", &seq, t0).unwrap();

        let sweeper = Sweeper::new(ExpiryPolicy::from_config(&config));
        let (report, freed) = sweeper
            .sweep(&mut store, t0 + Duration::days(365))
            .unwrap();
        assert!(report.is_empty());
        assert!(freed.is_empty());
        assert!(store.get(&released.token).is_ok());
    }
}
