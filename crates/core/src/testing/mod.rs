//! Testing utilities for driving the queue without waiting on real time.
//!
//! # Example
//!
//! ```rust,ignore
//! use peakguard_core::testing::{fixtures, ManualClock};
//!
//! let clock = Arc::new(ManualClock::new());
//! let queue = QueueService::with_clock(&fixtures::queue_config(2), clock.clone());
//!
//! clock.advance(chrono::Duration::seconds(31));
//! queue.sweep()?;
//! ```

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::queue::Clock;

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Start at the current wall-clock time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::config::QueueConfig;

    /// Queue settings with short, round limits:
    /// 30s idle while waiting, 60s idle while active, 300s lifetime,
    /// 120s retention, 2s default release interval.
    pub fn queue_config(capacity: usize) -> QueueConfig {
        QueueConfig {
            capacity,
            max_idle_wait_secs: 30,
            max_idle_active_secs: 60,
            max_active_lifetime_secs: 300,
            retention_window_secs: 120,
            default_release_interval_secs: 2.0,
            ..QueueConfig::default()
        }
    }
}
