//! Moving estimate of how often admission slots free up.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Keeps the timestamps of the most recent slot releases.
///
/// The average interval is `(now - oldest sample) / samples`. Measuring up to
/// `now` rather than to the newest sample lets the estimate grow on its own
/// when releases stop arriving.
#[derive(Debug, Clone)]
pub struct ReleaseCadence {
    samples: VecDeque<DateTime<Utc>>,
    window: usize,
    default_interval_secs: f64,
}

impl ReleaseCadence {
    pub fn new(window: usize, default_interval_secs: f64) -> Self {
        let window = window.max(2);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
            default_interval_secs,
        }
    }

    /// Record one freed slot.
    pub fn record(&mut self, at: DateTime<Utc>) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(at);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Seconds between releases. Falls back to the configured default until
    /// two releases have been observed.
    pub fn average_interval_secs(&self, now: DateTime<Utc>) -> f64 {
        let Some(oldest) = self.samples.front() else {
            return self.default_interval_secs;
        };
        if self.samples.len() < 2 {
            return self.default_interval_secs;
        }

        let span_ms = (now - *oldest).num_milliseconds().max(0) as f64;
        span_ms / 1000.0 / self.samples.len() as f64
    }

    /// `position × average interval`, rounded up to whole seconds.
    pub fn estimate_wait_secs(&self, position: usize, now: DateTime<Utc>) -> u64 {
        if position == 0 {
            return 0;
        }
        (position as f64 * self.average_interval_secs(now)).ceil() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_default_without_history() {
        let cadence = ReleaseCadence::new(8, 1.5);
        let now = Utc::now();
        assert_eq!(cadence.average_interval_secs(now), 1.5);
        assert_eq!(cadence.estimate_wait_secs(4, now), 6);
        assert_eq!(cadence.estimate_wait_secs(0, now), 0);
    }

    #[test]
    fn test_single_sample_still_uses_default() {
        let mut cadence = ReleaseCadence::new(8, 2.0);
        let now = Utc::now();
        cadence.record(now);
        assert_eq!(cadence.average_interval_secs(now + Duration::seconds(30)), 2.0);
    }

    #[test]
    fn test_average_from_samples() {
        let mut cadence = ReleaseCadence::new(8, 1.0);
        let t0 = Utc::now();
        for i in 0..4 {
            cadence.record(t0 + Duration::seconds(i * 2));
        }
        // four releases over the 8 seconds up to now
        let now = t0 + Duration::seconds(8);
        assert_eq!(cadence.average_interval_secs(now), 2.0);
        assert_eq!(cadence.estimate_wait_secs(3, now), 6);
    }

    #[test]
    fn test_estimate_grows_when_releases_stop() {
        let mut cadence = ReleaseCadence::new(8, 1.0);
        let t0 = Utc::now();
        cadence.record(t0);
        cadence.record(t0 + Duration::seconds(1));

        let soon = cadence.average_interval_secs(t0 + Duration::seconds(2));
        let later = cadence.average_interval_secs(t0 + Duration::seconds(60));
        assert!(later > soon);
    }

    #[test]
    fn test_window_drops_oldest() {
        let mut cadence = ReleaseCadence::new(2, 1.0);
        let t0 = Utc::now();
        cadence.record(t0);
        cadence.record(t0 + Duration::seconds(100));
        cadence.record(t0 + Duration::seconds(101));
        assert_eq!(cadence.len(), 2);
        // oldest kept sample is t0+100
        let now = t0 + Duration::seconds(102);
        assert_eq!(cadence.average_interval_secs(now), 1.0);
    }

    #[test]
    fn test_estimate_rounds_up() {
        let cadence = ReleaseCadence::new(4, 0.4);
        assert_eq!(cadence.estimate_wait_secs(1, Utc::now()), 1);
        assert_eq!(cadence.estimate_wait_secs(3, Utc::now()), 2);
    }

    #[test]
    fn test_clear_restores_default() {
        let mut cadence = ReleaseCadence::new(4, 3.0);
        let t0 = Utc::now();
        cadence.record(t0);
        cadence.record(t0);
        cadence.clear();
        assert!(cadence.is_empty());
        assert_eq!(cadence.average_interval_secs(t0), 3.0);
    }
}
