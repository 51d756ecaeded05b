use std::sync::atomic::{AtomicU64, Ordering};

/// Issues admission order numbers.
///
/// Values start at 1, strictly increase and are never handed out twice, no
/// matter how many threads call [`Sequencer::next`] at once.
#[derive(Debug)]
pub struct Sequencer {
    next: AtomicU64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The most recently issued value (0 if none yet).
    pub fn last_issued(&self) -> u64 {
        self.next.load(Ordering::SeqCst).saturating_sub(1)
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}
