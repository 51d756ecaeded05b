//! Admission queue: FIFO wait-line in front of a fixed number of active slots.

mod cadence;
mod clock;
mod controller;
mod scheduler;
mod service;
mod sweeper;
mod types;

pub use cadence::ReleaseCadence;
pub use clock::{Clock, SystemClock};
pub use controller::AdmissionController;
pub use scheduler::QueueScheduler;
pub use service::QueueService;
pub use sweeper::{ExpiryPolicy, SweepReport, Sweeper};
pub use types::{JoinOutcome, QueueError, QueueStats, QueueStatus, ReleaseOutcome};
