//! Queue tickets: data model, sequencer, and store.

mod sequencer;
mod store;
mod types;

pub use sequencer::Sequencer;
pub use store::{TicketError, TicketStore};
pub use types::{mask_token, ExpiryReason, Ticket, TicketState};
