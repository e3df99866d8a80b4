//! Topic-based event bus for storage-layer events.
//!
//! Mode transitions, remote convergence, and user-facing notices are published
//! to separate topics so consumers subscribe only to what they render. The
//! notice topic is the output sink for the notification collaborator.

mod bus;
mod types;

pub use bus::{Event, EventBus, Topic};
pub use types::{ModeEvent, Notice, SyncEvent};
