//! Observability events for the pacing cycle.
//!
//! - [`event`]: the [`Event`] record and [`EventKind`] vocabulary;
//! - [`bus`]: lossy broadcast channel the pacer publishes into.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
