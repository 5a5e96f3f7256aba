//! Pacing core: the per-partition control-loop actor.
//!
//! Internal modules:
//! - [`message`]: the typed protocol alphabet delivered through the mailbox;
//! - [`phase`]: the phase tag and exclusively-owned cycle accounting;
//! - [`handle`]: cloneable submission handle held by collaborators;
//! - [`core`]: the actor loop and state machine.

pub mod handle;
pub mod message;

mod core;
mod phase;

pub use self::core::Pacer;
pub use handle::PacerHandle;
pub use message::PacerEvent;
