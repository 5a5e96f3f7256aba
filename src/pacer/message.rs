//! # The pacer's inbound protocol.
//!
//! Everything that can happen to a pacer arrives as one [`PacerEvent`] on
//! its mailbox; the actor owns all state and processes events strictly
//! sequentially. Collaborators never touch pacer state directly.
//!
//! Whether an event is *recognized* depends on the current phase: a count
//! reply outside a gathering round, a load completion without an outstanding
//! fetch, a second `Initialize`, or a stale `PollElapsed` are all ignored
//! without disturbing cycle state or armed timers.

use tokio::time::Instant;

use crate::peers::{ProviderId, ProviderRef, StoreRef};

/// A message delivered to the pacer's mailbox.
pub enum PacerEvent {
    /// Activates the pacer: supplies the task store handle and the fixed
    /// provider set. Sent once by the owner; later sends are ignored.
    Initialize {
        /// Durable task store to issue load requests against.
        store: StoreRef,
        /// Fixed set of count providers polled each cycle.
        providers: Vec<ProviderRef>,
    },

    /// A provider's answer to a count request.
    ///
    /// At most one reply per provider is counted per cycle; extras are
    /// discarded.
    InProgressCountFetched {
        /// Identity of the replying provider.
        provider: ProviderId,
        /// Number of tasks the provider currently holds in progress.
        count: u64,
    },

    /// The task store's answer to a load request: the time up to which it
    /// has now supplied tasks (independent of how many were returned).
    TasksLoaded {
        /// Checkpoint time; may exceed or fall short of the requested
        /// upper bound.
        checkpoint: Instant,
    },

    /// A one-shot pacing timer fired.
    ///
    /// Ticks carry the generation current when the timer was armed; a tick
    /// whose generation no longer matches is stale and ignored.
    PollElapsed {
        /// Timer generation at arming time.
        generation: u64,
    },
}
