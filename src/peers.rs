//! # Collaborator seams: identities and the two peer capabilities.
//!
//! The pacer composes with independent concurrent peers reached only through
//! asynchronous message exchange. It depends on exactly two capabilities:
//!
//! - [`CountProvider`]: "accepts a count request, eventually answers with a
//!   count" — the answer arrives as a
//!   [`PacerEvent::InProgressCountFetched`](crate::PacerEvent) submitted
//!   through a [`PacerHandle`](crate::PacerHandle) the peer holds.
//! - [`TaskStore`]: "accepts a bounded load request, eventually answers with
//!   a checkpoint" — the answer arrives as
//!   [`PacerEvent::TasksLoaded`](crate::PacerEvent).
//!
//! Both request methods are fire-and-forget from the pacer's point of view:
//! implementations should enqueue work and return promptly, never blocking
//! the calling actor. A peer that never answers stalls the cycle (there is
//! no timeout); it cannot corrupt it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

/// Opaque identifier of the partition a pacer is scoped to.
///
/// Passed through to the task store on every load request; otherwise inert
/// to the control logic.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PartitionId(Arc<str>);

impl PartitionId {
    /// Creates a partition identifier.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a count provider.
///
/// Used for first-reply-wins accounting within a cycle: one counted reply
/// per provider per cycle, keyed by this identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProviderId(Arc<str>);

impl ProviderId {
    /// Creates a provider identifier.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A peer that reports how many tasks it currently holds in progress.
///
/// The provider set is fixed at initialization; providers are never added or
/// removed while the pacer runs. Replies may arrive in any order, late, or
/// duplicated; the pacer counts at most one reply per provider per cycle.
#[async_trait]
pub trait CountProvider: Send + Sync + 'static {
    /// Returns this provider's stable identity.
    fn id(&self) -> ProviderId;

    /// Requests the current in-progress count.
    ///
    /// Implementations should eventually submit
    /// [`PacerEvent::InProgressCountFetched`](crate::PacerEvent) carrying
    /// [`id()`](CountProvider::id) and the count, and must not block here.
    async fn request_in_progress_count(&self);
}

/// Shared handle to a count provider.
pub type ProviderRef = Arc<dyn CountProvider>;

/// The durable task store the pacer pulls work from.
///
/// A load request asks for up to `batch_size` tasks due at or before
/// `upper_bound`. The store eventually answers with
/// [`PacerEvent::TasksLoaded`](crate::PacerEvent) carrying the checkpoint
/// time up to which it has now supplied tasks. The checkpoint may exceed
/// `upper_bound` (buffered results were ready) or fall short (fewer than a
/// batch were available).
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Requests up to `batch_size` tasks due at or before `upper_bound`.
    ///
    /// Must not block; the pacer issues at most one load at a time and
    /// suspends its cycle until the reply arrives.
    async fn load_tasks(&self, partition: &PartitionId, upper_bound: Instant, batch_size: u32);
}

/// Shared handle to the task store.
pub type StoreRef = Arc<dyn TaskStore>;
