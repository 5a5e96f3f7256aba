//! Phase tag and per-cycle accounting.
//!
//! [`CycleState`] is exclusively owned by the pacer actor and reset at the
//! start of every cycle. Accumulation is commutative and first-reply-wins:
//! the admission decision sees exactly one counted value per provider,
//! regardless of reply order.

use std::collections::HashSet;

use crate::peers::ProviderId;

/// Where the pacer currently is in its control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Phase {
    /// Created but not yet activated; waiting for `Initialize`.
    Uninitialized,

    /// Count requests are out; waiting for every provider to report.
    GatheringCounts,

    /// At capacity; waiting out `min_tick_delay` before re-polling.
    Throttled,

    /// A load request is or was outstanding; waiting for the store's
    /// checkpoint and then the prefetch-paced timer.
    Fetching,
}

/// Mutable per-cycle accounting, reset on every `GatheringCounts` entry.
pub(super) struct CycleState {
    /// Providers that have not yet been counted this cycle.
    pub pending: HashSet<ProviderId>,

    /// Running sum of counted replies.
    pub accumulated: u64,

    /// Whether a load request is outstanding. At most one at any time.
    pub outstanding_fetch: bool,
}

impl CycleState {
    /// Creates empty accounting for an idle pacer.
    pub fn new() -> Self {
        Self {
            pending: HashSet::new(),
            accumulated: 0,
            outstanding_fetch: false,
        }
    }

    /// Resets accounting for a fresh count-gathering round.
    pub fn begin(&mut self, providers: impl Iterator<Item = ProviderId>) {
        self.pending = providers.collect();
        self.accumulated = 0;
    }

    /// Records a count reply; first reply per provider wins.
    ///
    /// Returns `true` if the reply was counted, `false` if the provider
    /// already reported this cycle (the value is discarded and `pending`
    /// does not shrink twice).
    pub fn record_count(&mut self, provider: &ProviderId, count: u64) -> bool {
        if !self.pending.remove(provider) {
            return false;
        }
        self.accumulated = self.accumulated.saturating_add(count);
        true
    }

    /// Returns `true` once every provider has been counted this cycle.
    pub fn all_reported(&self) -> bool {
        self.pending.is_empty()
    }
}
