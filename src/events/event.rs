//! # Runtime events emitted by the pacer.
//!
//! [`EventKind`] classifies what happened in the control cycle; [`Event`]
//! carries optional metadata (partition, provider, counts, delays). Events
//! are observability output only: the control logic never reads the bus, so
//! a lagging or absent subscriber can never disturb pacing.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of pacing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Pacer received its store handle and provider set and became active.
    ///
    /// Sets:
    /// - `partition`: partition identifier
    /// - `count`: number of count providers
    Initialized,

    /// A count-gathering round started; requests went to every provider.
    ///
    /// Sets:
    /// - `partition`: partition identifier
    CycleStarted,

    /// A count reply was discarded (duplicate within the cycle, or outside
    /// a gathering round).
    ///
    /// Sets:
    /// - `partition`: partition identifier
    /// - `provider`: replying provider
    /// - `count`: the discarded value
    /// - `reason`: `"duplicate"` or `"outside_gathering"`
    CountDiscarded,

    /// Accumulated counts reached the ceiling; no fetch this cycle.
    ///
    /// Sets:
    /// - `partition`: partition identifier
    /// - `count`: accumulated in-progress total
    /// - `delay_ms`: backoff before the next count round
    Throttled,

    /// A bounded load request was issued to the task store.
    ///
    /// Sets:
    /// - `partition`: partition identifier
    /// - `count`: accumulated in-progress total at admission
    /// - `batch`: requested batch size
    FetchIssued,

    /// The task store reported a checkpoint; the next round is scheduled.
    ///
    /// Sets:
    /// - `partition`: partition identifier
    /// - `delay_ms`: prefetch-paced wait before the next count round
    FetchCompleted,

    /// A protocol message arrived in a phase where it is not recognized and
    /// was ignored without touching cycle state.
    ///
    /// Sets:
    /// - `partition`: partition identifier
    /// - `reason`: which message was ignored
    ReplyIgnored,
}

/// Pacing event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs; never used in control arithmetic)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Partition this pacer is scoped to, if applicable.
    pub partition: Option<Arc<str>>,
    /// Count provider, if applicable.
    pub provider: Option<Arc<str>>,
    /// An in-progress count or provider total (see [`EventKind`]).
    pub count: Option<u64>,
    /// Scheduled delay in milliseconds (compact).
    pub delay_ms: Option<u64>,
    /// Requested batch size.
    pub batch: Option<u32>,
    /// Human-readable reason (discards, ignored input).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            partition: None,
            provider: None,
            count: None,
            delay_ms: None,
            batch: None,
            reason: None,
        }
    }

    /// Attaches a partition identifier.
    #[inline]
    pub fn with_partition(mut self, partition: impl Into<Arc<str>>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    /// Attaches a provider identifier.
    #[inline]
    pub fn with_provider(mut self, provider: impl Into<Arc<str>>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Attaches a count value.
    #[inline]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u64::MAX)) as u64;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a batch size.
    #[inline]
    pub fn with_batch(mut self, batch: u32) -> Self {
        self.batch = Some(batch);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
