//! # Pacing configuration.
//!
//! Provides [`PacerConfig`], the immutable settings a [`Pacer`](crate::Pacer)
//! is constructed with. The core assumes **no defaults**: every control
//! setting is supplied explicitly by the surrounding settings layer and
//! validated once at construction.
//!
//! ## Field semantics
//! - `max_in_flight_tasks`: global concurrency ceiling across all count
//!   providers (must be > 0)
//! - `task_fetch_batch_size`: max tasks requested per load (must be > 0)
//! - `min_tick_delay`: backoff before re-polling counts when at capacity
//! - `max_look_ahead`: how far past now a load's upper bound may extend
//!   (must be > 0)
//! - `prefetch_window`: margin subtracted from a reported checkpoint to
//!   compute the earliest start of the next cycle
//! - `mailbox_capacity`: inbound event channel capacity (min 1; clamped)

use std::time::Duration;

use crate::error::ConfigError;

/// Immutable settings for one pacer instance.
///
/// All fields are public; construct with struct syntax and let
/// [`Pacer::new`](crate::Pacer::new) run [`PacerConfig::validate`].
#[derive(Clone, Debug)]
pub struct PacerConfig {
    /// Global concurrency ceiling.
    ///
    /// When the summed in-progress counts reach this value, the pacer
    /// throttles instead of fetching and re-polls after `min_tick_delay`.
    pub max_in_flight_tasks: u64,

    /// Maximum number of tasks requested per load.
    ///
    /// Passed through to the task store unchanged; the pacer never inspects
    /// how many tasks were actually returned, only the checkpoint.
    pub task_fetch_batch_size: u32,

    /// Minimum wait before re-polling counts when at capacity.
    ///
    /// `Duration::ZERO` is allowed and means the next count round starts as
    /// soon as the throttle tick is processed.
    pub min_tick_delay: Duration,

    /// How far past "now" a load request's upper time bound may extend.
    pub max_look_ahead: Duration,

    /// Safety margin subtracted from a reported checkpoint.
    ///
    /// The next count round starts no earlier than
    /// `checkpoint - prefetch_window`; a result already in the past clamps
    /// the wait to zero.
    pub prefetch_window: Duration,

    /// Capacity of the pacer's inbound event channel.
    ///
    /// When full, [`PacerHandle::submit`](crate::PacerHandle::submit) waits
    /// and [`PacerHandle::try_submit`](crate::PacerHandle::try_submit)
    /// returns `Full`. Minimum value is 1 (clamped).
    pub mailbox_capacity: usize,
}

impl PacerConfig {
    /// Checks the settings the control loop cannot be total without.
    ///
    /// Zero durations for `min_tick_delay` and `prefetch_window` are valid;
    /// a zero ceiling, batch size, or lookahead is not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_in_flight_tasks == 0 {
            return Err(ConfigError::ZeroInFlightCeiling);
        }
        if self.task_fetch_batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.max_look_ahead.is_zero() {
            return Err(ConfigError::ZeroLookAhead);
        }
        Ok(())
    }

    /// Returns the mailbox capacity clamped to a minimum of 1.
    #[inline]
    pub fn mailbox_capacity_clamped(&self) -> usize {
        self.mailbox_capacity.max(1)
    }
}
