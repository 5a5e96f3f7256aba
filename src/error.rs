//! Error types used by the taskpacer runtime.
//!
//! The control loop itself has no fallible operations: it performs no I/O and
//! its time arithmetic is total. The errors here belong to the ambient
//! surface around it:
//!
//! - [`ConfigError`] — invalid settings rejected at construction.
//! - [`SubmitError`] — mailbox submission failures seen by collaborators.
//!
//! Both provide `as_label` for stable snake_case identifiers in logs/metrics.

use thiserror::Error;

/// Errors produced by [`PacerConfig::validate`](crate::PacerConfig::validate).
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `max_in_flight_tasks` was zero; the admission decision would throttle
    /// forever.
    #[error("max_in_flight_tasks must be greater than zero")]
    ZeroInFlightCeiling,

    /// `task_fetch_batch_size` was zero; every load would be empty.
    #[error("task_fetch_batch_size must be greater than zero")]
    ZeroBatchSize,

    /// `max_look_ahead` was zero; a load could never cover not-yet-due work.
    #[error("max_look_ahead must be a positive duration")]
    ZeroLookAhead,
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskpacer::ConfigError;
    ///
    /// assert_eq!(ConfigError::ZeroBatchSize.as_label(), "config_zero_batch_size");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::ZeroInFlightCeiling => "config_zero_in_flight_ceiling",
            ConfigError::ZeroBatchSize => "config_zero_batch_size",
            ConfigError::ZeroLookAhead => "config_zero_look_ahead",
        }
    }
}

/// Error returned by [`PacerHandle`](crate::PacerHandle) submissions.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// Mailbox is full (try again later or use async `submit`).
    #[error("pacer mailbox full")]
    Full,

    /// Mailbox is closed (pacer task stopped or was torn down).
    #[error("pacer mailbox closed")]
    Closed,
}

impl SubmitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubmitError::Full => "submit_full",
            SubmitError::Closed => "submit_closed",
        }
    }
}
