//! # Simple logging listener for debugging and demos.
//!
//! [`LogWriter`] drains the event bus on its own task and prints events to
//! stdout in a human-readable format.
//!
//! ## Output format
//! ```text
//! [initialized] partition=p0 providers=2
//! [cycle] partition=p0
//! [throttled] partition=p0 in_flight=12 retry_in=200ms
//! [fetch] partition=p0 in_flight=2 batch=3
//! [loaded] partition=p0 next_poll_in=1000ms
//! [discarded] partition=p0 provider=executor-1 count=4 reason=duplicate
//! ```
//!
//! Not intended for production use; subscribe to the [`Bus`] directly for
//! structured logging or metrics collection.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};

/// Stdout event writer. Enabled via the `logging` feature.
pub struct LogWriter;

impl LogWriter {
    /// Subscribes to the bus and prints events until `token` is cancelled
    /// or the bus closes. Lagged stretches are skipped silently.
    pub fn spawn(bus: &Bus, token: CancellationToken) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => Self::write(&ev),
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => continue,
                    },
                }
            }
        })
    }

    fn write(e: &Event) {
        let partition = e.partition.as_deref().unwrap_or("?");
        match e.kind {
            EventKind::Initialized => {
                println!(
                    "[initialized] partition={partition} providers={}",
                    e.count.unwrap_or(0)
                );
            }
            EventKind::CycleStarted => {
                println!("[cycle] partition={partition}");
            }
            EventKind::CountDiscarded => {
                println!(
                    "[discarded] partition={partition} provider={} count={} reason={}",
                    e.provider.as_deref().unwrap_or("?"),
                    e.count.unwrap_or(0),
                    e.reason.as_deref().unwrap_or("?"),
                );
            }
            EventKind::Throttled => {
                println!(
                    "[throttled] partition={partition} in_flight={} retry_in={}ms",
                    e.count.unwrap_or(0),
                    e.delay_ms.unwrap_or(0),
                );
            }
            EventKind::FetchIssued => {
                println!(
                    "[fetch] partition={partition} in_flight={} batch={}",
                    e.count.unwrap_or(0),
                    e.batch.unwrap_or(0),
                );
            }
            EventKind::FetchCompleted => {
                println!(
                    "[loaded] partition={partition} next_poll_in={}ms",
                    e.delay_ms.unwrap_or(0),
                );
            }
            EventKind::ReplyIgnored => {
                println!(
                    "[ignored] partition={partition} reason={}",
                    e.reason.as_deref().unwrap_or("?"),
                );
            }
        }
    }
}
