//! # taskpacer
//!
//! **Taskpacer** is the throughput-control loop of a partitioned task
//! scheduler: per partition, a [`Pacer`] decides cycle by cycle whether it is
//! safe to pull more work from durable storage into active execution, and how
//! far into the future it may look while doing so.
//!
//! It does **not** execute tasks and does **not** choose which tasks run. It
//! only paces: gather in-progress counts, decide admission, issue one bounded
//! load request, wait, repeat. All state is in-memory and rebuilt from scratch
//! on every activation.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!           ┌────────────────┐    ┌────────────────┐
//!           │ CountProvider  │    │ CountProvider  │   (fixed set, N ≥ 1)
//!           │  (executor A)  │    │ (dispatch core)│
//!           └───────▲──┬─────┘    └───────▲──┬─────┘
//!     request count │  │ count            │  │ count
//!                   │  ▼                  │  ▼
//! ┌─────────────────┴──────────────────── ┴─────────────────────┐
//! │  Pacer (one per partition, single sequential actor)         │
//! │  - mailbox: mpsc<PacerEvent>  (the only way in)             │
//! │  - phase:   Uninitialized → Gathering → Throttled/Fetching  │
//! │  - cycle:   pending set, accumulated count, one fetch flag  │
//! │  - bus:     broadcast<Event> (observability, lossy)         │
//! └───────▲──┬──────────────────────────────────────────────────┘
//!  loaded │  │ load(upper_bound, batch)
//!         │  ▼
//!    ┌────┴─────────┐
//!    │  TaskStore   │  (durable storage, answers with a checkpoint)
//!    └──────────────┘
//! ```
//!
//! ### Control cycle
//! ```text
//! Initialize { store, providers }        (once, from the owner)
//!     │
//!     ▼
//! GatheringCounts:
//!   reset pending ← full provider set, accumulated ← 0
//!   request a count from every provider
//!   each first reply per provider is summed; duplicates are discarded
//!   when all reported:
//!     ├─ accumulated ≥ max_in_flight_tasks ──► Throttled
//!     │       arm one-shot timer(min_tick_delay) ──► GatheringCounts
//!     └─ else ──────────────────────────────► Fetching
//!             load(now + max_look_ahead, batch_size), one outstanding
//!             on TasksLoaded { checkpoint }:
//!               delay = max(0, (checkpoint − prefetch_window) − now)
//!               arm one-shot timer(delay) ──► GatheringCounts
//! ```
//!
//! ## Rules
//! - The pacer is a single logical sequential actor: all cycle state is
//!   exclusively owned, no lock, no racing mutation.
//! - At most one load request is outstanding; no count round overlaps it.
//! - Unrecognized or mis-phased messages never disturb cycle state or armed
//!   timers. Timers carry a generation tag; stale fires are ignored.
//! - A peer that never replies stalls the cycle. That is a liveness concern
//!   for the owner's monitoring, not an error here: there is no timeout and
//!   no retry beyond the next cycle.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use taskpacer::{
//!     Bus, CountProvider, Pacer, PacerConfig, PacerHandle, PartitionId,
//!     ProviderId, TaskStore,
//! };
//!
//! /// Reports how many tasks this peer currently holds in progress.
//! struct IdleExecutor {
//!     id: ProviderId,
//!     pacer: PacerHandle,
//! }
//!
//! #[async_trait]
//! impl CountProvider for IdleExecutor {
//!     fn id(&self) -> ProviderId {
//!         self.id.clone()
//!     }
//!
//!     async fn request_in_progress_count(&self) {
//!         let _ = self.pacer.count_fetched(self.id.clone(), 0).await;
//!     }
//! }
//!
//! /// Answers every load with a checkpoint equal to the upper bound.
//! struct EchoStore {
//!     pacer: PacerHandle,
//! }
//!
//! #[async_trait]
//! impl TaskStore for EchoStore {
//!     async fn load_tasks(
//!         &self,
//!         _partition: &PartitionId,
//!         upper_bound: tokio::time::Instant,
//!         _batch_size: u32,
//!     ) {
//!         let _ = self.pacer.tasks_loaded(upper_bound).await;
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = PacerConfig {
//!         max_in_flight_tasks: 10,
//!         task_fetch_batch_size: 3,
//!         min_tick_delay: Duration::from_millis(200),
//!         max_look_ahead: Duration::from_secs(1),
//!         prefetch_window: Duration::from_millis(500),
//!         mailbox_capacity: 64,
//!     };
//!
//!     let pacer = Pacer::new(PartitionId::new("partition-0"), cfg, Bus::new(64))?;
//!     let handle = pacer.handle();
//!
//!     let token = CancellationToken::new();
//!     let join = pacer.spawn(token.clone());
//!
//!     let executor = Arc::new(IdleExecutor {
//!         id: ProviderId::new("executor-0"),
//!         pacer: handle.clone(),
//!     });
//!     let store = Arc::new(EchoStore { pacer: handle.clone() });
//!     handle.initialize(store, vec![executor]).await?;
//!
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     token.cancel();
//!     join.await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod events;
mod pacer;
mod peers;

// ---- Public re-exports ----

pub use config::PacerConfig;
pub use error::{ConfigError, SubmitError};
pub use events::{Bus, Event, EventKind};
pub use pacer::{Pacer, PacerEvent, PacerHandle};
pub use peers::{CountProvider, PartitionId, ProviderId, ProviderRef, StoreRef, TaskStore};

// Optional: expose a simple built-in event writer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
mod logwriter;
#[cfg(feature = "logging")]
pub use logwriter::LogWriter;
