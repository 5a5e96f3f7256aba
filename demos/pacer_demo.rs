//! Pacer against an in-memory executor pair and a simulated task store.
//!
//! Run with: `cargo run --example pacer_demo --features logging`
//!
//! Two fake executors report slowly-changing in-progress counts; the store
//! answers every load with `checkpoint = upper_bound`. Watch the pacer
//! alternate between fetching (counts below the ceiling) and throttling
//! (counts at the ceiling) on stdout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use taskpacer::{
    Bus, CountProvider, LogWriter, Pacer, PacerConfig, PacerHandle, PartitionId, ProviderId,
    TaskStore,
};

/// Executor stand-in: each count request returns a figure that creeps up,
/// crossing the ceiling and falling back, so both admission outcomes show.
struct FakeExecutor {
    id: ProviderId,
    pacer: PacerHandle,
    polls: AtomicU64,
}

#[async_trait]
impl CountProvider for FakeExecutor {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    async fn request_in_progress_count(&self) {
        let poll = self.polls.fetch_add(1, Ordering::Relaxed);
        let count = (poll % 8).min(6);
        let _ = self.pacer.count_fetched(self.id.clone(), count).await;
    }
}

/// Store stand-in: pretends every load filled the requested window.
struct FakeStore {
    pacer: PacerHandle,
}

#[async_trait]
impl TaskStore for FakeStore {
    async fn load_tasks(&self, _partition: &PartitionId, upper_bound: Instant, _batch_size: u32) {
        let _ = self.pacer.tasks_loaded(upper_bound).await;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = PacerConfig {
        max_in_flight_tasks: 10,
        task_fetch_batch_size: 3,
        min_tick_delay: Duration::from_millis(200),
        max_look_ahead: Duration::from_secs(1),
        prefetch_window: Duration::from_millis(500),
        mailbox_capacity: 64,
    };

    let bus = Bus::new(64);
    let token = CancellationToken::new();
    LogWriter::spawn(&bus, token.clone());

    let pacer = Pacer::new(PartitionId::new("demo-partition"), cfg, bus)?;
    let handle = pacer.handle();
    let join = pacer.spawn(token.clone());

    let executors: Vec<Arc<dyn CountProvider>> = (0..2u64)
        .map(|i| {
            Arc::new(FakeExecutor {
                id: ProviderId::new(format!("executor-{i}")),
                pacer: handle.clone(),
                polls: AtomicU64::new(i * 3),
            }) as Arc<dyn CountProvider>
        })
        .collect();
    let store = Arc::new(FakeStore {
        pacer: handle.clone(),
    });

    handle.initialize(store, executors).await?;

    tokio::time::sleep(Duration::from_secs(5)).await;
    token.cancel();
    join.await?;
    Ok(())
}
