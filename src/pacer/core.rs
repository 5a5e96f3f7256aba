//! # Pacer: the per-partition admission and pacing actor.
//!
//! Owns all cycle state and processes mailbox events strictly sequentially;
//! collaborators communicate only by enqueuing typed [`PacerEvent`]s. The
//! actor never blocks a thread waiting for a peer: it suspends the logical
//! cycle via its phase while remaining responsive to other messages.
//!
//! ## Cycle
//! ```text
//! Initialize ──► GatheringCounts ──► (all providers counted)
//!                    ▲                    │
//!                    │          accumulated ≥ ceiling?
//!                    │               ┌────┴─────┐
//!                    │              yes         no
//!                    │               │          │
//!                    │           Throttled   Fetching
//!                    │               │          │ load(now + look_ahead, batch)
//!                    │    timer(min_tick)       │ TasksLoaded { checkpoint }
//!                    │               │          │ timer(max(0, checkpoint
//!                    │               │          │        − prefetch − now))
//!                    └───────────────┴──────────┘
//! ```
//!
//! ## Rules
//! - At most one load request outstanding; no count round overlaps it.
//! - One counted reply per provider per cycle; extras discarded silently.
//! - Timers are one-shot spawned sleeps tagged with a generation. Only a
//!   legitimate transition arms a new timer (advancing the generation);
//!   unrelated input never touches it, so an armed timer always fires at
//!   its original deadline and stale fires are detected and dropped.
//! - Mis-phased protocol input is ignored without mutating any state.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::PacerConfig;
use crate::error::ConfigError;
use crate::events::{Bus, Event, EventKind};
use crate::peers::{PartitionId, ProviderId, ProviderRef, StoreRef};

use super::handle::PacerHandle;
use super::message::PacerEvent;
use super::phase::{CycleState, Phase};

/// Per-partition throughput controller.
///
/// Created idle; activated by a single [`PacerEvent::Initialize`]; loops
/// until the owner cancels the runtime token. Holds nothing that must
/// survive a restart: a fresh instance begins a fresh cycle.
pub struct Pacer {
    partition: PartitionId,
    cfg: PacerConfig,
    bus: Bus,

    phase: Phase,
    cycle: CycleState,
    /// Generation of the most recently armed pacing timer.
    timer_gen: u64,

    store: Option<StoreRef>,
    providers: Vec<ProviderRef>,

    tx: mpsc::Sender<PacerEvent>,
    rx: mpsc::Receiver<PacerEvent>,
}

impl Pacer {
    /// Creates an idle pacer after validating the configuration.
    pub fn new(partition: PartitionId, cfg: PacerConfig, bus: Bus) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let (tx, rx) = mpsc::channel(cfg.mailbox_capacity_clamped());

        Ok(Self {
            partition,
            cfg,
            bus,
            phase: Phase::Uninitialized,
            cycle: CycleState::new(),
            timer_gen: 0,
            store: None,
            providers: Vec::new(),
            tx,
            rx,
        })
    }

    /// Returns a handle for submitting events to this pacer.
    pub fn handle(&self) -> PacerHandle {
        PacerHandle::new(self.tx.clone())
    }

    /// Spawns the actor loop; it runs until `token` is cancelled or every
    /// handle is dropped.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    async fn run(mut self, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = self.rx.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
            }
        }
    }

    async fn handle_event(&mut self, event: PacerEvent) {
        match event {
            PacerEvent::Initialize { store, providers } => {
                self.on_initialize(store, providers).await;
            }
            PacerEvent::InProgressCountFetched { provider, count } => {
                self.on_count_fetched(provider, count).await;
            }
            PacerEvent::TasksLoaded { checkpoint } => {
                self.on_tasks_loaded(checkpoint);
            }
            PacerEvent::PollElapsed { generation } => {
                self.on_poll_elapsed(generation).await;
            }
        }
    }

    /// Activates the loop. Exactly one `Initialize` is honored; later ones
    /// are ignored without disturbing the running cycle.
    async fn on_initialize(&mut self, store: StoreRef, providers: Vec<ProviderRef>) {
        if self.phase != Phase::Uninitialized {
            self.ignored("initialize_duplicate");
            return;
        }

        self.bus.publish(
            Event::now(EventKind::Initialized)
                .with_partition(self.partition.as_str())
                .with_count(providers.len() as u64),
        );
        self.store = Some(store);
        self.providers = providers;
        self.start_cycle().await;
    }

    /// Enters `GatheringCounts`: resets cycle accounting and requests a
    /// count from every provider.
    async fn start_cycle(&mut self) {
        self.phase = Phase::GatheringCounts;
        self.cycle.begin(self.providers.iter().map(|p| p.id()));
        self.bus.publish(
            Event::now(EventKind::CycleStarted).with_partition(self.partition.as_str()),
        );

        for provider in &self.providers {
            provider.request_in_progress_count().await;
        }

        // Degenerate empty provider set: the round is already complete.
        if self.cycle.all_reported() {
            self.evaluate_admission().await;
        }
    }

    /// Counts a reply if this provider has not reported yet this cycle;
    /// decides admission once every provider has.
    async fn on_count_fetched(&mut self, provider: ProviderId, count: u64) {
        if self.phase != Phase::GatheringCounts {
            self.bus.publish(
                Event::now(EventKind::CountDiscarded)
                    .with_partition(self.partition.as_str())
                    .with_provider(provider.as_str())
                    .with_count(count)
                    .with_reason("outside_gathering"),
            );
            return;
        }

        if !self.cycle.record_count(&provider, count) {
            self.bus.publish(
                Event::now(EventKind::CountDiscarded)
                    .with_partition(self.partition.as_str())
                    .with_provider(provider.as_str())
                    .with_count(count)
                    .with_reason("duplicate"),
            );
            return;
        }

        if self.cycle.all_reported() {
            self.evaluate_admission().await;
        }
    }

    /// All providers counted: throttle at capacity, otherwise fetch.
    async fn evaluate_admission(&mut self) {
        if self.cycle.accumulated >= self.cfg.max_in_flight_tasks {
            self.phase = Phase::Throttled;
            self.bus.publish(
                Event::now(EventKind::Throttled)
                    .with_partition(self.partition.as_str())
                    .with_count(self.cycle.accumulated)
                    .with_delay(self.cfg.min_tick_delay),
            );
            self.arm_poll_timer(self.cfg.min_tick_delay);
        } else {
            self.issue_fetch().await;
        }
    }

    /// Issues the cycle's single bounded load request and suspends the
    /// cycle until the store answers.
    async fn issue_fetch(&mut self) {
        // The store handle is always present past initialization.
        let Some(store) = self.store.clone() else {
            return;
        };

        self.phase = Phase::Fetching;
        self.cycle.outstanding_fetch = true;
        let upper_bound = Instant::now() + self.cfg.max_look_ahead;

        self.bus.publish(
            Event::now(EventKind::FetchIssued)
                .with_partition(self.partition.as_str())
                .with_count(self.cycle.accumulated)
                .with_batch(self.cfg.task_fetch_batch_size),
        );
        store
            .load_tasks(&self.partition, upper_bound, self.cfg.task_fetch_batch_size)
            .await;
    }

    /// Completes the fetch: schedules the next round no earlier than
    /// `checkpoint - prefetch_window`, clamping a past deadline to zero.
    fn on_tasks_loaded(&mut self, checkpoint: Instant) {
        if self.phase != Phase::Fetching || !self.cycle.outstanding_fetch {
            self.ignored("tasks_loaded_without_fetch");
            return;
        }

        self.cycle.outstanding_fetch = false;
        let now = Instant::now();
        let delay = checkpoint
            .checked_sub(self.cfg.prefetch_window)
            .map(|earliest| earliest.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);

        self.bus.publish(
            Event::now(EventKind::FetchCompleted)
                .with_partition(self.partition.as_str())
                .with_delay(delay),
        );
        self.arm_poll_timer(delay);
    }

    /// Starts the next cycle when a current-generation timer fires; stale
    /// generations are dropped.
    async fn on_poll_elapsed(&mut self, generation: u64) {
        if generation != self.timer_gen {
            return;
        }
        match self.phase {
            Phase::Throttled => self.start_cycle().await,
            Phase::Fetching if !self.cycle.outstanding_fetch => self.start_cycle().await,
            _ => {}
        }
    }

    /// Arms a one-shot pacing timer.
    ///
    /// Advancing the generation here is what invalidates any earlier timer;
    /// nothing else ever touches the counter, so unrelated traffic can
    /// neither reset nor cancel an armed timer.
    fn arm_poll_timer(&mut self, delay: Duration) {
        self.timer_gen = self.timer_gen.wrapping_add(1);
        let generation = self.timer_gen;
        let tx = self.tx.clone();

        tokio::spawn(async move {
            if delay > Duration::ZERO {
                time::sleep(delay).await;
            }
            let _ = tx.send(PacerEvent::PollElapsed { generation }).await;
        });
    }

    fn ignored(&self, reason: &'static str) {
        self.bus.publish(
            Event::now(EventKind::ReplyIgnored)
                .with_partition(self.partition.as_str())
                .with_reason(reason),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::error::SubmitError;
    use crate::peers::{CountProvider, TaskStore};

    /// Records when count requests arrive; never replies on its own, so
    /// tests control reply order, timing, and duplication exactly.
    struct RecordingProvider {
        id: ProviderId,
        requests: Mutex<Vec<Instant>>,
    }

    impl RecordingProvider {
        fn named(name: impl Into<Arc<str>>) -> Arc<Self> {
            Arc::new(Self {
                id: ProviderId::new(name),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CountProvider for RecordingProvider {
        fn id(&self) -> ProviderId {
            self.id.clone()
        }

        async fn request_in_progress_count(&self) {
            self.requests.lock().unwrap().push(Instant::now());
        }
    }

    /// Records load requests; tests deliver the checkpoint themselves.
    #[derive(Default)]
    struct RecordingStore {
        loads: Mutex<Vec<(Instant, Instant, u32)>>,
    }

    impl RecordingStore {
        fn load_count(&self) -> usize {
            self.loads.lock().unwrap().len()
        }

        fn last_load(&self) -> (Instant, Instant, u32) {
            *self.loads.lock().unwrap().last().expect("no load recorded")
        }
    }

    #[async_trait]
    impl TaskStore for RecordingStore {
        async fn load_tasks(&self, _partition: &PartitionId, upper_bound: Instant, batch_size: u32) {
            self.loads
                .lock()
                .unwrap()
                .push((Instant::now(), upper_bound, batch_size));
        }
    }

    fn reference_config() -> PacerConfig {
        PacerConfig {
            max_in_flight_tasks: 10,
            task_fetch_batch_size: 3,
            min_tick_delay: Duration::from_millis(200),
            max_look_ahead: Duration::from_secs(1),
            prefetch_window: Duration::from_secs(5),
            mailbox_capacity: 64,
        }
    }

    struct Rig {
        handle: PacerHandle,
        token: CancellationToken,
        join: JoinHandle<()>,
        providers: Vec<Arc<RecordingProvider>>,
        store: Arc<RecordingStore>,
    }

    /// Lets the actor and any fired timer tasks drain without advancing the
    /// paused clock.
    async fn settle() {
        for _ in 0..64 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance(d: Duration) {
        time::advance(d).await;
        settle().await;
    }

    /// Spawns an initialized pacer with `n` recording providers.
    async fn rig(cfg: PacerConfig, n: usize) -> Rig {
        let pacer =
            Pacer::new(PartitionId::new("p0"), cfg, Bus::new(64)).expect("valid config");
        let handle = pacer.handle();
        let token = CancellationToken::new();
        let join = pacer.spawn(token.clone());

        let providers: Vec<Arc<RecordingProvider>> = (0..n)
            .map(|i| RecordingProvider::named(format!("prov-{i}")))
            .collect();
        let store = Arc::new(RecordingStore::default());

        let as_refs: Vec<ProviderRef> = providers
            .iter()
            .map(|p| p.clone() as ProviderRef)
            .collect();
        handle
            .initialize(store.clone() as StoreRef, as_refs)
            .await
            .expect("initialize");
        settle().await;

        Rig {
            handle,
            token,
            join,
            providers,
            store,
        }
    }

    async fn reply(rig: &Rig, provider: usize, count: u64) {
        rig.handle
            .count_fetched(rig.providers[provider].id(), count)
            .await
            .expect("count reply");
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn admission_uses_sum_of_all_counts_regardless_of_order() {
        let rig = rig(reference_config(), 3).await;
        for p in &rig.providers {
            assert_eq!(p.request_count(), 1, "every provider polled once");
        }

        // Replies arrive out of request order; 4 + 3 + 2 = 9 < 10.
        reply(&rig, 2, 4).await;
        assert_eq!(rig.store.load_count(), 0, "round not complete yet");
        reply(&rig, 0, 3).await;
        reply(&rig, 1, 2).await;

        assert_eq!(rig.store.load_count(), 1, "sum below ceiling admits a fetch");
        let (_, _, batch) = rig.store.last_load();
        assert_eq!(batch, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_reply_neither_counts_nor_completes_the_round() {
        let mut cfg = reference_config();
        cfg.max_in_flight_tasks = 3;
        let rig = rig(cfg, 2).await;

        // 2 + 2 would reach the ceiling if the duplicate were counted.
        reply(&rig, 0, 2).await;
        reply(&rig, 0, 2).await;

        assert_eq!(rig.store.load_count(), 0, "no early admission decision");
        assert_eq!(
            rig.providers[0].request_count(),
            1,
            "no second round triggered by the duplicate"
        );

        // The genuine second reply decides with 2 + 0 = 2 < 3.
        reply(&rig, 1, 0).await;
        assert_eq!(rig.store.load_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_holds_for_min_tick_delay_and_issues_no_load() {
        let mut cfg = reference_config();
        cfg.max_in_flight_tasks = 5;
        let rig = rig(cfg, 1).await;

        reply(&rig, 0, 5).await;
        assert_eq!(rig.store.load_count(), 0, "at capacity: no load issued");
        assert_eq!(rig.providers[0].request_count(), 1);

        advance(Duration::from_millis(199)).await;
        assert_eq!(
            rig.providers[0].request_count(),
            1,
            "re-poll must not start before min_tick_delay"
        );

        advance(Duration::from_millis(1)).await;
        assert_eq!(rig.providers[0].request_count(), 2, "re-poll after backoff");
        assert_eq!(rig.store.load_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn at_most_one_outstanding_fetch_and_no_counts_meanwhile() {
        let rig = rig(reference_config(), 1).await;
        reply(&rig, 0, 0).await;
        assert_eq!(rig.store.load_count(), 1);

        // While the fetch is outstanding: counts, a matching-generation
        // tick, and time passing must not start anything.
        reply(&rig, 0, 7).await;
        rig.handle
            .submit(PacerEvent::PollElapsed { generation: 0 })
            .await
            .unwrap();
        advance(Duration::from_secs(30)).await;

        assert_eq!(rig.store.load_count(), 1, "no second load while outstanding");
        assert_eq!(
            rig.providers[0].request_count(),
            1,
            "no count requests while a fetch is outstanding"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn load_upper_bound_is_now_plus_max_look_ahead() {
        let rig = rig(reference_config(), 1).await;

        let issue_time = Instant::now();
        reply(&rig, 0, 0).await;

        let (issued_at, upper_bound, batch) = rig.store.last_load();
        assert_eq!(issued_at, issue_time, "paused clock: no jitter");
        assert_eq!(upper_bound, issue_time + Duration::from_secs(1));
        assert_eq!(batch, 3);
    }

    /// The reference scenario: counts 1 + 1 admit a fetch, the store
    /// reports `checkpoint = upper_bound + 5s`, and with a 5s prefetch
    /// window the next round starts exactly 1s after issuance.
    #[tokio::test(start_paused = true)]
    async fn prefetch_window_paces_the_next_round() {
        let rig = rig(reference_config(), 2).await;

        reply(&rig, 0, 1).await;
        reply(&rig, 1, 1).await;
        assert_eq!(rig.store.load_count(), 1);
        let (_, upper_bound, _) = rig.store.last_load();

        rig.handle
            .tasks_loaded(upper_bound + Duration::from_secs(5))
            .await
            .unwrap();
        settle().await;

        advance(Duration::from_millis(999)).await;
        for p in &rig.providers {
            assert_eq!(
                p.request_count(),
                1,
                "next round must not start before checkpoint - prefetch_window"
            );
        }

        advance(Duration::from_millis(1)).await;
        for p in &rig.providers {
            assert_eq!(p.request_count(), 2, "next round starts on schedule");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn past_checkpoint_clamps_delay_to_zero() {
        let mut cfg = reference_config();
        cfg.prefetch_window = Duration::from_secs(5);
        let rig = rig(cfg, 1).await;

        reply(&rig, 0, 0).await;
        // checkpoint - prefetch_window is far in the past.
        rig.handle.tasks_loaded(Instant::now()).await.unwrap();
        settle().await;

        assert_eq!(
            rig.providers[0].request_count(),
            2,
            "zero delay: next round starts immediately"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn armed_timer_survives_unrelated_traffic() {
        let mut cfg = reference_config();
        cfg.max_in_flight_tasks = 1;
        let rig = rig(cfg, 1).await;

        reply(&rig, 0, 9).await; // throttled, 200ms timer armed

        advance(Duration::from_millis(100)).await;
        // Unrelated and mis-phased traffic mid-wait.
        rig.handle.tasks_loaded(Instant::now()).await.unwrap();
        rig.handle
            .count_fetched(rig.providers[0].id(), 3)
            .await
            .unwrap();
        rig.handle
            .submit(PacerEvent::PollElapsed { generation: 999 })
            .await
            .unwrap();
        settle().await;
        assert_eq!(rig.providers[0].request_count(), 1, "nothing fired early");

        // The timer fires at its original deadline, neither reset nor
        // cancelled by the traffic above.
        advance(Duration::from_millis(99)).await;
        assert_eq!(rig.providers[0].request_count(), 1);
        advance(Duration::from_millis(1)).await;
        assert_eq!(rig.providers[0].request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_poll_tick_is_ignored() {
        let mut cfg = reference_config();
        cfg.max_in_flight_tasks = 1;
        let rig = rig(cfg, 1).await;

        reply(&rig, 0, 1).await; // throttled, generation advanced to 1

        rig.handle
            .submit(PacerEvent::PollElapsed { generation: 0 })
            .await
            .unwrap();
        settle().await;
        assert_eq!(
            rig.providers[0].request_count(),
            1,
            "stale generation must not start a round early"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_initialize_is_ignored() {
        let rig = rig(reference_config(), 1).await;

        let late_provider = RecordingProvider::named("late");
        let late_store = Arc::new(RecordingStore::default());
        rig.handle
            .initialize(
                late_store.clone() as StoreRef,
                vec![late_provider.clone() as ProviderRef],
            )
            .await
            .unwrap();
        settle().await;

        assert_eq!(late_provider.request_count(), 0, "new set not adopted");

        // The original wiring keeps pacing.
        reply(&rig, 0, 0).await;
        assert_eq!(rig.store.load_count(), 1);
        assert_eq!(late_store.load_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn traffic_before_initialize_is_inert() {
        let bus = Bus::new(64);
        let pacer =
            Pacer::new(PartitionId::new("p0"), reference_config(), bus.clone()).unwrap();
        let handle = pacer.handle();
        let token = CancellationToken::new();
        let _join = pacer.spawn(token.clone());

        handle
            .count_fetched(ProviderId::new("ghost"), 5)
            .await
            .unwrap();
        handle.tasks_loaded(Instant::now()).await.unwrap();
        handle
            .submit(PacerEvent::PollElapsed { generation: 0 })
            .await
            .unwrap();
        settle().await;

        // Activation still works from a clean slate.
        let provider = RecordingProvider::named("prov-0");
        let store = Arc::new(RecordingStore::default());
        handle
            .initialize(store.clone() as StoreRef, vec![provider.clone() as ProviderRef])
            .await
            .unwrap();
        settle().await;

        assert_eq!(provider.request_count(), 1);
        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn second_checkpoint_without_outstanding_fetch_is_ignored() {
        let rig = rig(reference_config(), 1).await;

        reply(&rig, 0, 0).await;
        let (_, upper_bound, _) = rig.store.last_load();
        rig.handle.tasks_loaded(upper_bound).await.unwrap();
        settle().await;

        // A late duplicate completion must not re-arm the pacing timer.
        let before = rig.providers[0].request_count();
        rig.handle
            .tasks_loaded(upper_bound + Duration::from_secs(60))
            .await
            .unwrap();
        settle().await;
        assert_eq!(rig.providers[0].request_count(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_events_are_published() {
        let cfg = reference_config();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();

        let pacer = Pacer::new(PartitionId::new("p0"), cfg, bus.clone()).unwrap();
        let handle = pacer.handle();
        let token = CancellationToken::new();
        let _join = pacer.spawn(token.clone());

        let provider = RecordingProvider::named("prov-0");
        let store = Arc::new(RecordingStore::default());
        handle
            .initialize(store.clone() as StoreRef, vec![provider.clone() as ProviderRef])
            .await
            .unwrap();
        settle().await;
        handle.count_fetched(provider.id(), 2).await.unwrap();
        settle().await;
        let (_, upper_bound, _) = store.last_load();
        // Checkpoint far enough out that the next round stays timer-gated.
        handle
            .tasks_loaded(upper_bound + Duration::from_secs(5))
            .await
            .unwrap();
        settle().await;

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::Initialized,
                EventKind::CycleStarted,
                EventKind::FetchIssued,
                EventKind::FetchCompleted,
            ]
        );
        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_loop() {
        let rig = rig(reference_config(), 1).await;

        rig.token.cancel();
        rig.join.await.expect("actor exits cleanly");

        let err = rig
            .handle
            .submit(PacerEvent::PollElapsed { generation: 0 })
            .await
            .unwrap_err();
        assert_eq!(err, SubmitError::Closed);
    }
}
