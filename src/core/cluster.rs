//! # Cluster: the admission controller and its control loop.
//!
//! The [`Cluster`] owns the bounded worker pool: it validates requested
//! work, decides immediate dispatch vs. enqueue, owns the active-worker set
//! and both queues, wires worker signals back into queue revival and the
//! fault-isolation policy, and owns cluster-level lifecycle (boot time,
//! duration, shutdown).
//!
//! ## Architecture
//! ```text
//! caller ──► ClusterHandle::setup_worker ──► [submission channel]
//!                                                  │
//!                                                  ▼
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │  control loop (single flow, owns all mutable state)          │
//!   │  - validate target through the memoizing file cache          │
//!   │  - dispatch now (spawn unit) or push to the task queue       │
//!   │  - consume worker signals: online/message/fault/exit         │
//!   │  - inspection tick: age workers, reap stalled ones,          │
//!   │    promote starved jobs                                      │
//!   └───────┬──────────────────────────────────────────┬───────────┘
//!           ▼                                          ▼
//!     Spawn (execution units)                    Bus ──► SubscriberSet
//! ```
//!
//! ## Rules
//! - `setup_worker` never blocks the caller and never returns an error;
//!   validation failures surface as `AdmissionRejected` events.
//! - Every worker exit triggers exactly one queue-revival attempt.
//! - `close()` stops admissions immediately; shutdown completion is
//!   asynchronous and observed by the single `ClusterExit` event.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, mpsc};
use tokio::time::{self, MissedTickBehavior};

use crate::config::ClusterConfig;
use crate::error::{ClusterError, ThreadFault};
use crate::events::{Bus, Event, EventKind};
use crate::policy::{self, FaultAction};
use crate::probe::{FileCache, FsProbe, Probe};
use crate::spawn::{Signal, SignalSender, Spawn};
use crate::subscribers::{Subscribe, SubscriberSet};

use super::alloc;
use super::queue::{Callback, Job, TaskQueue, noop_callback};
use super::reaper;
use super::worker::{WorkerHandle, WorkerId};

/// Capacity of the worker-signal channel.
const SIGNAL_CAPACITY: usize = 256;

/// Exit code accounted for a unit that failed to start at all.
const EXIT_CODE_SPAWN_FAILED: i32 = -1;

/// Submission sent from a [`ClusterHandle`] to the control loop.
enum Command {
    Setup {
        target: PathBuf,
        callback: Callback,
        args: Vec<String>,
    },
    Close,
}

/// Handle for submitting work to a running cluster.
#[derive(Clone)]
pub struct ClusterHandle {
    tx: mpsc::Sender<Command>,
}

impl ClusterHandle {
    /// Requests a worker for `target`.
    ///
    /// Never blocks and never fails from the caller's perspective: an
    /// unreadable target is reported as an `AdmissionRejected` event, and a
    /// submission after `close()` has no observable effect.
    pub fn setup_worker(
        &self,
        target: impl Into<PathBuf>,
        callback: Option<Callback>,
        args: Vec<String>,
    ) {
        let cmd = Command::Setup {
            target: target.into(),
            callback: callback.unwrap_or_else(noop_callback),
            args,
        };
        if self.tx.try_send(cmd).is_err() {
            tracing::warn!("worker submission dropped: cluster busy or shut down");
        }
    }

    /// Requests shutdown: admissions stop immediately, queues are discarded,
    /// and every active worker is asked to terminate.
    ///
    /// Idempotent-safe. Completion is asynchronous and observed by the
    /// single [`EventKind::ClusterExit`] event.
    pub fn close(&self) {
        if self.tx.try_send(Command::Close).is_err() {
            tracing::debug!("close request dropped: cluster already shut down");
        }
    }
}

/// Builder for a [`Cluster`] with optional collaborators.
pub struct ClusterBuilder {
    cfg: ClusterConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    probe: Arc<dyn Probe>,
}

impl ClusterBuilder {
    /// Creates a builder with the filesystem-backed probe and no
    /// subscribers.
    pub fn new(cfg: ClusterConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            probe: Arc::new(FsProbe),
        }
    }

    /// Sets event subscribers for observability.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the file-existence collaborator.
    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probe = probe;
        self
    }

    /// Builds the cluster (call [`Cluster::run`] to start it).
    pub fn build(self) -> Arc<Cluster> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers));
        let (tx, rx) = mpsc::channel(self.cfg.submit_capacity.max(1));

        Arc::new(Cluster {
            cfg: self.cfg,
            bus,
            subs,
            probe: self.probe,
            tx,
            rx: Mutex::new(Some(rx)),
            boot: OnceLock::new(),
        })
    }
}

/// Process-local worker-pool manager.
///
/// Construct with [`Cluster::builder`], start with [`Cluster::run`], submit
/// through the returned [`ClusterHandle`].
pub struct Cluster {
    cfg: ClusterConfig,
    /// Event bus; subscribe directly or through the subscriber set.
    pub bus: Bus,
    subs: Arc<SubscriberSet>,
    probe: Arc<dyn Probe>,
    tx: mpsc::Sender<Command>,
    rx: Mutex<Option<mpsc::Receiver<Command>>>,
    boot: OnceLock<Instant>,
}

impl Cluster {
    /// Builds a cluster with default collaborators. Shorthand for
    /// `Cluster::builder(cfg).build()`.
    pub fn new(cfg: ClusterConfig) -> Arc<Self> {
        ClusterBuilder::new(cfg).build()
    }

    /// Starts building a cluster from the given configuration.
    pub fn builder(cfg: ClusterConfig) -> ClusterBuilder {
        ClusterBuilder::new(cfg)
    }

    /// Returns a handle for submitting work.
    pub fn handle(&self) -> ClusterHandle {
        ClusterHandle {
            tx: self.tx.clone(),
        }
    }

    /// Starts the control loop (spawned in the background) and boots the
    /// configured named tasks.
    pub fn run(self: &Arc<Self>, spawner: Arc<dyn Spawn>) -> ClusterHandle {
        self.subscriber_listener();
        let me = Arc::clone(self);
        tokio::spawn(async move {
            me.run_inner(spawner).await;
        });
        self.handle()
    }

    /// Humanized elapsed time since boot, or `None` if the cluster never
    /// completed setup.
    pub fn cluster_duration(&self) -> Option<String> {
        self.boot.get().map(|b| humanize_duration(b.elapsed()))
    }

    /// Subscribes to the bus and forwards events to the subscriber set
    /// (fire-and-forget).
    fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            while let Ok(ev) = rx.recv().await {
                set.emit(&ev);
            }
        });
    }

    /// The single control flow. All controller-owned state lives here; no
    /// locking, nothing outside this task touches it.
    async fn run_inner(&self, spawner: Arc<dyn Spawn>) {
        let Some(mut rx) = self.rx.lock().await.take() else {
            tracing::error!("cluster control loop already running");
            return;
        };
        let _ = self.boot.set(Instant::now());

        let (sig_tx, mut sig_rx) = mpsc::channel::<(WorkerId, Signal)>(SIGNAL_CAPACITY);
        let mut state = CoreState::new(&self.cfg, Arc::clone(&self.probe));

        // Named pre-boot tasks enter through the normal admission path.
        for (name, count) in alloc::allocate(&self.cfg.tasks, self.cfg.max_threads_clamped()) {
            let entry = &self.cfg.tasks[&name];
            let origin: Arc<str> = name.as_str().into();
            if entry.watch {
                state.watched.insert(origin.clone(), entry.file.clone());
            }
            for _ in 0..count {
                state.pending.push_back(Job::new(
                    entry.file.clone(),
                    noop_callback(),
                    Vec::new(),
                    Some(origin.clone()),
                ));
            }
        }
        self.drain_pending(&mut state, &spawner, &sig_tx).await;

        let mut ticker = time::interval(self.cfg.inspection_cycle);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(cmd) = rx.recv() => match cmd {
                    Command::Setup { target, callback, args } => {
                        if !state.closed {
                            state.pending.push_back(Job::new(target, callback, args, None));
                        }
                    }
                    Command::Close => self.on_close(&mut state),
                },
                Some((id, sig)) = sig_rx.recv() => {
                    self.on_signal(&mut state, id, sig);
                }
                _ = ticker.tick(), if state.reaper_armed => {
                    self.on_tick(&mut state);
                }
            }

            self.drain_pending(&mut state, &spawner, &sig_tx).await;

            if state.ticker_reset {
                state.ticker_reset = false;
                ticker.reset();
            }

            if state.closed && state.active.is_empty() && state.starting.is_empty() {
                break;
            }
        }

        let duration = self.boot.get().map(|b| b.elapsed()).unwrap_or_default();
        tracing::info!(
            duration = %humanize_duration(duration),
            "thread pool service complete"
        );
        self.bus
            .publish(Event::now(EventKind::ClusterExit).with_duration(duration));
    }

    /// Admits every job deferred by the last handler, in order.
    async fn drain_pending(
        &self,
        state: &mut CoreState,
        spawner: &Arc<dyn Spawn>,
        sig_tx: &SignalSender,
    ) {
        while let Some(job) = state.pending.pop_front() {
            if state.closed {
                return;
            }
            self.admit(state, job, spawner, sig_tx).await;
        }
    }

    /// Validates a job and either dispatches it now or defers it.
    async fn admit(
        &self,
        state: &mut CoreState,
        job: Job,
        spawner: &Arc<dyn Spawn>,
        sig_tx: &SignalSender,
    ) {
        if !state.cache.accessible(&job.target) {
            let err = ClusterError::unreadable(&job.target);
            tracing::error!(path = %job.target.display(), "{err}");
            self.bus.publish(
                Event::now(EventKind::AdmissionRejected)
                    .with_target(job.target.display().to_string())
                    .with_reason(err.as_message()),
            );
            return;
        }

        if state.in_flight() < self.cfg.max_threads_clamped() {
            self.dispatch(state, job, spawner, sig_tx).await;
        } else {
            self.bus.publish(
                Event::now(EventKind::JobQueued).with_target(job.target.display().to_string()),
            );
            state.queue.push(job);
        }
    }

    /// Spawns an execution unit for the job and registers its handle.
    async fn dispatch(
        &self,
        state: &mut CoreState,
        job: Job,
        spawner: &Arc<dyn Spawn>,
        sig_tx: &SignalSender,
    ) {
        let id = state.next_worker_id();
        let spawned = spawner.spawn(id, &job.target, &job.args, sig_tx.clone()).await;
        match spawned {
            Ok(unit) => {
                let handle = WorkerHandle::new(id, job.target, job.callback, job.origin, unit);
                state.starting.insert(id, handle);
            }
            Err(err) => {
                // A unit that never starts is accounted like an instant
                // exit: report the fault, then free the slot with the one
                // revival attempt its exit would have triggered.
                let fault = ThreadFault::new(err.to_string());
                self.apply_fault(Some(id), Some(&job.callback), &fault);
                self.bus.publish(
                    Event::now(EventKind::WorkerExited)
                        .with_worker(id)
                        .with_target(job.target.display().to_string())
                        .with_exit_code(EXIT_CODE_SPAWN_FAILED),
                );
                self.revive_one(state);
            }
        }
    }

    /// Consumes one worker signal. Per worker, signals arrive in the order
    /// online, then faults/messages interleaved, then exactly one exit.
    fn on_signal(&self, state: &mut CoreState, id: WorkerId, sig: Signal) {
        match sig {
            Signal::Online => {
                if let Some(mut handle) = state.starting.remove(&id) {
                    handle.mark_online();
                    self.bus.publish(
                        Event::now(EventKind::WorkerOnline)
                            .with_worker(id)
                            .with_target(handle.target.display().to_string()),
                    );
                    state.active.insert(id, handle);
                    if !state.reaper_armed {
                        state.reaper_armed = true;
                        state.ticker_reset = true;
                    }
                }
            }
            Signal::Message(payload) => {
                if let Some(handle) = state.active.get_mut(&id) {
                    // A progressing worker is not idle.
                    handle.idle_cycles = 0;
                    (handle.callback)(None, Some(payload.as_str()));
                    self.bus
                        .publish(Event::now(EventKind::WorkerMessage).with_worker(id));
                }
            }
            Signal::Fault(fault) => {
                let callback = state
                    .active
                    .get(&id)
                    .or_else(|| state.starting.get(&id))
                    .map(|h| h.callback.clone());
                self.apply_fault(Some(id), callback.as_ref(), &fault);
            }
            Signal::Exit(code) => self.on_exit(state, id, code),
        }
    }

    /// Applies the environment-gated fault policy.
    fn apply_fault(&self, id: Option<WorkerId>, callback: Option<&Callback>, fault: &ThreadFault) {
        let mut ev = Event::now(EventKind::WorkerFault).with_reason(fault.message.clone());
        if let Some(id) = id {
            ev = ev.with_worker(id);
        }

        let err = ClusterError::Thread {
            fault: fault.clone(),
        };
        match policy::on_worker_fault(&self.cfg.environment) {
            FaultAction::Isolate => {
                tracing::error!("{err}; fault isolated, pool unaffected");
                if let Some(cb) = callback {
                    cb(Some(fault), None);
                }
                self.bus.publish(ev);
            }
            FaultAction::Fatal => {
                self.bus.publish(ev);
                tracing::error!("{err}; fatal outside production");
                std::process::exit(1);
            }
        }
    }

    /// Removes the exited worker and attempts exactly one queue revival.
    fn on_exit(&self, state: &mut CoreState, id: WorkerId, code: i32) {
        let handle = state
            .active
            .remove(&id)
            .or_else(|| state.starting.remove(&id));
        let Some(mut handle) = handle else { return };
        handle.mark_exited();

        self.bus.publish(
            Event::now(EventKind::WorkerExited)
                .with_worker(id)
                .with_target(handle.target.display().to_string())
                .with_exit_code(code),
        );

        if state.closed {
            return;
        }

        self.revive_one(state);

        // Keep-alive: a watched named task gets a fresh admission for the
        // worker it just lost. This is in addition to the revival above.
        if let Some(origin) = handle.origin {
            if let Some(file) = state.watched.get(&origin) {
                state.pending.push_back(Job::new(
                    file.clone(),
                    noop_callback(),
                    Vec::new(),
                    Some(origin.clone()),
                ));
            }
        }
    }

    /// Moves at most one deferred job toward dispatch: starved set first,
    /// then the front of the primary queue.
    fn revive_one(&self, state: &mut CoreState) {
        if let Some(job) = state.queue.revive() {
            self.bus.publish(
                Event::now(EventKind::JobRevived).with_target(job.target.display().to_string()),
            );
            state.pending.push_back(job);
        }
    }

    /// One inspection sweep: age workers and queued jobs, reap the stalled.
    fn on_tick(&self, state: &mut CoreState) {
        let report = reaper::sweep(&mut state.active, &mut state.queue);

        for id in report.reaped {
            if let Some(handle) = state.active.get(&id) {
                tracing::warn!(
                    worker = %id,
                    path = %handle.target.display(),
                    "idle worker recycled"
                );
                self.bus.publish(
                    Event::now(EventKind::WorkerReaped)
                        .with_worker(id)
                        .with_target(handle.target.display().to_string()),
                );
            }
        }
        for target in report.promoted {
            self.bus
                .publish(Event::now(EventKind::JobStarved).with_target(target));
        }

        if state.active.is_empty() {
            state.reaper_armed = false;
        }
    }

    /// Handles the one-shot close request.
    fn on_close(&self, state: &mut CoreState) {
        if state.closed {
            return;
        }
        state.closed = true;
        state.pending.clear();
        state.queue.discard();

        tracing::info!("cluster is ready to exit");
        self.bus.publish(Event::now(EventKind::ClusterClosed));

        for handle in state.active.values_mut() {
            handle.terminate();
        }
        for handle in state.starting.values_mut() {
            handle.terminate();
        }
    }
}

/// State owned by the control loop. Nothing outside it may touch this.
struct CoreState {
    active: HashMap<WorkerId, WorkerHandle>,
    starting: HashMap<WorkerId, WorkerHandle>,
    queue: TaskQueue,
    /// Jobs deferred by the current handler, admitted before the next
    /// suspension point.
    pending: VecDeque<Job>,
    cache: FileCache,
    /// Watched named tasks: origin name to executable target.
    watched: HashMap<Arc<str>, PathBuf>,
    reaper_armed: bool,
    ticker_reset: bool,
    closed: bool,
    next_id: u64,
}

impl CoreState {
    fn new(cfg: &ClusterConfig, probe: Arc<dyn Probe>) -> Self {
        Self {
            active: HashMap::new(),
            starting: HashMap::new(),
            queue: TaskQueue::new(cfg.starvation_threshold),
            pending: VecDeque::new(),
            cache: FileCache::new(probe),
            watched: HashMap::new(),
            reaper_armed: false,
            ticker_reset: false,
            closed: false,
            next_id: 0,
        }
    }

    /// Workers occupying capacity: active plus not-yet-online.
    fn in_flight(&self) -> usize {
        self.active.len() + self.starting.len()
    }

    fn next_worker_id(&mut self) -> WorkerId {
        self.next_id += 1;
        WorkerId(self.next_id)
    }
}

/// Formats a duration the way a human reads uptime: `"2h 3m 12s"`,
/// `"45s"`, `"850ms"`.
pub(crate) fn humanize_duration(d: Duration) -> String {
    let total = d.as_secs();
    if total == 0 {
        return format!("{}ms", d.subsec_millis());
    }
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, TaskEntry};
    use crate::error::SpawnError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::broadcast;
    use tokio::time::{sleep, timeout};
    use tokio_util::sync::CancellationToken;

    /// Probe that accepts every path.
    struct YesProbe;

    impl Probe for YesProbe {
        fn accessible(&self, _path: &Path) -> bool {
            true
        }
    }

    /// Probe that rejects every path.
    struct NoProbe;

    impl Probe for NoProbe {
        fn accessible(&self, _path: &Path) -> bool {
            false
        }
    }

    /// Probe counting how often it is consulted.
    struct CountingProbe {
        calls: AtomicUsize,
    }

    impl CountingProbe {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Probe for CountingProbe {
        fn accessible(&self, _path: &Path) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    /// Scripted execution units: records spawns and lets tests inject
    /// signals for any worker.
    struct MockSpawner {
        auto_online: bool,
        inner: StdMutex<MockState>,
    }

    #[derive(Default)]
    struct MockState {
        spawned: Vec<(WorkerId, PathBuf, SignalSender)>,
    }

    impl MockSpawner {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                auto_online: true,
                inner: StdMutex::new(MockState::default()),
            })
        }

        fn spawn_count(&self) -> usize {
            self.inner.lock().unwrap().spawned.len()
        }

        fn target_of(&self, idx: usize) -> PathBuf {
            self.inner.lock().unwrap().spawned[idx].1.clone()
        }

        fn worker(&self, idx: usize) -> (WorkerId, SignalSender) {
            let inner = self.inner.lock().unwrap();
            let (id, _, tx) = &inner.spawned[idx];
            (*id, tx.clone())
        }

        async fn send(&self, idx: usize, sig: Signal) {
            let (id, tx) = self.worker(idx);
            tx.send((id, sig)).await.unwrap();
        }
    }

    #[async_trait]
    impl Spawn for MockSpawner {
        async fn spawn(
            &self,
            id: WorkerId,
            target: &Path,
            _args: &[String],
            signals: SignalSender,
        ) -> Result<CancellationToken, SpawnError> {
            let token = CancellationToken::new();
            {
                let mut inner = self.inner.lock().unwrap();
                inner.spawned.push((id, target.to_path_buf(), signals.clone()));
            }
            if self.auto_online {
                let _ = signals.send((id, Signal::Online)).await;
            }
            // Termination requests complete as a clean exit.
            let unit = token.clone();
            tokio::spawn(async move {
                unit.cancelled().await;
                let _ = signals.send((id, Signal::Exit(0))).await;
            });
            Ok(token)
        }
    }

    fn test_config(max_threads: usize) -> ClusterConfig {
        let mut cfg = ClusterConfig::default();
        cfg.max_threads = max_threads;
        // Long cycle: reaping stays out of the way unless a test wants it.
        cfg.inspection_cycle = Duration::from_secs(60);
        cfg.starvation_threshold = 2;
        cfg.environment = Environment::Prod;
        cfg
    }

    fn boot(
        cfg: ClusterConfig,
        probe: Arc<dyn Probe>,
        spawner: Arc<MockSpawner>,
    ) -> (Arc<Cluster>, ClusterHandle, broadcast::Receiver<Event>) {
        let cluster = Cluster::builder(cfg).with_probe(probe).build();
        let rx = cluster.bus.subscribe();
        let handle = cluster.run(spawner);
        (cluster, handle, rx)
    }

    async fn next_event(rx: &mut broadcast::Receiver<Event>) -> Event {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("bus closed")
    }

    async fn wait_for(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
        loop {
            let ev = next_event(rx).await;
            if ev.kind == kind {
                return ev;
            }
        }
    }

    /// Collects everything currently buffered on the receiver.
    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn capacity_bound_holds_and_overflow_queues() {
        let spawner = MockSpawner::new();
        let (_cluster, handle, mut rx) = boot(test_config(2), Arc::new(YesProbe), spawner.clone());

        handle.setup_worker("/t1.sh", None, vec![]);
        handle.setup_worker("/t2.sh", None, vec![]);
        handle.setup_worker("/t3.sh", None, vec![]);

        // The queue notice and the online signals may interleave.
        let mut online = 0;
        let mut queued = None;
        while online < 2 || queued.is_none() {
            let ev = next_event(&mut rx).await;
            match ev.kind {
                EventKind::WorkerOnline => online += 1,
                EventKind::JobQueued => queued = Some(ev),
                _ => {}
            }
        }

        assert_eq!(queued.unwrap().target.as_deref(), Some("/t3.sh"));
        assert_eq!(spawner.spawn_count(), 2);
    }

    #[tokio::test]
    async fn exit_revives_the_queued_job() {
        // Scenario: maxThreads=2, T1..T3 submitted in order.
        let spawner = MockSpawner::new();
        let (_cluster, handle, mut rx) = boot(test_config(2), Arc::new(YesProbe), spawner.clone());

        handle.setup_worker("/t1.sh", None, vec![]);
        handle.setup_worker("/t2.sh", None, vec![]);
        wait_for(&mut rx, EventKind::WorkerOnline).await;
        wait_for(&mut rx, EventKind::WorkerOnline).await;
        handle.setup_worker("/t3.sh", None, vec![]);
        wait_for(&mut rx, EventKind::JobQueued).await;

        // T1's worker exits; T3 must be dispatched next.
        spawner.send(0, Signal::Exit(0)).await;
        let revived = wait_for(&mut rx, EventKind::JobRevived).await;
        assert_eq!(revived.target.as_deref(), Some("/t3.sh"));

        let online = wait_for(&mut rx, EventKind::WorkerOnline).await;
        assert_eq!(online.target.as_deref(), Some("/t3.sh"));
        assert_eq!(spawner.spawn_count(), 3);
        assert_eq!(spawner.target_of(2), PathBuf::from("/t3.sh"));
    }

    #[tokio::test]
    async fn exit_with_empty_queues_spawns_nothing() {
        let spawner = MockSpawner::new();
        let (_cluster, handle, mut rx) = boot(test_config(1), Arc::new(YesProbe), spawner.clone());

        handle.setup_worker("/only.sh", None, vec![]);
        wait_for(&mut rx, EventKind::WorkerOnline).await;

        spawner.send(0, Signal::Exit(0)).await;
        wait_for(&mut rx, EventKind::WorkerExited).await;

        sleep(Duration::from_millis(50)).await;
        let rest = drain(&mut rx);
        assert!(rest.iter().all(|ev| ev.kind != EventKind::JobRevived));
        assert_eq!(spawner.spawn_count(), 1);
    }

    #[tokio::test]
    async fn starved_jobs_dispatch_before_fresh_ones() {
        let spawner = MockSpawner::new();
        let mut cfg = test_config(1);
        cfg.inspection_cycle = Duration::from_millis(25);
        cfg.starvation_threshold = 2;
        let (_cluster, handle, mut rx) = boot(cfg, Arc::new(YesProbe), spawner.clone());

        handle.setup_worker("/busy.sh", None, vec![]);
        wait_for(&mut rx, EventKind::WorkerOnline).await;
        handle.setup_worker("/old.sh", None, vec![]);

        // Two ticks promote /old.sh into the starved set.
        let starved = wait_for(&mut rx, EventKind::JobStarved).await;
        assert_eq!(starved.target.as_deref(), Some("/old.sh"));

        // A fresh arrival after the promotion must not overtake it.
        handle.setup_worker("/new.sh", None, vec![]);
        wait_for(&mut rx, EventKind::JobQueued).await;

        spawner.send(0, Signal::Exit(0)).await;
        let revived = wait_for(&mut rx, EventKind::JobRevived).await;
        assert_eq!(revived.target.as_deref(), Some("/old.sh"));
        assert_eq!(spawner.target_of(1), PathBuf::from("/old.sh"));
    }

    #[tokio::test]
    async fn validation_probes_each_path_at_most_once() {
        let probe = CountingProbe::new();
        let spawner = MockSpawner::new();
        let (_cluster, handle, mut rx) = boot(test_config(1), probe.clone(), spawner.clone());

        handle.setup_worker("/same.sh", None, vec![]);
        wait_for(&mut rx, EventKind::WorkerOnline).await;
        handle.setup_worker("/same.sh", None, vec![]);
        wait_for(&mut rx, EventKind::JobQueued).await;

        // Revival re-enters the admission path; the cache must still answer.
        spawner.send(0, Signal::Exit(0)).await;
        wait_for(&mut rx, EventKind::JobRevived).await;
        wait_for(&mut rx, EventKind::WorkerOnline).await;

        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn idle_worker_is_recycled_once_and_frees_capacity() {
        let spawner = MockSpawner::new();
        let mut cfg = test_config(1);
        cfg.inspection_cycle = Duration::from_millis(25);
        cfg.starvation_threshold = 100; // keep promotion out of this test
        let (_cluster, handle, mut rx) = boot(cfg, Arc::new(YesProbe), spawner.clone());

        handle.setup_worker("/stalled.sh", None, vec![]);
        handle.setup_worker("/waiting.sh", None, vec![]);
        wait_for(&mut rx, EventKind::WorkerOnline).await;

        // Four silent ticks recycle the stalled worker...
        let reaped = wait_for(&mut rx, EventKind::WorkerReaped).await;
        assert_eq!(reaped.target.as_deref(), Some("/stalled.sh"));

        // ...its exit revives the waiting job.
        wait_for(&mut rx, EventKind::WorkerExited).await;
        let revived = wait_for(&mut rx, EventKind::JobRevived).await;
        assert_eq!(revived.target.as_deref(), Some("/waiting.sh"));
        wait_for(&mut rx, EventKind::WorkerOnline).await;

        let rest = drain(&mut rx);
        assert!(rest.iter().all(|ev| {
            ev.kind != EventKind::WorkerReaped || ev.target.as_deref() != Some("/stalled.sh")
        }));
        assert_eq!(spawner.spawn_count(), 2);
    }

    #[tokio::test]
    async fn messages_keep_a_worker_alive() {
        let spawner = MockSpawner::new();
        let mut cfg = test_config(1);
        cfg.inspection_cycle = Duration::from_millis(25);
        let (_cluster, handle, mut rx) = boot(cfg, Arc::new(YesProbe), spawner.clone());

        handle.setup_worker("/chatty.sh", None, vec![]);
        wait_for(&mut rx, EventKind::WorkerOnline).await;

        // Keep producing for well past four cycles.
        for _ in 0..20 {
            spawner.send(0, Signal::Message("tick".to_string())).await;
            sleep(Duration::from_millis(10)).await;
        }
        let seen = drain(&mut rx);
        assert!(
            seen.iter().all(|ev| ev.kind != EventKind::WorkerReaped),
            "a progressing worker must not be recycled"
        );

        // Gone silent: the idle clock runs out.
        wait_for(&mut rx, EventKind::WorkerReaped).await;
    }

    #[tokio::test]
    async fn close_fires_exit_once_and_stops_admissions() {
        let spawner = MockSpawner::new();
        let (cluster, handle, mut rx) = boot(test_config(2), Arc::new(YesProbe), spawner.clone());

        handle.setup_worker("/t1.sh", None, vec![]);
        wait_for(&mut rx, EventKind::WorkerOnline).await;

        handle.close();
        wait_for(&mut rx, EventKind::ClusterClosed).await;
        let exit = wait_for(&mut rx, EventKind::ClusterExit).await;
        assert!(exit.duration.is_some());

        // Admissions after close have no observable effect.
        handle.setup_worker("/late.sh", None, vec![]);
        handle.close();
        sleep(Duration::from_millis(50)).await;
        let rest = drain(&mut rx);
        assert!(rest.iter().all(|ev| {
            ev.kind != EventKind::JobQueued
                && ev.kind != EventKind::WorkerOnline
                && ev.kind != EventKind::ClusterExit
        }));
        assert_eq!(spawner.spawn_count(), 1);
        assert!(cluster.cluster_duration().is_some());
    }

    #[tokio::test]
    async fn prod_fault_is_isolated_and_revival_still_works() {
        // Scenario: environment = "prod"; a worker faults.
        let spawner = MockSpawner::new();
        let (_cluster, handle, mut rx) = boot(test_config(2), Arc::new(YesProbe), spawner.clone());

        let faults: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen = faults.clone();
        let callback: Callback = Arc::new(move |fault, _msg| {
            if let Some(f) = fault {
                seen.lock().unwrap().push(f.message.clone());
            }
        });

        handle.setup_worker("/flaky.sh", Some(callback), vec![]);
        handle.setup_worker("/steady.sh", None, vec![]);
        wait_for(&mut rx, EventKind::WorkerOnline).await;
        wait_for(&mut rx, EventKind::WorkerOnline).await;
        handle.setup_worker("/next.sh", None, vec![]);
        wait_for(&mut rx, EventKind::JobQueued).await;

        spawner.send(0, Signal::Fault(ThreadFault::new("boom"))).await;
        let fault_ev = wait_for(&mut rx, EventKind::WorkerFault).await;
        assert_eq!(fault_ev.reason.as_deref(), Some("boom"));
        assert_eq!(faults.lock().unwrap().as_slice(), ["boom".to_string()]);

        // The other worker is untouched and the pool keeps running.
        sleep(Duration::from_millis(50)).await;
        assert_eq!(spawner.spawn_count(), 2);

        // Revival on the faulty worker's eventual exit proceeds normally.
        spawner.send(0, Signal::Exit(1)).await;
        let revived = wait_for(&mut rx, EventKind::JobRevived).await;
        assert_eq!(revived.target.as_deref(), Some("/next.sh"));
    }

    #[tokio::test]
    async fn unreadable_target_is_rejected_without_side_effects() {
        let spawner = MockSpawner::new();
        let (_cluster, handle, mut rx) = boot(test_config(2), Arc::new(NoProbe), spawner.clone());

        handle.setup_worker("/gone.sh", None, vec![]);
        let rejected = wait_for(&mut rx, EventKind::AdmissionRejected).await;
        assert!(rejected.reason.as_deref().unwrap_or("").contains("/gone.sh"));

        sleep(Duration::from_millis(50)).await;
        let rest = drain(&mut rx);
        assert!(rest.iter().all(|ev| ev.kind != EventKind::JobQueued));
        assert_eq!(spawner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn messages_reach_the_callback() {
        let spawner = MockSpawner::new();
        let (_cluster, handle, mut rx) = boot(test_config(1), Arc::new(YesProbe), spawner.clone());

        let payloads: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen = payloads.clone();
        let callback: Callback = Arc::new(move |_fault, msg| {
            if let Some(m) = msg {
                seen.lock().unwrap().push(m.to_string());
            }
        });

        handle.setup_worker("/producer.sh", Some(callback), vec![]);
        wait_for(&mut rx, EventKind::WorkerOnline).await;

        spawner.send(0, Signal::Message("result-1".to_string())).await;
        wait_for(&mut rx, EventKind::WorkerMessage).await;
        assert_eq!(payloads.lock().unwrap().as_slice(), ["result-1".to_string()]);
    }

    #[tokio::test]
    async fn named_tasks_boot_with_allocated_workers() {
        let spawner = MockSpawner::new();
        let mut cfg = test_config(8);
        cfg.tasks
            .insert("agent".to_string(), TaskEntry::new("/agent.sh", 1));
        cfg.tasks
            .insert("app".to_string(), TaskEntry::new("/app.sh", 3));
        let (_cluster, _handle, mut rx) = boot(cfg, Arc::new(YesProbe), spawner.clone());

        for _ in 0..8 {
            wait_for(&mut rx, EventKind::WorkerOnline).await;
        }
        assert_eq!(spawner.spawn_count(), 8);

        let agents = (0..8)
            .filter(|i| spawner.target_of(*i) == PathBuf::from("/agent.sh"))
            .count();
        assert_eq!(agents, 2, "agent gets floor(1 * 8 / 4) = 2 workers");
    }

    #[tokio::test]
    async fn watched_task_is_readmitted_after_exit() {
        let spawner = MockSpawner::new();
        let mut cfg = test_config(2);
        cfg.tasks
            .insert("svc".to_string(), TaskEntry::new("/svc.sh", 1).watched());
        let (_cluster, _handle, mut rx) = boot(cfg, Arc::new(YesProbe), spawner.clone());

        wait_for(&mut rx, EventKind::WorkerOnline).await;
        wait_for(&mut rx, EventKind::WorkerOnline).await;

        spawner.send(0, Signal::Exit(0)).await;
        wait_for(&mut rx, EventKind::WorkerExited).await;

        // The replacement comes up through the normal admission path.
        let online = wait_for(&mut rx, EventKind::WorkerOnline).await;
        assert_eq!(online.target.as_deref(), Some("/svc.sh"));
        assert_eq!(spawner.spawn_count(), 3);
    }

    #[tokio::test]
    async fn duration_is_unset_until_the_cluster_runs() {
        let cluster = Cluster::builder(test_config(1)).build();
        assert!(cluster.cluster_duration().is_none());

        let _handle = cluster.run(MockSpawner::new());
        sleep(Duration::from_millis(20)).await;
        assert!(cluster.cluster_duration().is_some());
    }
}
