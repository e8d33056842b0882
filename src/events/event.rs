//! # Runtime events emitted by the cluster control loop.
//!
//! [`EventKind`] classifies events across three groups:
//! - **Worker lifecycle**: online, message, fault, exit, reaped.
//! - **Queue activity**: deferred, starved, revived.
//! - **Cluster level**: admission rejection, close, final exit.
//!
//! The [`Event`] struct carries optional metadata: worker id, target path,
//! reason text, exit code, and the service duration on [`EventKind::ClusterExit`].
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! observed out of order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::WorkerId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of cluster events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Worker lifecycle ===
    /// A worker's execution unit started; the handle entered the active set.
    ///
    /// Sets: `worker`, `target`, `at`, `seq`.
    WorkerOnline,

    /// A worker produced a result payload, forwarded to its callback.
    ///
    /// Sets: `worker`, `at`, `seq`.
    WorkerMessage,

    /// A worker raised an internal fault; handled per environment policy.
    ///
    /// Sets: `worker`, `reason`, `at`, `seq`.
    WorkerFault,

    /// A worker's execution unit terminated; its handle left the active set.
    ///
    /// Sets: `worker`, `exit_code`, `at`, `seq`.
    WorkerExited,

    /// The inspection sweep requested termination of a stalled worker.
    ///
    /// Sets: `worker`, `target`, `at`, `seq`.
    WorkerReaped,

    // === Queue activity ===
    /// No capacity was free; the job was appended to the primary queue.
    ///
    /// Sets: `target`, `at`, `seq`.
    JobQueued,

    /// A queued job crossed the starvation threshold and was promoted.
    ///
    /// Sets: `target`, `at`, `seq`.
    JobStarved,

    /// A worker exit pulled a deferred job out of the queues.
    ///
    /// Sets: `target`, `at`, `seq`.
    JobRevived,

    // === Cluster level ===
    /// An admission was rejected at validation time.
    ///
    /// Sets: `reason`, `target`, `at`, `seq`.
    AdmissionRejected,

    /// `close()` was observed; admissions stopped, queues discarded.
    ///
    /// Sets: `at`, `seq`.
    ClusterClosed,

    /// The active set drained after `close()`; fires exactly once.
    ///
    /// Sets: `duration` (total service time), `at`, `seq`.
    ClusterExit,
}

/// Cluster event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Worker the event concerns, if any.
    pub worker: Option<WorkerId>,
    /// Executable target the event concerns, if any.
    pub target: Option<Arc<str>>,
    /// Human-readable reason (faults, rejections).
    pub reason: Option<Arc<str>>,
    /// Exit code reported by a terminated unit.
    pub exit_code: Option<i32>,
    /// Total service duration (set on [`EventKind::ClusterExit`]).
    pub duration: Option<Duration>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next global sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            target: None,
            reason: None,
            exit_code: None,
            duration: None,
        }
    }

    /// Attaches a worker id.
    #[inline]
    pub fn with_worker(mut self, worker: WorkerId) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Attaches an executable target.
    #[inline]
    pub fn with_target(mut self, target: impl Into<Arc<str>>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a unit exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attaches a service duration.
    #[inline]
    pub fn with_duration(mut self, d: Duration) -> Self {
        self.duration = Some(d);
        self
    }
}
