//! # Worker handle: the controller's view of one execution unit.
//!
//! A [`WorkerHandle`] owns one spawned execution unit bound to a single
//! executable target at construction; it never rebinds. The handle tracks
//! the unit's lifecycle state and an idle-cycle counter aged by the
//! inspection sweep.
//!
//! ## Rules
//! - Owned exclusively by the control loop after creation.
//! - Termination is cooperative and requested at most once; completion is
//!   observed only through the unit's later exit signal.
//! - The idle counter resets on every inbound message: a progressing worker
//!   is not idle.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::queue::Callback;

/// Identifier of one worker within its cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Lifecycle state of a worker handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WorkerState {
    /// Unit requested, online signal not yet observed.
    Starting,
    /// Unit is running; the handle is in the active set.
    Online,
    /// Termination requested; waiting for the exit signal.
    Terminating,
    /// Exit signal observed; the handle is about to be dropped.
    Exited,
}

/// The controller's representation of one isolated execution unit.
pub(crate) struct WorkerHandle {
    pub(crate) id: WorkerId,
    pub(crate) target: PathBuf,
    pub(crate) callback: Callback,
    /// Name of the pre-booted task this worker belongs to, if any.
    pub(crate) origin: Option<Arc<str>>,
    /// Inspection ticks survived without producing a message.
    pub(crate) idle_cycles: u32,
    pub(crate) state: WorkerState,
    unit: CancellationToken,
}

impl WorkerHandle {
    pub(crate) fn new(
        id: WorkerId,
        target: PathBuf,
        callback: Callback,
        origin: Option<Arc<str>>,
        unit: CancellationToken,
    ) -> Self {
        Self {
            id,
            target,
            callback,
            origin,
            idle_cycles: 0,
            state: WorkerState::Starting,
            unit,
        }
    }

    /// The unit reported online; the handle may enter the active set.
    pub(crate) fn mark_online(&mut self) {
        self.state = WorkerState::Online;
    }

    /// The unit's terminal exit signal was observed.
    pub(crate) fn mark_exited(&mut self) {
        self.state = WorkerState::Exited;
    }

    /// True while the unit is running and not yet scheduled for termination.
    pub(crate) fn is_online(&self) -> bool {
        self.state == WorkerState::Online
    }

    /// Requests asynchronous, cooperative termination of the unit.
    ///
    /// Idempotent: only the first call transitions the state and cancels the
    /// unit's token. Completion arrives later as the unit's exit signal.
    pub(crate) fn terminate(&mut self) {
        if matches!(self.state, WorkerState::Starting | WorkerState::Online) {
            self.state = WorkerState::Terminating;
            self.unit.cancel();
        }
    }
}
