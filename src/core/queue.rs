//! # Task queue: primary FIFO plus starved set.
//!
//! Jobs that arrive while the pool is at capacity wait here. The queue is
//! split in two:
//!
//! - **primary** — FIFO, insertion order = arrival order of deferred
//!   admissions;
//! - **starved** — jobs that waited past the starvation threshold; all
//!   members are equally overdue, so removal order within the set does not
//!   matter.
//!
//! ## Invariants
//! - A job is in exactly one of {primary, starved, active-as-worker}.
//! - `starvation_ticks` is monotonically non-decreasing while queued; it is
//!   not reset on promotion (membership in the starved set already denotes
//!   "starved").
//! - Revival removes the dequeued job (true FIFO dequeue-from-front for the
//!   primary queue).

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ThreadFault;

/// Result callback attached to an admission: `(fault, payload)`.
///
/// Invoked with a fault when the worker reports one, with a payload for each
/// result the worker produces. Defaults to a no-op when the caller supplies
/// none.
pub type Callback = Arc<dyn Fn(Option<&ThreadFault>, Option<&str>) + Send + Sync + 'static>;

/// The default do-nothing callback.
pub(crate) fn noop_callback() -> Callback {
    Arc::new(|_, _| {})
}

/// A deferred unit of work held while no worker capacity is free.
pub(crate) struct Job {
    pub(crate) target: PathBuf,
    pub(crate) callback: Callback,
    pub(crate) args: Vec<String>,
    /// Name of the pre-booted task this job belongs to, if any.
    pub(crate) origin: Option<Arc<str>>,
    /// Inspection ticks spent waiting in the primary queue.
    pub(crate) starvation_ticks: u32,
}

impl Job {
    pub(crate) fn new(
        target: PathBuf,
        callback: Callback,
        args: Vec<String>,
        origin: Option<Arc<str>>,
    ) -> Self {
        Self {
            target,
            callback,
            args,
            origin,
            starvation_ticks: 0,
        }
    }
}

/// Deferred jobs split into the primary FIFO and the starved set.
pub(crate) struct TaskQueue {
    primary: VecDeque<Job>,
    starved: Vec<Job>,
    threshold: u32,
}

impl TaskQueue {
    pub(crate) fn new(threshold: u32) -> Self {
        Self {
            primary: VecDeque::new(),
            starved: Vec::new(),
            threshold: threshold.max(1),
        }
    }

    /// Appends a job to the back of the primary queue.
    pub(crate) fn push(&mut self, job: Job) {
        self.primary.push_back(job);
    }

    /// Pulls the next job for dispatch: the starved set first (any member,
    /// all are equally overdue), then the front of the primary queue.
    ///
    /// The revived job's starvation state is cleared.
    pub(crate) fn revive(&mut self) -> Option<Job> {
        let mut job = match self.starved.pop() {
            Some(job) => job,
            None => self.primary.pop_front()?,
        };
        job.starvation_ticks = 0;
        Some(job)
    }

    /// Ages every queued job by one inspection tick and promotes those that
    /// crossed the threshold into the starved set.
    ///
    /// Returns the targets of the promoted jobs.
    pub(crate) fn age(&mut self) -> Vec<String> {
        for job in &mut self.starved {
            job.starvation_ticks += 1;
        }

        let mut promoted = Vec::new();
        let mut remaining = VecDeque::with_capacity(self.primary.len());
        for mut job in self.primary.drain(..) {
            job.starvation_ticks += 1;
            if job.starvation_ticks >= self.threshold {
                promoted.push(job.target.display().to_string());
                self.starved.push(job);
            } else {
                remaining.push_back(job);
            }
        }
        self.primary = remaining;
        promoted
    }

    /// Drops every queued job. Used when the cluster closes.
    pub(crate) fn discard(&mut self) {
        self.primary.clear();
        self.starved.clear();
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.starved.is_empty()
    }

    #[cfg(test)]
    fn starved_len(&self) -> usize {
        self.starved.len()
    }
}
