//! # Inspection sweep.
//!
//! A single periodic sweep over all active worker handles. Each tick,
//! atomically with respect to controller state:
//!
//! 1. every online handle's idle counter increments;
//! 2. any handle whose counter reaches [`IDLE_TICK_LIMIT`] is scheduled for
//!    asynchronous termination (the request does not block the rest of the
//!    sweep);
//! 3. every queued job ages, and jobs crossing the starvation threshold are
//!    promoted.
//!
//! A handle pending termination still counts as active until its exit
//! signal is observed, but it is never re-terminated. The timer that drives
//! the sweep is owned by the control loop; no two sweeps run concurrently.

use std::collections::HashMap;

use super::queue::TaskQueue;
use super::worker::{WorkerHandle, WorkerId};

/// Idle ticks after which a worker is recycled.
pub(crate) const IDLE_TICK_LIMIT: u32 = 4;

/// What one sweep did.
pub(crate) struct SweepReport {
    /// Workers whose termination was requested this tick.
    pub(crate) reaped: Vec<WorkerId>,
    /// Targets of jobs promoted into the starved set this tick.
    pub(crate) promoted: Vec<String>,
}

/// Ages workers and queued jobs by one inspection tick.
pub(crate) fn sweep(
    active: &mut HashMap<WorkerId, WorkerHandle>,
    queue: &mut TaskQueue,
) -> SweepReport {
    let mut reaped = Vec::new();
    for handle in active.values_mut() {
        if !handle.is_online() {
            continue;
        }
        handle.idle_cycles += 1;
        if handle.idle_cycles >= IDLE_TICK_LIMIT {
            handle.terminate();
            reaped.push(handle.id);
        }
    }

    let promoted = queue.age();
    SweepReport { reaped, promoted }
}
