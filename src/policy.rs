//! # Environment-gated worker-fault policy.
//!
//! A worker fault is handled differently depending on where the cluster
//! runs:
//!
//! - **production** — the fault is logged and isolated to the one worker;
//!   the pool keeps running and revival on the worker's eventual exit
//!   proceeds normally.
//! - **anywhere else** — the fault is unrecoverable and terminates the
//!   owning process.
//!
//! The asymmetry is intentional: loud failures outside production, quiet
//! isolation in production.

use crate::config::Environment;

/// What the controller does with a worker fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultAction {
    /// Log the fault; the worker keeps its slot until it exits.
    Isolate,
    /// Terminate the owning process.
    Fatal,
}

/// Decides how a worker fault is handled in the given environment.
pub fn on_worker_fault(env: &Environment) -> FaultAction {
    if env.is_prod() {
        FaultAction::Isolate
    } else {
        FaultAction::Fatal
    }
}
