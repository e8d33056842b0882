//! # Execution-unit boundary.
//!
//! The mechanism that actually creates and runs an isolated execution unit
//! is a host capability behind the [`Spawn`] trait. Units run independently
//! and in true parallel, share no memory with the controller or each other,
//! and interact with it purely through the [`Signal`] channel.
//!
//! ## Signal contract
//! For any single worker, signals are emitted in the order:
//! [`Signal::Online`], then zero or more of [`Signal::Fault`] /
//! [`Signal::Message`] interleaved in emission order, then exactly one
//! terminal [`Signal::Exit`].
//!
//! Termination is cooperative: the controller cancels the token returned by
//! [`Spawn::spawn`]; completion is observed only through the subsequent
//! [`Signal::Exit`], never synchronously.

mod process;

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::WorkerId;
use crate::error::{SpawnError, ThreadFault};

pub use process::ProcessSpawner;

/// Lifecycle signal from an execution unit, tagged with its worker id on
/// the wire.
#[derive(Debug, Clone)]
pub enum Signal {
    /// The unit has started.
    Online,
    /// The unit raised an internal fault during execution.
    Fault(ThreadFault),
    /// The unit produced a result payload.
    Message(String),
    /// The unit terminated with the given exit code.
    Exit(i32),
}

/// Sender half of the per-cluster signal channel.
pub type SignalSender = mpsc::Sender<(WorkerId, Signal)>;

/// Host capability: create one isolated execution unit bound to one
/// executable target.
///
/// The returned [`CancellationToken`] is the unit's termination handle;
/// cancelling it requests asynchronous termination.
#[async_trait]
pub trait Spawn: Send + Sync + 'static {
    /// Starts a unit for `target` with `args`, delivering its lifecycle
    /// signals tagged with `id` on `signals`.
    async fn spawn(
        &self,
        id: WorkerId,
        target: &Path,
        args: &[String],
        signals: SignalSender,
    ) -> Result<CancellationToken, SpawnError>;
}
