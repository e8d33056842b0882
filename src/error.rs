//! Error types used by the cluster and its workers.
//!
//! This module defines:
//!
//! - [`ClusterError`] — errors surfaced through the cluster's event stream.
//! - [`ThreadFault`] — a fault reported by a worker during execution.
//! - [`SpawnError`] — failure to create an execution unit.
//!
//! An unreadable executable target never escapes the admission boundary in a
//! raw filesystem form; it always surfaces as [`ClusterError::Parameter`].

use std::path::Path;

use thiserror::Error;

/// A fault raised inside a worker's execution unit.
///
/// Carried by the worker's `Fault` signal and by
/// [`ClusterError::Thread`]. How it is handled depends on the environment
/// mode (see [`on_worker_fault`](crate::on_worker_fault)).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ThreadFault {
    /// Human-readable fault description.
    pub message: String,
}

impl ThreadFault {
    /// Creates a fault from any displayable source.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// # Errors surfaced through the cluster's event stream.
///
/// Neither variant is ever returned from `setup_worker`; both are delivered
/// to subscribers as events, keeping the call boundary exception-free.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ClusterError {
    /// An executable target supplied to `setup_worker` is unreadable.
    /// Non-fatal: that one admission is skipped, the pool is unaffected.
    #[error("parameter error: {message}")]
    Parameter {
        /// Description of the rejected parameter.
        message: String,
    },

    /// A worker signaled an internal fault during execution.
    #[error("thread error: {fault}")]
    Thread {
        /// The underlying worker fault.
        fault: ThreadFault,
    },
}

impl ClusterError {
    /// Builds the parameter error for an unreadable target path.
    ///
    /// This is the only form in which a failed readability probe leaves the
    /// admission boundary.
    pub(crate) fn unreadable(path: &Path) -> Self {
        ClusterError::Parameter {
            message: format!("file {} is not readable", path.display()),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ClusterError::Parameter { .. } => "parameter_error",
            ClusterError::Thread { .. } => "thread_error",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ClusterError::Parameter { message } => message.clone(),
            ClusterError::Thread { fault } => fault.message.clone(),
        }
    }
}

/// Failure to create an isolated execution unit for a worker.
#[derive(Error, Debug)]
pub enum SpawnError {
    /// The host refused to start the unit.
    #[error("failed to spawn {target}: {source}")]
    Io {
        /// Executable target that failed to start.
        target: String,
        /// Underlying host error.
        #[source]
        source: std::io::Error,
    },
}
