//! # Logging subscriber.
//!
//! [`LogWriter`] renders cluster events through `tracing`, leveled the way
//! an operator reads them: lifecycle and queue activity at `info`, reaping
//! at `warn`, faults and rejections at `error`. Where the log lines end up
//! (console, files under the configured log directory) is decided by the
//! embedding program's `tracing` subscriber setup.

use async_trait::async_trait;

use crate::core::humanize_duration;
use crate::events::{Event, EventKind};

use super::Subscribe;

/// Renders cluster events through the `tracing` macros.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::WorkerOnline => {
                tracing::info!(worker = ?e.worker, path = ?e.target, "worker online");
            }
            EventKind::WorkerMessage => {
                tracing::info!(worker = ?e.worker, "worker produced a result");
            }
            EventKind::WorkerFault => {
                tracing::error!(worker = ?e.worker, reason = ?e.reason, "worker fault");
            }
            EventKind::WorkerExited => {
                tracing::info!(
                    worker = ?e.worker,
                    path = ?e.target,
                    code = ?e.exit_code,
                    "worker exited"
                );
            }
            EventKind::WorkerReaped => {
                tracing::warn!(worker = ?e.worker, path = ?e.target, "idle worker recycled");
            }
            EventKind::JobQueued => {
                tracing::info!(path = ?e.target, "no capacity free, job queued");
            }
            EventKind::JobStarved => {
                tracing::warn!(path = ?e.target, "queued job starved, promoted");
            }
            EventKind::JobRevived => {
                tracing::info!(path = ?e.target, "queued job revived");
            }
            EventKind::AdmissionRejected => {
                tracing::error!(path = ?e.target, reason = ?e.reason, "admission rejected");
            }
            EventKind::ClusterClosed => {
                tracing::info!("cluster is ready to exit");
            }
            EventKind::ClusterExit => match e.duration {
                Some(d) => tracing::info!(
                    "thread pool provided service for {}",
                    humanize_duration(d)
                ),
                None => tracing::info!("thread pool exited"),
            },
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
