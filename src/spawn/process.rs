//! # Process-backed execution units.
//!
//! [`ProcessSpawner`] runs each executable target as a child process:
//! - spawn success emits [`Signal::Online`];
//! - each stdout line emits [`Signal::Message`];
//! - each stderr line emits [`Signal::Fault`];
//! - process exit emits exactly one terminal [`Signal::Exit`].
//!
//! Cancelling the returned token kills the child; the exit signal still
//! flows through the pump, so the controller observes termination the same
//! way it observes a natural exit.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

use crate::core::WorkerId;
use crate::error::{SpawnError, ThreadFault};

use super::{Signal, SignalSender, Spawn};

/// Exit code reported when the unit terminated without one (killed by
/// signal, or the host refused to report a status).
const EXIT_CODE_UNKNOWN: i32 = -1;

/// Spawns each worker as a child process of the current one.
#[derive(Debug, Default)]
pub struct ProcessSpawner;

#[async_trait]
impl Spawn for ProcessSpawner {
    async fn spawn(
        &self,
        id: WorkerId,
        target: &Path,
        args: &[String],
        signals: SignalSender,
    ) -> Result<CancellationToken, SpawnError> {
        let mut child = Command::new(target)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SpawnError::Io {
                target: target.display().to_string(),
                source,
            })?;

        let token = CancellationToken::new();
        let unit_token = token.clone();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        tokio::spawn(async move {
            pump(id, child, stdout, stderr, unit_token, signals).await;
        });

        Ok(token)
    }
}

/// Forwards the child's lifecycle to the signal channel until it exits.
async fn pump(
    id: WorkerId,
    mut child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    unit_token: CancellationToken,
    signals: SignalSender,
) {
    let _ = signals.send((id, Signal::Online)).await;

    let mut out_lines = stdout.map(|s| BufReader::new(s).lines());
    let mut err_lines = stderr.map(|s| BufReader::new(s).lines());
    let mut out_open = out_lines.is_some();
    let mut err_open = err_lines.is_some();
    let mut kill_sent = false;

    let code = loop {
        let mut kill_requested = false;

        tokio::select! {
            _ = unit_token.cancelled(), if !kill_sent => {
                kill_requested = true;
            }
            line = read_line(&mut out_lines), if out_open => match line {
                Some(payload) => {
                    let _ = signals.send((id, Signal::Message(payload))).await;
                }
                None => out_open = false,
            },
            line = read_line(&mut err_lines), if err_open => match line {
                Some(text) => {
                    let _ = signals
                        .send((id, Signal::Fault(ThreadFault::new(text))))
                        .await;
                }
                None => err_open = false,
            },
            status = child.wait() => {
                break status
                    .ok()
                    .and_then(|s| s.code())
                    .unwrap_or(EXIT_CODE_UNKNOWN);
            }
        }

        if kill_requested {
            kill_sent = true;
            let _ = child.start_kill();
        }
    };

    // Flush whatever the unit wrote between the last poll and exit.
    if out_open {
        while let Some(payload) = read_line(&mut out_lines).await {
            let _ = signals.send((id, Signal::Message(payload))).await;
        }
    }
    if err_open {
        while let Some(text) = read_line(&mut err_lines).await {
            let _ = signals
                .send((id, Signal::Fault(ThreadFault::new(text))))
                .await;
        }
    }

    let _ = signals.send((id, Signal::Exit(code))).await;
}

/// Reads one line; `None` marks the stream closed or errored.
async fn read_line<R>(lines: &mut Option<tokio::io::Lines<BufReader<R>>>) -> Option<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    match lines {
        Some(l) => l.next_line().await.ok().flatten(),
        None => None,
    }
}
