//! Per-stream monitor task.
//!
//! The monitor owns the child process. It drains stderr into the log,
//! delivers terminate/kill requests, and on exit removes the stream from
//! the registry before publishing the outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::registry::{ExitOutcome, Registry, Signal, StreamState};

/// Upper bound on reading leftover stderr after the child exits.
const TAIL_DRAIN: Duration = Duration::from_secs(1);

pub(crate) struct Monitor {
    pub id: String,
    pub generation: u64,
    pub child: Child,
    pub stderr: ChildStderr,
    pub signals: mpsc::UnboundedReceiver<Signal>,
    pub exit: watch::Sender<Option<ExitOutcome>>,
    pub alive: Arc<AtomicBool>,
    pub registry: Registry,
    pub running: watch::Receiver<bool>,
}

impl Monitor {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let Self {
            id,
            generation,
            mut child,
            stderr,
            mut signals,
            exit,
            alive,
            registry,
            mut running,
        } = self;

        let mut lines = BufReader::new(stderr).lines();
        let mut draining = true;

        let status = loop {
            tokio::select! {
                status = child.wait() => break status,
                Some(signal) = signals.recv() => deliver(&mut child, &id, signal),
                line = lines.next_line(), if draining => match line {
                    Ok(Some(line)) => log_line(&id, &line),
                    Ok(None) => draining = false,
                    Err(e) => {
                        debug!(stream = %id, "stderr read failed: {e}");
                        draining = false;
                    }
                },
                changed = running.changed(), if draining => {
                    if changed.is_err() || !*running.borrow() {
                        debug!(stream = %id, "Shutdown signalled, no longer draining stderr");
                        draining = false;
                    }
                }
            }
        };

        // Reaped: status must stop reporting it as running from here on.
        alive.store(false, Ordering::Release);

        if draining {
            drain_tail(&id, &mut lines).await;
        }

        let outcome = match status {
            Ok(status) => ExitOutcome::from_status(status),
            Err(e) => ExitOutcome::Lost {
                reason: e.to_string(),
            },
        };

        match registry.remove(&id, generation) {
            Some(StreamState::Stopping) => debug!(stream = %id, "Stream {id} exited while stopping"),
            Some(_) => match outcome {
                ExitOutcome::Clean => info!(stream = %id, "Stream {id} ended normally"),
                ExitOutcome::Failed { code: Some(code) } => {
                    error!(stream = %id, "Stream {id} ended with error code {code}");
                }
                ExitOutcome::Failed { code: None } => {
                    error!(stream = %id, "Stream {id} was terminated by a signal");
                }
                ExitOutcome::Lost { ref reason } => {
                    error!(stream = %id, "Stream {id} exit could not be observed: {reason}");
                }
            },
            None => debug!(stream = %id, "Stream {id} already removed ({outcome})"),
        }

        exit.send_replace(Some(outcome));
    }
}

async fn drain_tail(id: &str, lines: &mut Lines<BufReader<ChildStderr>>) {
    let drain = async {
        while let Ok(Some(line)) = lines.next_line().await {
            log_line(id, &line);
        }
    };
    if tokio::time::timeout(TAIL_DRAIN, drain).await.is_err() {
        debug!(stream = %id, "stderr still open after exit, giving up");
    }
}

fn deliver(child: &mut Child, id: &str, signal: Signal) {
    let result = match signal {
        Signal::Terminate => terminate(child),
        Signal::Kill => child.start_kill(),
    };
    if let Err(e) = result {
        warn!(stream = %id, "Failed to send {signal:?}: {e}");
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{kill, Signal as NixSignal};
    use nix::unistd::Pid;

    // Already reaped.
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = i32::try_from(pid).map_err(std::io::Error::other)?;
    kill(Pid::from_raw(pid), NixSignal::SIGTERM).map_err(std::io::Error::from)
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}

/// Severity of one diagnostic line from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineLevel {
    Error,
    Warn,
    Info,
    Other,
}

pub(crate) fn classify_line(line: &str) -> LineLevel {
    if line.contains("ERROR") {
        LineLevel::Error
    } else if line.contains("WARN") {
        LineLevel::Warn
    } else if line.contains("INFO") {
        LineLevel::Info
    } else {
        LineLevel::Other
    }
}

fn log_line(id: &str, line: &str) {
    let line = line.trim_end();
    if line.is_empty() {
        return;
    }
    match classify_line(line) {
        LineLevel::Error => error!(stream = %id, "GStreamer: {line}"),
        LineLevel::Warn => warn!(stream = %id, "GStreamer: {line}"),
        LineLevel::Info => debug!(stream = %id, "GStreamer: {line}"),
        LineLevel::Other => trace!(stream = %id, "GStreamer: {line}"),
    }
}
