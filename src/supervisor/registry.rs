//! Table of active streams.
//!
//! All reads and writes go through one mutex. The lock is only held for
//! short synchronous sections and never across an `.await`.

use std::collections::HashMap;
use std::fmt;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::error::{Error, Result};
use crate::source::SourceDescriptor;
use crate::topology::Endpoint;

/// Lifecycle position of a registered stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Starting,
    Running,
    Stopping,
}

/// How a supervised process ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "exit", rename_all = "snake_case")]
pub enum ExitOutcome {
    Clean,
    /// Non-zero exit; `code` is `None` when killed by a signal.
    Failed { code: Option<i32> },
    /// Exit status could not be observed.
    Lost { reason: String },
}

impl ExitOutcome {
    pub fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            Self::Clean
        } else {
            Self::Failed {
                code: status.code(),
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => f.write_str("exit code 0"),
            Self::Failed { code: Some(code) } => write!(f, "exit code {code}"),
            Self::Failed { code: None } => f.write_str("terminated by signal"),
            Self::Lost { reason } => write!(f, "exit not observed: {reason}"),
        }
    }
}

/// Requests the monitor task delivers to its child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    Terminate,
    Kill,
}

/// Handle for signalling a supervised process and awaiting its exit.
#[derive(Debug, Clone)]
pub(crate) struct ProcessControl {
    pub pid: Option<u32>,
    signals: mpsc::UnboundedSender<Signal>,
    exit: watch::Receiver<Option<ExitOutcome>>,
    /// Cleared by the monitor as soon as the child has been reaped.
    alive: Arc<AtomicBool>,
}

impl ProcessControl {
    pub fn new(
        pid: Option<u32>,
        signals: mpsc::UnboundedSender<Signal>,
        exit: watch::Receiver<Option<ExitOutcome>>,
        alive: Arc<AtomicBool>,
    ) -> Self {
        Self {
            pid,
            signals,
            exit,
            alive,
        }
    }

    /// Returns `false` once the monitor has gone away.
    pub fn send(&self, signal: Signal) -> bool {
        self.signals.send(signal).is_ok()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Wait until the monitor publishes the exit outcome.
    pub async fn wait(&mut self) -> ExitOutcome {
        match self.exit.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone().unwrap_or(ExitOutcome::Lost {
                reason: "no exit status".to_string(),
            }),
            Err(_) => ExitOutcome::Lost {
                reason: "monitor ended without reporting".to_string(),
            },
        }
    }
}

#[derive(Debug)]
pub(crate) struct StreamRecord {
    id: String,
    generation: u64,
    source: String,
    descriptor: Option<SourceDescriptor>,
    endpoints: Vec<Endpoint>,
    state: StreamState,
    started_at: DateTime<Utc>,
    started: Instant,
    control: Option<ProcessControl>,
}

impl StreamRecord {
    fn status(&self) -> StreamStatus {
        StreamStatus {
            stream_id: self.id.clone(),
            source: self.source.clone(),
            title: match self.descriptor {
                Some(SourceDescriptor::Remote { ref metadata, .. }) => Some(metadata.title.clone()),
                _ => None,
            },
            state: self.state,
            displays: self.endpoints.iter().filter(|e| e.enabled).count(),
            running: self.control.as_ref().is_some_and(ProcessControl::is_alive),
            pid: self.control.as_ref().and_then(|c| c.pid),
            uptime_seconds: self.started.elapsed().as_secs(),
            started_at: self.started_at,
        }
    }
}

/// Point-in-time view of one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    pub stream_id: String,
    /// Reference the stream was started from.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub state: StreamState,
    pub displays: usize,
    pub running: bool,
    pub pid: Option<u32>,
    pub uptime_seconds: u64,
    pub started_at: DateTime<Utc>,
}

/// Shared stream table keyed by stream id.
#[derive(Debug, Clone, Default)]
pub(crate) struct Registry {
    streams: Arc<Mutex<HashMap<String, StreamRecord>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StreamRecord>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `id` in the `Starting` state.
    pub fn reserve(&self, id: &str, generation: u64, source: &str) -> Result<()> {
        let mut streams = self.lock();
        if streams.contains_key(id) {
            return Err(Error::AlreadyActive(id.to_string()));
        }
        streams.insert(
            id.to_string(),
            StreamRecord {
                id: id.to_string(),
                generation,
                source: source.to_string(),
                descriptor: None,
                endpoints: Vec::new(),
                state: StreamState::Starting,
                started_at: Utc::now(),
                started: Instant::now(),
                control: None,
            },
        );
        Ok(())
    }

    /// Move a reserved stream to `Running` once its process is up.
    pub fn activate(
        &self,
        id: &str,
        generation: u64,
        descriptor: SourceDescriptor,
        endpoints: Vec<Endpoint>,
        control: ProcessControl,
    ) -> Option<StreamStatus> {
        let mut streams = self.lock();
        let record = streams
            .get_mut(id)
            .filter(|r| r.generation == generation && r.state == StreamState::Starting)?;
        record.descriptor = Some(descriptor);
        record.endpoints = endpoints;
        record.control = Some(control);
        record.state = StreamState::Running;
        record.started_at = Utc::now();
        record.started = Instant::now();
        Some(record.status())
    }

    /// Mark a stream `Stopping` and hand back what is needed to stop it.
    ///
    /// A stream that is already stopping is returned again so a second
    /// caller can join the same wait.
    pub fn begin_stop(&self, id: &str) -> Result<(u64, ProcessControl)> {
        let mut streams = self.lock();
        let record = streams
            .get_mut(id)
            .ok_or_else(|| Error::StreamNotFound(id.to_string()))?;
        let control = match (record.state, record.control.as_ref()) {
            (StreamState::Starting, _) | (_, None) => return Err(Error::Busy(id.to_string())),
            (_, Some(control)) => control.clone(),
        };
        record.state = StreamState::Stopping;
        Ok((record.generation, control))
    }

    /// Remove `id` if it still belongs to `generation`.
    ///
    /// Returns the state it was removed from, or `None` when another path
    /// already removed it.
    pub fn remove(&self, id: &str, generation: u64) -> Option<StreamState> {
        let mut streams = self.lock();
        if streams.get(id)?.generation != generation {
            return None;
        }
        streams.remove(id).map(|r| r.state)
    }

    pub fn snapshot(&self, id: &str) -> Option<StreamStatus> {
        self.lock().get(id).map(StreamRecord::status)
    }

    /// All streams, oldest first.
    pub fn snapshots(&self) -> Vec<StreamStatus> {
        let mut all: Vec<StreamStatus> = self.lock().values().map(StreamRecord::status).collect();
        all.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.stream_id.cmp(&b.stream_id))
        });
        all
    }

    pub fn ids(&self) -> Vec<String> {
        self.snapshots().into_iter().map(|s| s.stream_id).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
