//! Process supervision for running pipelines.
//!
//! Each stream id moves through `Starting → Running → Stopping` and back to
//! absent. [`Supervisor::start`] resolves the source, builds the topology,
//! spawns the pipeline engine and hands the child to a monitor task;
//! [`Supervisor::stop`] asks the monitor to terminate it, escalating to a
//! kill after the grace period.

mod launcher;
mod monitor;
mod registry;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use launcher::Launcher;
pub use registry::{ExitOutcome, StreamState, StreamStatus};

use monitor::Monitor;
use registry::{ProcessControl, Registry, Signal};

use crate::error::{Error, Result};
use crate::source::{SourceDescriptor, SourceResolver};
use crate::topology::{Endpoint, TopologyBuilder, TopologyDescription};

/// Wait for cooperative exit before killing.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Short random stream id.
pub fn generate_stream_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Starts, tracks and stops pipeline processes.
pub struct Supervisor {
    registry: Registry,
    resolver: Arc<SourceResolver>,
    builder: TopologyBuilder,
    launcher: Launcher,
    grace_period: Duration,
    running: watch::Sender<bool>,
    generations: AtomicU64,
}

impl Supervisor {
    pub fn new(resolver: Arc<SourceResolver>, builder: TopologyBuilder, launcher: Launcher) -> Self {
        let (running, _) = watch::channel(true);
        Self {
            registry: Registry::new(),
            resolver,
            builder,
            launcher,
            grace_period: DEFAULT_GRACE_PERIOD,
            running,
            generations: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    /// `false` once [`Supervisor::shutdown`] has begun.
    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Receiver that flips to `false` on shutdown.
    pub fn subscribe_running(&self) -> watch::Receiver<bool> {
        self.running.subscribe()
    }

    /// Resolve a reference and build its topology without launching anything.
    pub async fn prepare(
        &self,
        reference: &str,
        endpoints: &[Endpoint],
    ) -> Result<(SourceDescriptor, TopologyDescription)> {
        // Cheap checks first so a bad display list never costs a remote lookup.
        TopologyBuilder::check_endpoints(endpoints)?;
        let descriptor = self.resolver.resolve(reference).await?;
        let topology = self.builder.build(&descriptor, endpoints)?;
        Ok((descriptor, topology))
    }

    /// Start a stream. Fails without side effects if `id` is already active.
    pub async fn start(
        &self,
        id: &str,
        reference: &str,
        endpoints: &[Endpoint],
    ) -> Result<StreamStatus> {
        if id.trim().is_empty() {
            return Err(Error::EmptyStreamId);
        }
        if !self.is_running() {
            return Err(Error::ShuttingDown);
        }

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        if let Err(e) = self.registry.reserve(id, generation, reference) {
            warn!(stream = %id, "{e}");
            return Err(e);
        }

        match self.launch(id, generation, reference, endpoints).await {
            Ok(status) => Ok(status),
            Err(e) => {
                self.registry.remove(id, generation);
                error!(stream = %id, "Failed to start stream {id}: {e}");
                Err(e)
            }
        }
    }

    async fn launch(
        &self,
        id: &str,
        generation: u64,
        reference: &str,
        endpoints: &[Endpoint],
    ) -> Result<StreamStatus> {
        let (descriptor, topology) = self.prepare(reference, endpoints).await?;
        info!(stream = %id, "Starting stream {id}: {descriptor}");
        debug!(stream = %id, "Pipeline: {}", topology.to_pipeline_string());

        let mut child = self.launcher.spawn(&topology)?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Process("child stderr was not captured".to_string()))?;

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        let alive = Arc::new(AtomicBool::new(true));
        let control = ProcessControl::new(child.id(), signal_tx, exit_rx, alive.clone());
        let enabled: Vec<Endpoint> = endpoints.iter().filter(|e| e.enabled).cloned().collect();

        // Dropping `child` on failure kills it.
        let status = self
            .registry
            .activate(id, generation, descriptor, enabled, control)
            .ok_or_else(|| Error::Process(format!("Stream {id} vanished while starting")))?;

        Monitor {
            id: id.to_string(),
            generation,
            child,
            stderr,
            signals: signal_rx,
            exit: exit_tx,
            alive,
            registry: self.registry.clone(),
            running: self.running.subscribe(),
        }
        .spawn();

        // Shutdown may have begun while this stream was still starting.
        if !self.is_running() {
            if let Err(e) = self.stop(id).await {
                debug!(stream = %id, "Stop after late shutdown: {e}");
            }
            return Err(Error::ShuttingDown);
        }

        info!(stream = %id, "Stream {id} running (pid {:?})", status.pid);
        Ok(status)
    }

    /// Stop a stream: SIGTERM, then kill after the grace period.
    ///
    /// The stream is absent once this returns `Ok`, whichever path was taken.
    pub async fn stop(&self, id: &str) -> Result<ExitOutcome> {
        let (generation, mut control) = match self.registry.begin_stop(id) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(stream = %id, "{e}");
                return Err(e);
            }
        };

        info!(stream = %id, "Stopping stream {id}");
        control.send(Signal::Terminate);

        let outcome = if let Ok(outcome) =
            tokio::time::timeout(self.grace_period, control.wait()).await
        {
            outcome
        } else {
            warn!(stream = %id, "Force killing stream {id}");
            control.send(Signal::Kill);
            control.wait().await
        };

        // The monitor normally got here first; this covers a monitor that died.
        self.registry.remove(id, generation);
        info!(stream = %id, "Stopped stream {id} ({outcome})");
        Ok(outcome)
    }

    pub fn status(&self, id: &str) -> Option<StreamStatus> {
        self.registry.snapshot(id)
    }

    /// Every registered stream, oldest first.
    pub fn list_active(&self) -> Vec<StreamStatus> {
        self.registry.snapshots()
    }

    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    /// Stop every stream in turn. Returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for id in self.registry.ids() {
            match self.stop(&id).await {
                Ok(_) => stopped += 1,
                Err(e) => warn!(stream = %id, "Failed to stop stream {id}: {e}"),
            }
        }
        stopped
    }

    /// Refuse new starts, tell monitors to stop draining, then stop everything.
    pub async fn shutdown(&self) -> usize {
        info!("Shutting down, stopping {} stream(s)", self.active_count());
        self.running.send_replace(false);
        self.stop_all().await
    }
}
