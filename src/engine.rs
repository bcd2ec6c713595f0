//! Control-surface façade.
//!
//! Every operation returns an [`Outcome`] instead of an error, so callers
//! (the CLI, or an HTTP layer in front of it) get a uniform
//! `{ success, message, data }` shape.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, ErrorKind};
use crate::source::{CacheStats, SearchEntry, SourceDescriptor, SourceResolver, Validation};
use crate::supervisor::{generate_stream_id, ExitOutcome, Launcher, StreamStatus, Supervisor};
use crate::topology::Endpoint;

/// Result of one control operation.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Outcome<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            kind: None,
            data: Some(data),
        }
    }

    /// Success with nothing to return.
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            kind: None,
            data: None,
        }
    }

    pub fn failed(error: &Error) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            kind: Some(error.kind()),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }
}

/// Whether an external tool can be run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
}

/// Liveness summary.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub active_streams: usize,
    pub version: &'static str,
    /// Pipeline engine (`gst-launch-1.0`).
    pub launcher: ToolStatus,
    /// Remote extraction backend (`yt-dlp`).
    pub extractor: ToolStatus,
}

/// Owns the supervisor and answers control requests.
pub struct Engine {
    supervisor: Supervisor,
    config: Config,
}

impl Engine {
    /// Production wiring: yt-dlp resolution and `gst-launch-1.0`.
    pub fn from_config(config: Config) -> Self {
        let resolver = Arc::new(SourceResolver::with_ytdlp(config.youtube.clone()));
        let launcher = config.streaming.launcher.launcher();
        Self::with_parts(config, resolver, launcher)
    }

    /// Wire an engine around a given resolver and launcher.
    pub fn with_parts(config: Config, resolver: Arc<SourceResolver>, launcher: Launcher) -> Self {
        let supervisor = Supervisor::new(resolver, config.topology_builder(), launcher)
            .with_grace_period(config.streaming.launcher.grace_period());
        Self { supervisor, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Start `source` on `endpoints` (all enabled displays when `None`).
    /// A missing id gets a generated one.
    pub async fn start_stream(
        &self,
        id: Option<&str>,
        source: &str,
        endpoints: Option<Vec<Endpoint>>,
    ) -> Outcome<StreamStatus> {
        let id = id.map_or_else(generate_stream_id, ToString::to_string);
        let endpoints = endpoints.unwrap_or_else(|| self.config.enabled_displays());
        match self.supervisor.start(&id, source, &endpoints).await {
            Ok(status) => Outcome::ok(format!("Stream {id} started successfully"), status),
            Err(e) => Outcome::failed(&e),
        }
    }

    pub async fn stop_stream(&self, id: &str) -> Outcome<ExitOutcome> {
        match self.supervisor.stop(id).await {
            Ok(exit) => Outcome::ok(format!("Stream {id} stopped successfully"), exit),
            Err(e) => Outcome::failed(&e),
        }
    }

    pub fn get_status(&self, id: &str) -> Outcome<StreamStatus> {
        match self.supervisor.status(id) {
            Some(status) => Outcome::ok(format!("Stream {id} is {:?}", status.state), status),
            None => Outcome::failed(&Error::StreamNotFound(id.to_string())),
        }
    }

    pub fn list_streams(&self) -> Outcome<Vec<StreamStatus>> {
        let streams = self.supervisor.list_active();
        Outcome::ok(format!("{} active stream(s)", streams.len()), streams)
    }

    /// Resolve a remote URL into fetchable locations plus metadata.
    pub async fn resolve_source(&self, url: &str) -> Outcome<SourceDescriptor> {
        match self.supervisor.resolver().resolve(url).await {
            Ok(descriptor @ SourceDescriptor::Remote { .. }) => {
                let message = match descriptor {
                    SourceDescriptor::Remote { ref metadata, .. } if metadata.is_live => {
                        "Live stream detected - quality may vary".to_string()
                    }
                    _ => format!("Resolved {descriptor}"),
                };
                Outcome::ok(message, descriptor)
            }
            Ok(SourceDescriptor::Local { .. }) => {
                Outcome::failed(&Error::MalformedReference(url.to_string()))
            }
            Err(e) => Outcome::failed(&e),
        }
    }

    pub async fn validate_source(&self, url: &str) -> Outcome<Validation> {
        let report = self.supervisor.resolver().validate(url).await;
        if report.valid {
            Outcome::ok("URL is valid", report)
        } else {
            let message = report.error.clone().unwrap_or_default();
            Outcome {
                success: false,
                message,
                kind: Some(ErrorKind::Validation),
                data: Some(report),
            }
        }
    }

    /// Search the remote platform. Failures still carry an empty result list.
    pub async fn search_sources(&self, query: &str, limit: usize) -> Outcome<Vec<SearchEntry>> {
        match self.supervisor.resolver().search(query, limit).await {
            Ok(results) => Outcome::ok(format!("{} result(s)", results.len()), results),
            Err(e) => {
                warn!("Search for '{query}' failed: {e}");
                Outcome::failed(&e).with_data(Vec::new())
            }
        }
    }

    pub fn clear_cache(&self) -> Outcome<()> {
        self.supervisor.resolver().clear_cache();
        Outcome::done("Cache cleared")
    }

    pub fn cache_stats(&self) -> Outcome<CacheStats> {
        Outcome::ok("Cache statistics", self.supervisor.resolver().cache_stats())
    }

    /// Liveness plus whether the external tools run.
    pub async fn health(&self) -> Health {
        let launcher = self.supervisor.launcher();
        let resolver = self.supervisor.resolver();
        let (launcher_ok, extractor_ok) =
            tokio::join!(launcher.check_available(), resolver.backend_available());
        Health {
            status: if self.supervisor.is_running() {
                "healthy"
            } else {
                "shutting_down"
            },
            active_streams: self.supervisor.active_count(),
            version: crate::VERSION,
            launcher: ToolStatus {
                name: launcher.program().display().to_string(),
                available: launcher_ok,
            },
            extractor: ToolStatus {
                name: resolver.backend_name().to_string(),
                available: extractor_ok,
            },
        }
    }

    /// Configured displays that are enabled.
    pub fn displays(&self) -> Vec<Endpoint> {
        self.config.enabled_displays()
    }

    /// Stop accepting streams and stop everything running.
    pub async fn shutdown(&self) -> usize {
        let stopped = self.supervisor.shutdown().await;
        info!("Engine shut down, {stopped} stream(s) stopped");
        stopped
    }
}
