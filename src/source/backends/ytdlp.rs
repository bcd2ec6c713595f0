//! yt-dlp bridge backend for source extraction
//!
//! Uses a yt-dlp subprocess for:
//! - Metadata and format lists (`--dump-single-json`)
//! - Quality negotiation through a `-f` fallback chain
//! - Flat catalog search (`ytsearchN:`)

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::source::backend::{ExtractedMedia, ExtractionBackend, SearchEntry};
use crate::source::{watch_url, QualitySelector};

/// stderr fragments meaning the video exists but cannot be fetched.
const UNAVAILABLE_MARKERS: &[&str] = &[
    "Private video",
    "Video unavailable",
    "This video is unavailable",
    "members-only",
    "Sign in to confirm",
    "This live event will begin",
];

/// yt-dlp-based extraction backend
pub struct YtDlpBackend {
    /// Path to yt-dlp binary
    ytdlp_path: PathBuf,
    /// Network socket timeout handed to yt-dlp
    socket_timeout: Duration,
    /// Additional yt-dlp arguments
    extra_args: Vec<String>,
}

impl YtDlpBackend {
    /// Create new yt-dlp backend, searching for binary in PATH
    pub fn new() -> Self {
        let ytdlp_path = which::which("yt-dlp").unwrap_or_else(|_| PathBuf::from("yt-dlp"));

        Self {
            ytdlp_path,
            socket_timeout: Duration::from_secs(30),
            extra_args: Vec::new(),
        }
    }

    /// Specify custom yt-dlp binary path
    #[must_use]
    pub fn with_ytdlp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ytdlp_path = path.into();
        self
    }

    #[must_use]
    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    /// Add extra yt-dlp arguments
    #[must_use]
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn ytdlp_path(&self) -> &Path {
        &self.ytdlp_path
    }

    /// Overall deadline for one invocation; generous relative to the socket timeout.
    fn process_deadline(&self) -> Duration {
        self.socket_timeout * 4
    }

    fn base_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["--quiet", "--no-warnings", "--dump-single-json"]
            .iter()
            .map(std::string::ToString::to_string)
            .collect();
        args.push("--socket-timeout".to_string());
        args.push(self.socket_timeout.as_secs().max(1).to_string());
        args
    }

    /// Build yt-dlp arguments for a metadata extraction
    fn build_extract_args(&self, url: &str, selector: &QualitySelector) -> Vec<String> {
        let mut args = self.base_args();
        args.push("--no-playlist".to_string());
        args.push("-f".to_string());
        args.push(selector.to_format_string());
        args.extend(self.extra_args.clone());
        // Terminate option parsing so ids starting with '-' are not read as flags
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    /// Build yt-dlp arguments for a flat search
    fn build_search_args(&self, query: &str, limit: usize) -> Vec<String> {
        let mut args = self.base_args();
        args.push("--flat-playlist".to_string());
        args.extend(self.extra_args.clone());
        args.push("--".to_string());
        args.push(format!("ytsearch{}:{query}", limit.max(1)));
        args
    }

    /// Check if yt-dlp is available
    pub async fn check_available(&self) -> bool {
        Command::new(&self.ytdlp_path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|s| s.success())
    }

    /// Map a failed invocation onto a typed error using its stderr.
    fn classify_failure(stderr: &str, status: std::process::ExitStatus) -> Error {
        let message = stderr
            .lines()
            .find(|line| line.starts_with("ERROR"))
            .or_else(|| stderr.lines().rev().find(|line| !line.trim().is_empty()))
            .map_or_else(
                || format!("yt-dlp exited with status: {status}"),
                |line| line.trim().to_string(),
            );

        if UNAVAILABLE_MARKERS.iter().any(|m| stderr.contains(m)) {
            Error::Unavailable(message)
        } else {
            Error::Extraction(message)
        }
    }

    /// Run yt-dlp and return its stdout.
    async fn run(&self, args: &[String]) -> Result<String> {
        debug!("yt-dlp args: {:?}", args);

        let child = Command::new(&self.ytdlp_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.ytdlp_path.display().to_string(),
                source,
            })?;

        let output = tokio::time::timeout(self.process_deadline(), child.wait_with_output())
            .await
            .map_err(|_| {
                Error::Extraction(format!(
                    "yt-dlp did not finish within {}s",
                    self.process_deadline().as_secs()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp failed: {}", stderr.trim());
            return Err(Self::classify_failure(&stderr, output.status));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| Error::Extraction("yt-dlp output is not valid UTF-8".to_string()))
    }
}

impl Default for YtDlpBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionBackend for YtDlpBackend {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn is_available(&self) -> bool {
        self.check_available().await
    }

    async fn extract(&self, url: &str, selector: &QualitySelector) -> Result<ExtractedMedia> {
        let args = self.build_extract_args(url, selector);
        let stdout = self.run(&args).await?;
        Ok(serde_json::from_str(&stdout)?)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchEntry>> {
        let args = self.build_search_args(query, limit);
        let stdout = self.run(&args).await?;
        let page: SearchPage = serde_json::from_str(&stdout)?;

        Ok(page
            .entries
            .into_iter()
            .filter_map(|entry| {
                let id = entry.id?;
                Some(SearchEntry {
                    url: watch_url(&id),
                    id,
                    title: entry.title,
                    uploader: entry.uploader.or(entry.channel),
                    duration: entry.duration.map(|d| d.max(0.0).round() as u64),
                    view_count: entry.view_count,
                })
            })
            .take(limit)
            .collect())
    }
}

// ============================================================================
// yt-dlp search output
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    entries: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
}
