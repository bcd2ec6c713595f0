//! Media source references and their resolution.
//!
//! A caller hands the engine an opaque reference. [`classify`] decides
//! whether it names a local file or a remote platform URL; remote URLs go
//! through the [`SourceResolver`], which negotiates quality with an
//! [`ExtractionBackend`] and caches what it learns.

pub mod backend;
pub mod backends;
pub mod cache;
pub mod quality;
pub mod resolver;

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub use backend::{ExtractedMedia, ExtractionBackend, MediaFormat, SearchEntry};
pub use backends::YtDlpBackend;
pub use cache::{CacheStats, MetadataCache};
pub use quality::{QualitySelector, QualityTier};
pub use resolver::{ResolverConfig, SourceResolver, StreamLocations, Validation};

/// Accepted remote URL shapes: watch, short link, embed, direct id.
static REMOTE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^(?:https?://)?(?:www\.|m\.)?youtube\.com/watch\?(?:.*&)?v=[\w-]+",
        r"^(?:https?://)?(?:www\.)?youtu\.be/[\w-]+",
        r"^(?:https?://)?(?:www\.)?youtube\.com/embed/[\w-]+",
        r"^(?:https?://)?(?:www\.)?youtube\.com/v/[\w-]+",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// 11-character video id following a path segment or `v=`.
static VIDEO_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:youtu\.be/|/embed/|/v/)([0-9A-Za-z_-]{11})(?:[^0-9A-Za-z_-]|$)",
        r"[?&]v=([0-9A-Za-z_-]{11})(?:[^0-9A-Za-z_-]|$)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// What kind of thing a media reference names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Local,
    RemotePlatformUrl,
}

/// Classify a media reference. Anything that is not a known remote
/// platform URL shape is treated as a local file.
pub fn classify(reference: &str) -> SourceKind {
    let reference = reference.trim();
    if REMOTE_PATTERNS.iter().any(|re| re.is_match(reference)) {
        SourceKind::RemotePlatformUrl
    } else {
        SourceKind::Local
    }
}

/// Extract the stable video identifier from a remote URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    let url = url.trim();

    // Canonical watch URLs carry the id as a query parameter anywhere in the query.
    let parsed = if url.contains("://") {
        url::Url::parse(url).ok()
    } else {
        url::Url::parse(&format!("https://{url}")).ok()
    };
    if let Some(parsed) = parsed {
        if let Some((_, id)) = parsed.query_pairs().find(|(k, _)| k == "v") {
            if is_video_id(&id) {
                return Some(id.into_owned());
            }
        }
    }

    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Canonical watch URL for a video id.
pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

/// Metadata captured when a remote source was resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub duration_seconds: u64,
    pub uploader: String,
    pub thumbnail_url: Option<String>,
    pub is_live: bool,
    pub original_url: String,
    pub extracted_at: DateTime<Utc>,
}

/// A media source ready for topology building.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceDescriptor {
    Local {
        path: PathBuf,
    },
    Remote {
        video_url: String,
        audio_url: Option<String>,
        metadata: RemoteMetadata,
    },
}

impl SourceDescriptor {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local { path: path.into() }
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { path } => write!(f, "{}", path.display()),
            Self::Remote { metadata, .. } => {
                write!(f, "{} ({})", metadata.title, metadata.original_url)
            }
        }
    }
}
