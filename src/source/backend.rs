//! Extraction backend trait for turning platform URLs into media locations.
//!
//! An [`ExtractionBackend`] takes a remote platform URL plus a
//! [`QualitySelector`] and returns the platform's metadata and format list.
//! The production implementation shells out to `yt-dlp`
//! ([`YtDlpBackend`](super::backends::YtDlpBackend)); tests substitute
//! in-process fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::QualitySelector;
use crate::error::Result;

/// Metadata and formats for a single video, as reported by the backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedMedia {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Seconds; the backend reports fractional values for some platforms.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Location of the format chosen by the quality selector.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub is_live: Option<bool>,
    #[serde(default)]
    pub formats: Vec<MediaFormat>,
}

impl ExtractedMedia {
    /// Duration rounded down to whole seconds (0 when unknown).
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn duration_seconds(&self) -> u64 {
        self.duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map_or(0, |d| d as u64)
    }
}

/// One downloadable rendition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaFormat {
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    /// Audio bitrate in kbit/s.
    #[serde(default)]
    pub abr: Option<f64>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

impl MediaFormat {
    /// Anything not explicitly marked `vcodec = none` carries video.
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref() != Some("none")
    }

    /// Anything not explicitly marked `acodec = none` carries audio.
    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref() != Some("none")
    }

    /// Audio present and video explicitly absent.
    pub fn is_audio_only(&self) -> bool {
        self.has_audio() && !self.has_video()
    }

    pub fn audio_bitrate(&self) -> f64 {
        self.abr.unwrap_or(0.0)
    }
}

/// A single hit from a platform search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchEntry {
    pub id: String,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub duration: Option<u64>,
    pub view_count: Option<u64>,
    pub url: String,
}

/// Trait for media extraction services.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Short lowercase backend name (e.g., `"yt-dlp"`).
    fn name(&self) -> &'static str;

    /// Extract metadata and formats for `url`, choosing a rendition with `selector`.
    async fn extract(&self, url: &str, selector: &QualitySelector) -> Result<ExtractedMedia>;

    /// Whether the backend can currently run. Defaults to `true`.
    async fn is_available(&self) -> bool {
        true
    }

    /// Search the platform catalog. Returns an empty vec by default.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchEntry>> {
        let _ = (query, limit);
        Ok(vec![])
    }
}
