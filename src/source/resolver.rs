//! Remote source resolution with caching and quality fallback.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::backend::{ExtractedMedia, ExtractionBackend, MediaFormat, SearchEntry};
use super::backends::YtDlpBackend;
use super::cache::{CacheStats, MetadataCache};
use super::quality::{QualitySelector, QualityTier};
use super::{classify, extract_video_id, RemoteMetadata, SourceDescriptor, SourceKind};
use crate::error::{Error, Result};

/// Remote resolution settings (the `[youtube]` config section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Accept remote platform URLs at all.
    pub enabled: bool,
    pub default_quality: QualityTier,
    pub fallback_qualities: Vec<QualityTier>,
    pub cache_enabled: bool,
    /// Cache time-to-live in seconds.
    pub cache_duration: u64,
    pub cache_max_entries: usize,
    /// Duration ceiling in seconds; 0 disables the check.
    pub max_duration: u64,
    /// Fetch a separate audio-only rendition when one exists.
    pub extract_audio: bool,
    /// Network timeout in seconds.
    pub timeout: u64,
    /// yt-dlp binary; searched in PATH when unset.
    pub program: Option<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_quality: QualityTier::P720,
            fallback_qualities: vec![QualityTier::P720, QualityTier::P480, QualityTier::P360],
            cache_enabled: true,
            cache_duration: 3600,
            cache_max_entries: 100,
            max_duration: 7200,
            extract_audio: true,
            timeout: 30,
            program: None,
        }
    }
}

impl ResolverConfig {
    pub fn selector(&self) -> QualitySelector {
        QualitySelector::new(self.default_quality, &self.fallback_qualities)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_duration)
    }
}

/// Directly fetchable locations for one remote source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamLocations {
    pub video_url: String,
    pub audio_url: Option<String>,
}

/// Outcome of checking a remote URL before use.
#[derive(Debug, Clone, Serialize)]
pub struct Validation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<RemoteMetadata>,
}

impl Validation {
    fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            warning: None,
            info: None,
        }
    }
}

/// What the cache remembers about one video.
#[derive(Debug, Clone)]
struct ResolvedVideo {
    metadata: RemoteMetadata,
    selected_url: Option<String>,
    formats: Vec<MediaFormat>,
}

impl ResolvedVideo {
    fn from_media(id: String, original_url: &str, media: ExtractedMedia) -> Self {
        let duration_seconds = media.duration_seconds();
        Self {
            metadata: RemoteMetadata {
                id,
                title: media.title.unwrap_or_else(|| "Unknown Title".to_string()),
                description: media.description.unwrap_or_default(),
                duration_seconds,
                uploader: media.uploader.unwrap_or_else(|| "Unknown".to_string()),
                thumbnail_url: media.thumbnail,
                is_live: media.is_live.unwrap_or(false),
                original_url: original_url.to_string(),
                extracted_at: Utc::now(),
            },
            selected_url: media.url,
            formats: media.formats,
        }
    }

    /// Selected rendition, else the tallest muxed format, else the tallest
    /// video format of any kind.
    fn video_url(&self) -> Option<String> {
        let tallest = |muxed: bool| {
            self.formats
                .iter()
                .filter(|f| f.has_video() && f.url.is_some() && (!muxed || f.has_audio()))
                .max_by_key(|f| f.height.unwrap_or(0))
                .and_then(|f| f.url.clone())
        };
        self.selected_url
            .clone()
            .or_else(|| tallest(true))
            .or_else(|| tallest(false))
    }

    /// Audio-only rendition with the highest bitrate.
    fn best_audio_url(&self) -> Option<String> {
        self.formats
            .iter()
            .filter(|f| f.is_audio_only() && f.url.is_some())
            .max_by(|a, b| a.audio_bitrate().total_cmp(&b.audio_bitrate()))
            .and_then(|f| f.url.clone())
    }
}

/// Resolves media references into [`SourceDescriptor`]s.
pub struct SourceResolver {
    backend: Arc<dyn ExtractionBackend>,
    cache: Option<MetadataCache<ResolvedVideo>>,
    selector: QualitySelector,
    config: ResolverConfig,
}

impl SourceResolver {
    pub fn new(backend: Arc<dyn ExtractionBackend>, config: ResolverConfig) -> Self {
        let cache = config
            .cache_enabled
            .then(|| MetadataCache::new(config.cache_max_entries, config.cache_ttl()));
        Self {
            backend,
            cache,
            selector: config.selector(),
            config,
        }
    }

    /// Resolver backed by a yt-dlp subprocess.
    pub fn with_ytdlp(config: ResolverConfig) -> Self {
        let mut backend =
            YtDlpBackend::new().with_socket_timeout(Duration::from_secs(config.timeout.max(1)));
        if let Some(ref program) = config.program {
            backend = backend.with_ytdlp_path(program);
        }
        Self::new(Arc::new(backend), config)
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn selector(&self) -> &QualitySelector {
        &self.selector
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn backend_available(&self) -> bool {
        self.backend.is_available().await
    }

    /// Turn any media reference into a descriptor. Local references are
    /// returned untouched; the topology builder checks they exist.
    pub async fn resolve(&self, reference: &str) -> Result<SourceDescriptor> {
        let reference = reference.trim();
        match classify(reference) {
            SourceKind::Local => Ok(SourceDescriptor::local(reference)),
            SourceKind::RemotePlatformUrl => {
                let resolved = self.lookup(reference).await?;
                let locations = self.locations_for(&resolved)?;
                Ok(SourceDescriptor::Remote {
                    video_url: locations.video_url,
                    audio_url: locations.audio_url,
                    metadata: resolved.metadata,
                })
            }
        }
    }

    /// Metadata for a remote URL, from cache when fresh.
    pub async fn resolve_remote(&self, url: &str) -> Result<RemoteMetadata> {
        Ok(self.lookup(url).await?.metadata)
    }

    /// Video location plus, when audio extraction is on, the best audio-only location.
    pub async fn stream_locations(&self, url: &str) -> Result<StreamLocations> {
        let resolved = self.lookup(url).await?;
        self.locations_for(&resolved)
    }

    fn locations_for(&self, resolved: &ResolvedVideo) -> Result<StreamLocations> {
        let video_url = resolved
            .video_url()
            .ok_or_else(|| Error::NoPlayableFormat(resolved.metadata.id.clone()))?;
        let audio_url = if self.config.extract_audio {
            resolved.best_audio_url()
        } else {
            None
        };
        Ok(StreamLocations {
            video_url,
            audio_url,
        })
    }

    async fn lookup(&self, url: &str) -> Result<ResolvedVideo> {
        if !self.config.enabled {
            return Err(Error::RemoteDisabled);
        }
        let url = url.trim();
        if classify(url) != SourceKind::RemotePlatformUrl {
            return Err(Error::MalformedReference(url.to_string()));
        }
        let id = extract_video_id(url).ok_or_else(|| Error::MalformedReference(url.to_string()))?;

        if let Some(ref cache) = self.cache {
            if let Some(hit) = cache.get(&id) {
                debug!("Using cached info for video {id}");
                return Ok(hit);
            }
        }

        info!("Resolving video {id} via {}", self.backend.name());
        let media = self.backend.extract(url, &self.selector).await?;

        let duration = media.duration_seconds();
        if self.config.max_duration > 0 && duration > self.config.max_duration {
            warn!(
                "Video duration {duration}s exceeds limit {}s",
                self.config.max_duration
            );
            return Err(Error::DurationExceeded {
                duration,
                limit: self.config.max_duration,
            });
        }

        let resolved = ResolvedVideo::from_media(id.clone(), url, media);
        if let Some(ref cache) = self.cache {
            cache.insert(id, resolved.clone());
        }
        Ok(resolved)
    }

    /// Check a URL and report problems as data instead of errors.
    pub async fn validate(&self, url: &str) -> Validation {
        let url = url.trim();
        if url.is_empty() {
            return Validation::invalid("URL is required");
        }
        if classify(url) != SourceKind::RemotePlatformUrl {
            return Validation::invalid("Not a valid YouTube URL");
        }
        if extract_video_id(url).is_none() {
            return Validation::invalid("Could not extract video ID");
        }

        match self.resolve_remote(url).await {
            Ok(info) => Validation {
                valid: true,
                error: None,
                warning: info
                    .is_live
                    .then(|| "Live stream detected - quality may vary".to_string()),
                info: Some(info),
            },
            Err(Error::Unavailable(_) | Error::Extraction(_) | Error::Spawn { .. }) => {
                Validation::invalid("Video not accessible or private")
            }
            Err(e) => Validation::invalid(e.to_string()),
        }
    }

    /// Search the remote platform. Blank queries return nothing.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchEntry>> {
        if !self.config.enabled {
            return Err(Error::RemoteDisabled);
        }
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let mut results = self.backend.search(query, limit).await?;
        results.truncate(limit);
        Ok(results)
    }

    pub fn clear_cache(&self) {
        if let Some(ref cache) = self.cache {
            cache.clear();
            info!("Source cache cleared");
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .as_ref()
            .map_or_else(CacheStats::disabled, MetadataCache::stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Backend returning canned media and counting calls.
    struct FakeBackend {
        media: ExtractedMedia,
        calls: AtomicUsize,
        selectors: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn new(media: ExtractedMedia) -> Arc<Self> {
            Arc::new(Self {
                media,
                calls: AtomicUsize::new(0),
                selectors: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExtractionBackend for FakeBackend {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn extract(&self, _url: &str, selector: &QualitySelector) -> Result<ExtractedMedia> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.selectors
                .lock()
                .unwrap()
                .push(selector.to_format_string());
            Ok(self.media.clone())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl ExtractionBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn extract(&self, _url: &str, _selector: &QualitySelector) -> Result<ExtractedMedia> {
            Err(Error::Unavailable("ERROR: Private video".into()))
        }
    }

    fn media(duration: f64) -> ExtractedMedia {
        ExtractedMedia {
            id: "abc12345678".into(),
            title: Some("Test video".into()),
            duration: Some(duration),
            url: Some("https://media.example/combined.mp4".into()),
            formats: vec![
                MediaFormat {
                    vcodec: Some("avc1".into()),
                    acodec: Some("mp4a".into()),
                    height: Some(720),
                    url: Some("https://media.example/combined.mp4".into()),
                    ..MediaFormat::default()
                },
                MediaFormat {
                    vcodec: Some("none".into()),
                    acodec: Some("opus".into()),
                    abr: Some(48.0),
                    url: Some("https://media.example/low.webm".into()),
                    ..MediaFormat::default()
                },
                MediaFormat {
                    vcodec: Some("none".into()),
                    acodec: Some("opus".into()),
                    abr: Some(160.0),
                    url: Some("https://media.example/high.webm".into()),
                    ..MediaFormat::default()
                },
            ],
            ..ExtractedMedia::default()
        }
    }

    #[tokio::test]
    async fn resolves_within_duration_ceiling() {
        let backend = FakeBackend::new(media(100.0));
        let resolver = SourceResolver::new(backend.clone(), ResolverConfig::default());
        let info = resolver
            .resolve_remote("https://youtu.be/abc12345678")
            .await
            .unwrap();
        assert_eq!(info.id, "abc12345678");
        assert_eq!(info.duration_seconds, 100);
        assert_eq!(info.title, "Test video");
        assert_eq!(info.uploader, "Unknown");
    }

    #[tokio::test]
    async fn rejects_duration_over_ceiling() {
        let backend = FakeBackend::new(media(7300.0));
        let resolver = SourceResolver::new(backend.clone(), ResolverConfig::default());
        let err = resolver
            .resolve_remote("https://youtu.be/abc12345678")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DurationExceeded {
                duration: 7300,
                limit: 7200
            }
        ));
        // Rejected metadata is not cached.
        assert_eq!(resolver.cache_stats().size, Some(0));
    }

    #[tokio::test]
    async fn zero_ceiling_disables_check() {
        let backend = FakeBackend::new(media(90_000.0));
        let config = ResolverConfig {
            max_duration: 0,
            ..ResolverConfig::default()
        };
        let resolver = SourceResolver::new(backend, config);
        assert!(resolver
            .resolve_remote("https://youtu.be/abc12345678")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn second_lookup_hits_cache() {
        let backend = FakeBackend::new(media(100.0));
        let resolver = SourceResolver::new(backend.clone(), ResolverConfig::default());

        resolver
            .resolve_remote("https://youtu.be/abc12345678")
            .await
            .unwrap();
        resolver
            .resolve_remote("https://www.youtube.com/watch?v=abc12345678")
            .await
            .unwrap();
        assert_eq!(backend.calls(), 1);

        resolver.clear_cache();
        resolver
            .resolve_remote("https://youtu.be/abc12345678")
            .await
            .unwrap();
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn expired_entry_is_queried_again() {
        let backend = FakeBackend::new(media(100.0));
        let config = ResolverConfig {
            cache_duration: 0,
            ..ResolverConfig::default()
        };
        let resolver = SourceResolver::new(backend.clone(), config);
        resolver.resolve_remote("https://youtu.be/abc12345678").await.unwrap();
        assert_eq!(backend.calls(), 1);
        resolver.resolve_remote("https://youtu.be/abc12345678").await.unwrap();
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn disabled_cache_always_queries() {
        let backend = FakeBackend::new(media(100.0));
        let config = ResolverConfig {
            cache_enabled: false,
            ..ResolverConfig::default()
        };
        let resolver = SourceResolver::new(backend.clone(), config);
        resolver.resolve_remote("https://youtu.be/abc12345678").await.unwrap();
        resolver.resolve_remote("https://youtu.be/abc12345678").await.unwrap();
        assert_eq!(backend.calls(), 2);
        assert!(!resolver.cache_stats().enabled);
    }

    #[tokio::test]
    async fn passes_fallback_selector_to_backend() {
        let backend = FakeBackend::new(media(100.0));
        let config = ResolverConfig {
            default_quality: QualityTier::P1080,
            fallback_qualities: vec![QualityTier::P480],
            ..ResolverConfig::default()
        };
        let resolver = SourceResolver::new(backend.clone(), config);
        resolver.resolve_remote("https://youtu.be/abc12345678").await.unwrap();
        let selectors = backend.selectors.lock().unwrap();
        assert_eq!(
            selectors[0],
            "best[height<=1080][ext=mp4]/best[height<=480][ext=mp4]/best[ext=mp4]/best"
        );
    }

    #[tokio::test]
    async fn malformed_reference_is_rejected() {
        let backend = FakeBackend::new(media(100.0));
        let resolver = SourceResolver::new(backend.clone(), ResolverConfig::default());
        let err = resolver
            .resolve_remote("https://youtu.be/short")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedReference(_)));
        let err = resolver.resolve_remote("movie.mp4").await.unwrap_err();
        assert!(matches!(err, Error::MalformedReference(_)));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn picks_highest_bitrate_audio_companion() {
        let backend = FakeBackend::new(media(100.0));
        let resolver = SourceResolver::new(backend, ResolverConfig::default());
        let locations = resolver
            .stream_locations("https://youtu.be/abc12345678")
            .await
            .unwrap();
        assert_eq!(locations.video_url, "https://media.example/combined.mp4");
        assert_eq!(
            locations.audio_url.as_deref(),
            Some("https://media.example/high.webm")
        );
    }

    #[tokio::test]
    async fn audio_extraction_disabled_returns_combined_only() {
        let backend = FakeBackend::new(media(100.0));
        let config = ResolverConfig {
            extract_audio: false,
            ..ResolverConfig::default()
        };
        let resolver = SourceResolver::new(backend, config);
        let descriptor = resolver.resolve("https://youtu.be/abc12345678").await.unwrap();
        match descriptor {
            SourceDescriptor::Remote {
                video_url,
                audio_url,
                ..
            } => {
                assert_eq!(video_url, "https://media.example/combined.mp4");
                assert!(audio_url.is_none());
            }
            SourceDescriptor::Local { .. } => panic!("expected remote descriptor"),
        }
    }

    #[tokio::test]
    async fn fallback_prefers_muxed_over_video_only() {
        let mut dash = media(100.0);
        dash.url = None;
        dash.formats.insert(
            0,
            MediaFormat {
                vcodec: Some("avc1".into()),
                acodec: Some("none".into()),
                height: Some(1080),
                url: Some("https://media.example/video-only.mp4".into()),
                ..MediaFormat::default()
            },
        );
        let config = ResolverConfig {
            extract_audio: false,
            ..ResolverConfig::default()
        };
        let resolver = SourceResolver::new(FakeBackend::new(dash), config);
        let locations = resolver
            .stream_locations("https://youtu.be/abc12345678")
            .await
            .unwrap();
        assert_eq!(locations.video_url, "https://media.example/combined.mp4");
        assert!(locations.audio_url.is_none());
    }

    #[tokio::test]
    async fn fallback_uses_video_only_when_nothing_is_muxed() {
        let mut dash = media(100.0);
        dash.url = None;
        dash.formats = vec![MediaFormat {
            vcodec: Some("vp9".into()),
            acodec: Some("none".into()),
            height: Some(1080),
            url: Some("https://media.example/video-only.webm".into()),
            ..MediaFormat::default()
        }];
        let resolver = SourceResolver::new(FakeBackend::new(dash), ResolverConfig::default());
        let locations = resolver
            .stream_locations("https://youtu.be/abc12345678")
            .await
            .unwrap();
        assert_eq!(locations.video_url, "https://media.example/video-only.webm");
    }

    #[test]
    fn local_references_pass_through() {
        let backend = FakeBackend::new(media(100.0));
        let resolver = SourceResolver::new(backend.clone(), ResolverConfig::default());
        let descriptor = tokio_test::assert_ok!(tokio_test::block_on(resolver.resolve("movie.mp4")));
        assert_eq!(descriptor, SourceDescriptor::local("movie.mp4"));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn remote_disabled() {
        let backend = FakeBackend::new(media(100.0));
        let config = ResolverConfig {
            enabled: false,
            ..ResolverConfig::default()
        };
        let resolver = SourceResolver::new(backend, config);
        let err = resolver.resolve("https://youtu.be/abc12345678").await.unwrap_err();
        assert!(matches!(err, Error::RemoteDisabled));
    }

    #[tokio::test]
    async fn validation_reports_live_streams_with_warning() {
        let mut live = media(0.0);
        live.is_live = Some(true);
        let resolver = SourceResolver::new(FakeBackend::new(live), ResolverConfig::default());
        let report = resolver.validate("https://youtu.be/abc12345678").await;
        assert!(report.valid);
        assert_eq!(
            report.warning.as_deref(),
            Some("Live stream detected - quality may vary")
        );
    }

    #[tokio::test]
    async fn validation_errors_are_data() {
        let resolver = SourceResolver::new(Arc::new(FailingBackend), ResolverConfig::default());
        assert_eq!(
            resolver.validate("").await.error.as_deref(),
            Some("URL is required")
        );
        assert_eq!(
            resolver.validate("https://vimeo.com/1").await.error.as_deref(),
            Some("Not a valid YouTube URL")
        );
        assert_eq!(
            resolver.validate("https://youtu.be/short").await.error.as_deref(),
            Some("Could not extract video ID")
        );
        let report = resolver.validate("https://youtu.be/abc12345678").await;
        assert!(!report.valid);
        assert_eq!(report.error.as_deref(), Some("Video not accessible or private"));
    }

    #[tokio::test]
    async fn search_uses_default_empty_results() {
        let resolver = SourceResolver::new(FakeBackend::new(media(1.0)), ResolverConfig::default());
        assert!(resolver.search("anything", 5).await.unwrap().is_empty());
        assert!(resolver.search("   ", 5).await.unwrap().is_empty());
    }
}
