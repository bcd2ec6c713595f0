//! Integration tests for the engine façade: every call returns an outcome.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use gst_fanout::config::{Config, LauncherConfig};
use gst_fanout::{Endpoint, Engine, ErrorKind, Launcher, SourceResolver};

fn engine(media_root: &std::path::Path) -> Engine {
    let mut config = Config::default();
    config.media.library_path = media_root.to_path_buf();
    config.displays.endpoints = vec![
        Endpoint::new("Lobby", "10.0.0.2", 5000),
        Endpoint::new("Bar", "10.0.0.3", 5001).disabled(),
    ];
    config.streaming.launcher = LauncherConfig {
        program: Some("/bin/sh".into()),
        args: vec!["-c".into(), "exec sleep 30".into()],
        grace_period_secs: 1,
    };
    let resolver = Arc::new(SourceResolver::with_ytdlp(config.youtube.clone()));
    let launcher = config.streaming.launcher.launcher();
    Engine::with_parts(config, resolver, launcher)
}

#[tokio::test]
async fn start_list_stop_round() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("movie.mp4"), b"").unwrap();
    let engine = engine(dir.path());

    let started = engine.start_stream(Some("lobby"), "movie.mp4", None).await;
    assert!(started.success, "{}", started.message);
    assert_eq!(started.message, "Stream lobby started successfully");
    // Only the enabled display is used by default.
    assert_eq!(started.data.as_ref().map(|s| s.displays), Some(1));

    let listed = engine.list_streams();
    assert_eq!(listed.data.map(|v| v.len()), Some(1));
    assert_eq!(engine.health().await.active_streams, 1);

    let status = engine.get_status("lobby");
    assert!(status.success);
    assert!(status.data.unwrap().running);

    let stopped = engine.stop_stream("lobby").await;
    assert!(stopped.success);
    assert!(!engine.get_status("lobby").success);

    assert_eq!(engine.shutdown().await, 0);
    assert_eq!(engine.health().await.status, "shutting_down");
}

#[tokio::test]
async fn generated_ids_and_json_shape() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("movie.mp4"), b"").unwrap();
    let engine = engine(dir.path());

    let started = engine.start_stream(None, "movie.mp4", None).await;
    let id = started.data.as_ref().unwrap().stream_id.clone();
    assert_eq!(id.len(), 8);

    let json = serde_json::to_value(&started).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["state"], "running");
    assert_eq!(json["data"]["displays"], 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn failures_are_outcomes_not_errors() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());

    let missing = engine.start_stream(Some("s1"), "absent.mp4", None).await;
    assert!(!missing.success);
    assert_eq!(missing.kind, Some(ErrorKind::NotFound));
    assert!(missing.message.starts_with("Media file not found"));

    let collision = engine
        .start_stream(
            Some("s1"),
            "absent.mp4",
            Some(vec![
                Endpoint::new("A", "10.0.0.2", 5000),
                Endpoint::new("B", "10.0.0.2", 5100),
            ]),
        )
        .await;
    assert_eq!(collision.kind, Some(ErrorKind::Validation));

    let not_youtube = engine.validate_source("https://vimeo.com/1").await;
    assert!(!not_youtube.success);
    assert_eq!(not_youtube.message, "Not a valid YouTube URL");

    let resolved = engine.resolve_source("https://youtu.be/short").await;
    assert_eq!(resolved.kind, Some(ErrorKind::Resolution));
}

#[tokio::test]
async fn cache_and_search_controls() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());

    let stats = engine.cache_stats().data.unwrap();
    assert!(stats.enabled);
    assert_eq!(stats.size, Some(0));
    assert_eq!(stats.max_size, Some(100));

    assert!(engine.clear_cache().success);

    let blank = engine.search_sources("   ", 5).await;
    assert!(blank.success);
    assert_eq!(blank.data.map(|v| v.len()), Some(0));
}

#[tokio::test]
async fn displays_are_enabled_only() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let names: Vec<String> = engine.displays().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["Lobby".to_string()]);
}

#[tokio::test]
async fn launcher_from_config() {
    let config = LauncherConfig::default();
    assert_eq!(config.grace_period(), Duration::from_secs(5));
    let launcher: Launcher = config.launcher();
    assert_eq!(launcher.args(), &["-e".to_string()]);
}
