//! End-to-end resolution through a stand-in `yt-dlp` script.
//!
//! Everything runs in one test so no other test thread forks while the
//! scripts are being written.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use gst_fanout::source::{ResolverConfig, SourceResolver};
use gst_fanout::{Error, SourceDescriptor};

const VIDEO_JSON: &str = r#"{
  "id": "abc12345678",
  "title": "Test Video",
  "uploader": "Tester",
  "duration": 100,
  "is_live": false,
  "url": "https://media.example/combined.mp4",
  "formats": [
    {"format_id": "18", "vcodec": "avc1", "acodec": "mp4a", "height": 360, "url": "https://media.example/combined.mp4"},
    {"format_id": "139", "vcodec": "none", "acodec": "mp4a", "abr": 48, "url": "https://media.example/low.m4a"},
    {"format_id": "140", "vcodec": "none", "acodec": "mp4a", "abr": 129.5, "url": "https://media.example/high.m4a"}
  ]
}"#;

const SEARCH_JSON: &str = r#"{
  "entries": [
    {"id": "abc12345678", "title": "First", "channel": "Chan", "duration": 61.4},
    {"id": "def12345678", "title": "Second", "uploader": "Up"}
  ]
}"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn resolver(program: PathBuf, max_duration: u64) -> SourceResolver {
    SourceResolver::with_ytdlp(ResolverConfig {
        program: Some(program),
        max_duration,
        ..ResolverConfig::default()
    })
}

fn calls(log: &Path) -> usize {
    std::fs::read_to_string(log)
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

#[tokio::test]
async fn fake_ytdlp_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("calls.log");

    let ok = write_script(
        dir.path(),
        "yt-dlp-ok",
        &format!(
            "echo \"$@\" >> '{log}'\ncase \"$*\" in\n  *ytsearch*) cat <<'EOF'\n{SEARCH_JSON}\nEOF\n  ;;\n  *) cat <<'EOF'\n{VIDEO_JSON}\nEOF\n  ;;\nesac",
            log = log.display()
        ),
    );
    let private = write_script(
        dir.path(),
        "yt-dlp-private",
        "echo 'ERROR: [youtube] abc12345678: Private video. Sign in if you have access' >&2\nexit 1",
    );
    let garbage = write_script(dir.path(), "yt-dlp-garbage", "echo 'not json'");

    // ─── Resolution with audio companion ─────────────────────────────────────
    let resolver_ok = resolver(ok.clone(), 7200);
    let descriptor = resolver_ok
        .resolve("https://www.youtube.com/watch?v=abc12345678")
        .await
        .unwrap();
    match descriptor {
        SourceDescriptor::Remote {
            ref video_url,
            ref audio_url,
            ref metadata,
        } => {
            assert_eq!(video_url, "https://media.example/combined.mp4");
            assert_eq!(audio_url.as_deref(), Some("https://media.example/high.m4a"));
            assert_eq!(metadata.title, "Test Video");
            assert_eq!(metadata.duration_seconds, 100);
        }
        SourceDescriptor::Local { .. } => panic!("expected a remote descriptor"),
    }

    let first_call = std::fs::read_to_string(&log).unwrap();
    assert!(first_call.contains("--dump-single-json"));
    assert!(first_call.contains("best[height<=720][ext=mp4]/best[height<=480][ext=mp4]"));
    assert!(first_call.trim_end().ends_with("https://www.youtube.com/watch?v=abc12345678"));

    // ─── Cache: same id through another URL shape ────────────────────────────
    resolver_ok
        .resolve_remote("https://youtu.be/abc12345678")
        .await
        .unwrap();
    assert_eq!(calls(&log), 1);
    resolver_ok.clear_cache();
    resolver_ok
        .resolve_remote("https://youtu.be/abc12345678")
        .await
        .unwrap();
    assert_eq!(calls(&log), 2);

    // ─── Duration ceiling ────────────────────────────────────────────────────
    let strict = resolver(ok.clone(), 60);
    assert!(matches!(
        strict.resolve_remote("https://youtu.be/abc12345678").await,
        Err(Error::DurationExceeded {
            duration: 100,
            limit: 60
        })
    ));

    // ─── Search ──────────────────────────────────────────────────────────────
    let results = resolver_ok.search("rust talks", 5).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].uploader.as_deref(), Some("Chan"));
    assert_eq!(results[0].duration, Some(61));
    assert_eq!(results[1].url, "https://www.youtube.com/watch?v=def12345678");

    // ─── Failures become typed errors ────────────────────────────────────────
    let private = resolver(private, 7200);
    assert!(matches!(
        private.resolve_remote("https://youtu.be/abc12345678").await,
        Err(Error::Unavailable(_))
    ));
    let report = private.validate("https://youtu.be/abc12345678").await;
    assert!(!report.valid);
    assert_eq!(report.error.as_deref(), Some("Video not accessible or private"));

    let garbage = resolver(garbage, 7200);
    assert!(matches!(
        garbage.resolve_remote("https://youtu.be/abc12345678").await,
        Err(Error::Json(_))
    ));
}
