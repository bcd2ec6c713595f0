use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use gst_fanout::{Config, Engine};

pub async fn cmd_play(
    config: Config,
    source: &str,
    displays: &[String],
    id: Option<&str>,
) -> Result<()> {
    let endpoints = config.select_displays(displays)?;
    let engine = Engine::from_config(config);

    let outcome = engine.start_stream(id, source, Some(endpoints)).await;
    if !outcome.success {
        anyhow::bail!(outcome.message);
    }
    let status = outcome.data.context("start returned no stream status")?;

    eprintln!("▶️  {}", outcome.message);
    eprintln!("   Source: {}", status.title.as_deref().unwrap_or(&status.source));
    eprintln!("   Displays: {}", status.displays);
    if let Some(pid) = status.pid {
        eprintln!("   PID: {pid}");
    }

    tokio::select! {
        () = shutdown_signal() => eprintln!("\n⏹  Interrupted, stopping"),
        () = wait_for_end(&engine, &status.stream_id) => eprintln!("⏹  Stream {} ended", status.stream_id),
    }

    let stopped = engine.shutdown().await;
    if stopped > 0 {
        eprintln!("   Stopped {stopped} stream(s)");
    }
    Ok(())
}

/// Poll until the stream leaves the registry.
async fn wait_for_end(engine: &Engine, id: &str) {
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        ticker.tick().await;
        if engine.supervisor().status(id).is_none() {
            break;
        }
    }
}

/// Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
