//! `gst-fanout` CLI - Stream one source to many network displays

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use gst_fanout::Config;

#[derive(Parser)]
#[command(name = "gst-fanout")]
#[command(about = "Fan a media file or YouTube video out to RTP/UDP displays via GStreamer")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/gst-fanout/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (ignored when `RUST_LOG` is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a source to displays until it ends or Ctrl-C
    Play {
        /// Media file (relative to the library path) or YouTube URL
        source: String,

        /// Display name from config (repeatable; default: all enabled)
        #[arg(short, long = "display")]
        displays: Vec<String>,

        /// Stream id (default: generated)
        #[arg(long)]
        id: Option<String>,
    },

    /// Print the GStreamer pipeline without launching it
    Pipeline {
        /// Media file or YouTube URL
        source: String,

        /// Display name from config (repeatable; default: all enabled)
        #[arg(short, long = "display")]
        displays: Vec<String>,

        /// Print the topology as JSON instead of pipeline syntax
        #[arg(long)]
        json: bool,
    },

    /// Resolve a YouTube URL into stream locations
    Resolve {
        /// YouTube URL
        url: String,

        /// Only check the URL, report problems without failing
        #[arg(long)]
        validate: bool,
    },

    /// Search YouTube
    Search {
        /// Search terms
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// List configured displays
    Displays {
        /// Include disabled displays
        #[arg(short, long)]
        all: bool,
    },

    /// Print the effective configuration
    Config,
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Install the subscriber before the config is read so config loading can
/// log. The filter is provisional until [`apply_config_level`] runs.
fn init_logging(verbose: bool) -> FilterHandle {
    let initial = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "debug" } else { "info" })
    });
    let (filter, handle) = reload::Layer::new(initial);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
    handle
}

/// Switch to the configured level unless `RUST_LOG` or `-v` took precedence.
fn apply_config_level(handle: &FilterHandle, config: &Config, verbose: bool) {
    if verbose || std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return;
    }
    match EnvFilter::try_new(&config.logging.level) {
        Ok(filter) => {
            if let Err(e) = handle.reload(filter) {
                tracing::debug!("Could not apply log level: {e}");
            }
        }
        Err(e) => tracing::warn!("Invalid log level '{}': {e}", config.logging.level),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = init_logging(cli.verbose);
    let config = Config::load(cli.config.as_deref())?;
    apply_config_level(&filter, &config, cli.verbose);

    match cli.command {
        Commands::Play {
            source,
            displays,
            id,
        } => {
            cmd::play::cmd_play(config, &source, &displays, id.as_deref()).await?;
        }
        Commands::Pipeline {
            source,
            displays,
            json,
        } => {
            cmd::pipeline::cmd_pipeline(config, &source, &displays, json).await?;
        }
        Commands::Resolve { url, validate } => {
            cmd::resolve::cmd_resolve(config, &url, validate).await?;
        }
        Commands::Search { query, limit } => {
            cmd::resolve::cmd_search(config, &query, limit).await?;
        }
        Commands::Displays { all } => {
            cmd::displays::cmd_displays(&config, all);
        }
        Commands::Config => {
            cmd::displays::cmd_config(&config)?;
        }
    }

    Ok(())
}
