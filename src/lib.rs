//! `gst-fanout` - Fan one media source out to many network displays
//!
//! # Features
//!
//! - **Source resolution**: local files or YouTube URLs via `yt-dlp`, with a
//!   TTL cache and quality fallback chain
//! - **Topology building**: one decode stage, video/audio tees, and an
//!   RTP/UDP branch pair per display, as plain data
//! - **Supervision**: one `gst-launch-1.0` child per stream with graceful
//!   stop, forced kill after a grace period, and cleanup on exit
//!
//! # Example
//!
//! ```rust,no_run
//! use gst_fanout::{Config, Engine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = Engine::from_config(Config::load(None)?);
//!     let outcome = engine.start_stream(Some("lobby"), "movie.mp4", None).await;
//!     println!("{}", outcome.message);
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod source;
pub mod supervisor;
pub mod topology;

pub use config::Config;
pub use engine::{Engine, Health, Outcome, ToolStatus};
pub use error::{Error, ErrorKind, Result};
pub use source::{
    classify, QualitySelector, QualityTier, SourceDescriptor, SourceKind, SourceResolver,
};
pub use supervisor::{ExitOutcome, Launcher, StreamState, StreamStatus, Supervisor};
pub use topology::{EncodeSettings, Endpoint, TopologyBuilder, TopologyDescription};

/// Version of gst-fanout
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
