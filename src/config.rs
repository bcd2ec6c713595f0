//! Configuration loaded from `~/.config/gst-fanout/config.toml`.
//!
//! Every section has defaults, so a missing file or a partial file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::source::ResolverConfig;
use crate::supervisor::Launcher;
use crate::topology::{EncodeSettings, Endpoint, TopologyBuilder};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub media: MediaConfig,
    pub displays: DisplaysConfig,
    pub streaming: StreamingConfig,
    pub youtube: ResolverConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Root for relative local media references.
    pub library_path: PathBuf,
    pub supported_formats: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            library_path: PathBuf::from("/media"),
            supported_formats: ["mp4", "mkv", "avi", "mov", "webm"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaysConfig {
    pub endpoints: Vec<Endpoint>,
}

impl Default for DisplaysConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![Endpoint::new("Display 1", "192.168.1.100", 5000)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    pub video: EncodeSettings,
    pub audio: EncodeSettings,
    pub launcher: LauncherConfig,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            video: EncodeSettings::video_default(),
            audio: EncodeSettings::audio_default(),
            launcher: LauncherConfig::default(),
        }
    }
}

/// Pipeline engine invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// `gst-launch-1.0` from PATH when unset.
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
    pub grace_period_secs: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: vec!["-e".to_string()],
            grace_period_secs: 5,
        }
    }
}

impl LauncherConfig {
    pub fn launcher(&self) -> Launcher {
        let launcher = match self.program {
            Some(ref program) => Launcher::new(program),
            None => Launcher::gst_launch(),
        };
        launcher.with_args(self.args.clone())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `path`, or the default location when `None`.
    ///
    /// A missing file yields defaults; an unreadable or invalid one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(config_path, Path::to_path_buf);
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn enabled_displays(&self) -> Vec<Endpoint> {
        self.displays
            .endpoints
            .iter()
            .filter(|e| e.enabled)
            .cloned()
            .collect()
    }

    /// Displays matching `names` (case-insensitive), in the order given.
    /// An empty selection means every enabled display.
    pub fn select_displays(&self, names: &[String]) -> Result<Vec<Endpoint>> {
        if names.is_empty() {
            return Ok(self.enabled_displays());
        }
        names
            .iter()
            .map(|name| {
                self.displays
                    .endpoints
                    .iter()
                    .find(|e| e.name.eq_ignore_ascii_case(name))
                    .cloned()
                    .with_context(|| format!("no display named '{name}' in config"))
            })
            .collect()
    }

    pub fn topology_builder(&self) -> TopologyBuilder {
        TopologyBuilder::new(self.streaming.video.clone(), self.streaming.audio.clone())
            .with_media_root(&self.media.library_path)
            .with_separate_audio(self.youtube.extract_audio)
    }
}

/// Return the path to the default config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gst-fanout")
        .join("config.toml")
}
