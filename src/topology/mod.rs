//! Declarative fan-out topology for one stream.
//!
//! A [`TopologyDescription`] is plain data: ingest stages feeding one video
//! tee and one audio tee, plus a video and an audio output branch per enabled
//! display. It is produced by [`TopologyBuilder`] and only turned into
//! `gst-launch-1.0` syntax at the process boundary (see [`syntax`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use gst_fanout::source::SourceDescriptor;
//! use gst_fanout::topology::{EncodeSettings, Endpoint, TopologyBuilder};
//!
//! let builder = TopologyBuilder::new(EncodeSettings::video_default(), EncodeSettings::audio_default());
//! let topology = builder
//!     .build(
//!         &SourceDescriptor::local("/media/movie.mp4"),
//!         &[Endpoint::new("Lobby", "10.0.0.2", 5000)],
//!     )
//!     .unwrap();
//! println!("{}", topology.to_pipeline_string());
//! ```

mod builder;
pub mod syntax;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use builder::TopologyBuilder;

/// Audio transmit port = base port + this offset.
pub const AUDIO_PORT_OFFSET: u16 = 100;

/// Frame size every display receives.
pub const TARGET_WIDTH: u32 = 1920;
pub const TARGET_HEIGHT: u32 = 1080;

const fn enabled_by_default() -> bool {
    true
}

/// One network display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    #[serde(rename = "ip")]
    pub host: String,
    /// Base port; video goes here, audio to [`Endpoint::audio_port`].
    pub port: u16,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            enabled: true,
        }
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn video_port(&self) -> u16 {
        self.port
    }

    /// `None` when the offset would overflow the port range.
    pub fn audio_port(&self) -> Option<u16> {
        self.port.checked_add(AUDIO_PORT_OFFSET)
    }
}

/// Encoder element name and its bitrate (kbit/s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeSettings {
    pub codec: String,
    pub bitrate: u32,
}

impl EncodeSettings {
    pub fn new(codec: impl Into<String>, bitrate: u32) -> Self {
        Self {
            codec: codec.into(),
            bitrate,
        }
    }

    pub fn video_default() -> Self {
        Self::new("x264enc", 2000)
    }

    pub fn audio_default() -> Self {
        Self::new("lamemp3enc", 128)
    }
}

/// A single element or caps filter in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element {
        factory: String,
        properties: Vec<(String, String)>,
    },
    Caps {
        caps: String,
    },
}

impl Node {
    pub fn element(factory: impl Into<String>) -> Self {
        Self::Element {
            factory: factory.into(),
            properties: Vec::new(),
        }
    }

    pub fn caps(caps: impl Into<String>) -> Self {
        Self::Caps { caps: caps.into() }
    }

    /// Add a property; no-op on caps nodes.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        if let Self::Element {
            ref mut properties,
            ..
        } = self
        {
            properties.push((key.into(), value.to_string()));
        }
        self
    }

    pub fn factory(&self) -> Option<&str> {
        match self {
            Self::Element { factory, .. } => Some(factory),
            Self::Caps { .. } => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            Self::Element { properties, .. } => properties
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            Self::Caps { .. } => None,
        }
    }
}

/// Which streams an ingest stage feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestRole {
    Combined,
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestLocation {
    File(PathBuf),
    Uri(String),
}

/// Source read plus decode, exposing its pads under `decoder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ingest {
    pub role: IngestRole,
    pub location: IngestLocation,
    pub decoder: String,
}

/// Normalization chain ending in a named tee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeeStage {
    pub name: String,
    /// Decoder whose pad feeds this tee.
    pub input: String,
    pub chain: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

/// Tee → encode → payload → UDP transmit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputBranch {
    pub tee: String,
    pub chain: Vec<Node>,
    pub destination: Destination,
}

impl OutputBranch {
    /// First node carrying a `bitrate` property, i.e. the encoder.
    pub fn encoder(&self) -> Option<&Node> {
        self.chain.iter().find(|n| n.get("bitrate").is_some())
    }
}

/// Both branches serving one display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointOutputs {
    pub endpoint: String,
    pub video: OutputBranch,
    pub audio: OutputBranch,
}

/// Complete fan-out graph for one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologyDescription {
    pub ingests: Vec<Ingest>,
    pub video_tee: TeeStage,
    pub audio_tee: TeeStage,
    /// One entry per enabled display, in the order given.
    pub outputs: Vec<EndpointOutputs>,
}

impl TopologyDescription {
    pub fn video_branches(&self) -> impl Iterator<Item = &OutputBranch> {
        self.outputs.iter().map(|o| &o.video)
    }

    pub fn audio_branches(&self) -> impl Iterator<Item = &OutputBranch> {
        self.outputs.iter().map(|o| &o.audio)
    }

    pub fn endpoint_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn has_separate_audio(&self) -> bool {
        self.ingests.iter().any(|i| i.role == IngestRole::Audio)
    }
}
