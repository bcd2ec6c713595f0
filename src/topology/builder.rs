use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{
    Destination, EncodeSettings, Endpoint, EndpointOutputs, Ingest, IngestLocation, IngestRole,
    Node, OutputBranch, TeeStage, TopologyDescription, TARGET_HEIGHT, TARGET_WIDTH,
};
use crate::error::{Error, Result};
use crate::source::SourceDescriptor;

const VIDEO_TEE: &str = "video_tee";
const AUDIO_TEE: &str = "audio_tee";

/// Builds [`TopologyDescription`]s from a source and a display list.
#[derive(Debug, Clone)]
pub struct TopologyBuilder {
    video: EncodeSettings,
    audio: EncodeSettings,
    media_root: Option<PathBuf>,
    separate_audio: bool,
}

impl TopologyBuilder {
    pub fn new(video: EncodeSettings, audio: EncodeSettings) -> Self {
        Self {
            video,
            audio,
            media_root: None,
            separate_audio: true,
        }
    }

    /// Directory relative local paths are resolved against.
    #[must_use]
    pub fn with_media_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.media_root = Some(root.into());
        self
    }

    /// Whether a companion audio location gets its own ingest stage.
    #[must_use]
    pub fn with_separate_audio(mut self, enabled: bool) -> Self {
        self.separate_audio = enabled;
        self
    }

    /// Validate a display list, returning the enabled displays in order.
    pub fn check_endpoints(endpoints: &[Endpoint]) -> Result<Vec<&Endpoint>> {
        let enabled: Vec<&Endpoint> = endpoints.iter().filter(|e| e.enabled).collect();
        if enabled.is_empty() {
            return Err(Error::NoEndpoints);
        }

        // Every (host, port) pair a display transmits to, video and audio alike.
        let mut claimed: HashMap<(&str, u16), &str> = HashMap::new();
        for endpoint in &enabled {
            let audio_port = endpoint.audio_port().ok_or_else(|| Error::PortOutOfRange {
                name: endpoint.name.clone(),
                port: endpoint.port,
            })?;
            for port in [endpoint.video_port(), audio_port] {
                let key = (endpoint.host.as_str(), port);
                if let Some(first) = claimed.insert(key, endpoint.name.as_str()) {
                    return Err(Error::PortCollision {
                        first: first.to_string(),
                        second: endpoint.name.clone(),
                        host: endpoint.host.clone(),
                        port,
                    });
                }
            }
        }
        Ok(enabled)
    }

    /// Absolute location of a local reference.
    pub fn resolve_local(&self, path: &Path) -> PathBuf {
        match self.media_root {
            Some(ref root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Build the fan-out topology.
    ///
    /// The only I/O is the existence check for local sources.
    pub fn build(
        &self,
        source: &SourceDescriptor,
        endpoints: &[Endpoint],
    ) -> Result<TopologyDescription> {
        let enabled = Self::check_endpoints(endpoints)?;
        let ingests = self.ingests(source)?;

        let (video_input, audio_input) = match ingests.as_slice() {
            [video, audio] => (video.decoder.clone(), audio.decoder.clone()),
            [combined] => (combined.decoder.clone(), combined.decoder.clone()),
            _ => return Err(Error::Process("unexpected ingest layout".to_string())),
        };

        let outputs: Vec<EndpointOutputs> = enabled
            .iter()
            .map(|endpoint| self.endpoint_outputs(endpoint))
            .collect::<Result<_>>()?;

        debug!(
            "Built topology: {} ingest(s), {} display(s)",
            ingests.len(),
            outputs.len()
        );

        Ok(TopologyDescription {
            ingests,
            video_tee: video_tee(video_input),
            audio_tee: audio_tee(audio_input),
            outputs,
        })
    }

    fn ingests(&self, source: &SourceDescriptor) -> Result<Vec<Ingest>> {
        match source {
            SourceDescriptor::Local { path } => {
                let path = self.resolve_local(path);
                if !path.exists() {
                    return Err(Error::SourceNotFound(path));
                }
                Ok(vec![Ingest {
                    role: IngestRole::Combined,
                    location: IngestLocation::File(path),
                    decoder: "dec".to_string(),
                }])
            }
            SourceDescriptor::Remote {
                video_url,
                audio_url: Some(audio_url),
                ..
            } if self.separate_audio => Ok(vec![
                Ingest {
                    role: IngestRole::Video,
                    location: IngestLocation::Uri(video_url.clone()),
                    decoder: "vdec".to_string(),
                },
                Ingest {
                    role: IngestRole::Audio,
                    location: IngestLocation::Uri(audio_url.clone()),
                    decoder: "adec".to_string(),
                },
            ]),
            SourceDescriptor::Remote { video_url, .. } => Ok(vec![Ingest {
                role: IngestRole::Combined,
                location: IngestLocation::Uri(video_url.clone()),
                decoder: "dec".to_string(),
            }]),
        }
    }

    fn endpoint_outputs(&self, endpoint: &Endpoint) -> Result<EndpointOutputs> {
        let audio_port = endpoint.audio_port().ok_or_else(|| Error::PortOutOfRange {
            name: endpoint.name.clone(),
            port: endpoint.port,
        })?;

        let video = OutputBranch {
            tee: VIDEO_TEE.to_string(),
            chain: vec![
                Node::element("queue"),
                Node::element("videoconvert"),
                Node::element(&self.video.codec).property("bitrate", self.video.bitrate),
                video_payloader(&self.video.codec),
            ],
            destination: Destination {
                host: endpoint.host.clone(),
                port: endpoint.video_port(),
            },
        };

        let audio = OutputBranch {
            tee: AUDIO_TEE.to_string(),
            chain: vec![
                Node::element("queue"),
                Node::element("audioconvert"),
                Node::element("audioresample"),
                Node::element(&self.audio.codec).property("bitrate", self.audio.bitrate),
                audio_payloader(&self.audio.codec),
            ],
            destination: Destination {
                host: endpoint.host.clone(),
                port: audio_port,
            },
        };

        Ok(EndpointOutputs {
            endpoint: endpoint.name.clone(),
            video,
            audio,
        })
    }
}

impl Default for TopologyBuilder {
    fn default() -> Self {
        Self::new(EncodeSettings::video_default(), EncodeSettings::audio_default())
    }
}

fn video_tee(input: String) -> TeeStage {
    TeeStage {
        name: VIDEO_TEE.to_string(),
        input,
        chain: vec![
            Node::element("queue"),
            Node::element("videoconvert"),
            Node::element("videoscale"),
            Node::caps(format!(
                "video/x-raw,width={TARGET_WIDTH},height={TARGET_HEIGHT}"
            )),
        ],
    }
}

fn audio_tee(input: String) -> TeeStage {
    TeeStage {
        name: AUDIO_TEE.to_string(),
        input,
        chain: vec![
            Node::element("queue"),
            Node::element("audioconvert"),
            Node::element("audioresample"),
        ],
    }
}

/// RTP payloader matching a video encoder.
fn video_payloader(codec: &str) -> Node {
    let codec = codec.to_lowercase();
    if codec.contains("265") || codec.contains("hevc") {
        Node::element("rtph265pay")
            .property("config-interval", 1)
            .property("pt", 96)
    } else if codec.contains("vp8") {
        Node::element("rtpvp8pay").property("pt", 96)
    } else if codec.contains("vp9") {
        Node::element("rtpvp9pay").property("pt", 96)
    } else {
        Node::element("rtph264pay")
            .property("config-interval", 1)
            .property("pt", 96)
    }
}

/// RTP payloader matching an audio encoder.
fn audio_payloader(codec: &str) -> Node {
    let codec = codec.to_lowercase();
    if codec.contains("opus") {
        Node::element("rtpopuspay").property("pt", 97)
    } else if codec.contains("aac") {
        Node::element("rtpmp4apay").property("pt", 97)
    } else {
        Node::element("rtpmpapay").property("pt", 97)
    }
}
