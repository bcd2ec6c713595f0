//! `gst-launch-1.0` pipeline syntax.
//!
//! [`TopologyDescription::to_launch_args`] yields argv tokens for the child
//! process. The launcher escapes whitespace inside each argument itself, so
//! tokens are passed unquoted. [`TopologyDescription::to_pipeline_string`] is
//! the quoted, copy-pasteable form used for logging and dry runs.

use super::{Ingest, IngestLocation, Node, OutputBranch, TeeStage, TopologyDescription};

const LINK: &str = "!";

fn push_node(tokens: &mut Vec<String>, node: &Node) {
    match node {
        Node::Element {
            factory,
            properties,
        } => {
            tokens.push(factory.clone());
            tokens.extend(properties.iter().map(|(k, v)| format!("{k}={v}")));
        }
        Node::Caps { caps } => tokens.push(caps.clone()),
    }
}

fn push_chain(tokens: &mut Vec<String>, chain: &[Node]) {
    for node in chain {
        tokens.push(LINK.to_string());
        push_node(tokens, node);
    }
}

fn push_ingest(tokens: &mut Vec<String>, ingest: &Ingest) {
    match ingest.location {
        IngestLocation::File(ref path) => {
            tokens.push("filesrc".to_string());
            tokens.push(format!("location={}", path.display()));
            tokens.push(LINK.to_string());
            tokens.push("decodebin".to_string());
        }
        IngestLocation::Uri(ref uri) => {
            tokens.push("uridecodebin".to_string());
            tokens.push(format!("uri={uri}"));
        }
    }
    tokens.push(format!("name={}", ingest.decoder));
}

fn push_tee(tokens: &mut Vec<String>, stage: &TeeStage) {
    tokens.push(format!("{}.", stage.input));
    push_chain(tokens, &stage.chain);
    tokens.push(LINK.to_string());
    tokens.push("tee".to_string());
    tokens.push(format!("name={}", stage.name));
}

fn push_branch(tokens: &mut Vec<String>, branch: &OutputBranch) {
    tokens.push(format!("{}.", branch.tee));
    push_chain(tokens, &branch.chain);
    tokens.push(LINK.to_string());
    tokens.push("udpsink".to_string());
    tokens.push(format!("host={}", branch.destination.host));
    tokens.push(format!("port={}", branch.destination.port));
}

/// Quote the value half of `key=value` when it holds whitespace or quotes.
fn quote(token: &str) -> String {
    let needs_quotes = |s: &str| s.chars().any(|c| c.is_whitespace() || c == '"');
    match token.split_once('=') {
        Some((key, value)) if needs_quotes(value) => {
            format!("{key}=\"{}\"", value.replace('"', "\\\""))
        }
        _ if needs_quotes(token) => format!("\"{}\"", token.replace('"', "\\\"")),
        _ => token.to_string(),
    }
}

impl TopologyDescription {
    /// Argument vector for `gst-launch-1.0` (without leading options).
    pub fn to_launch_args(&self) -> Vec<String> {
        let mut tokens = Vec::new();
        for ingest in &self.ingests {
            push_ingest(&mut tokens, ingest);
        }
        push_tee(&mut tokens, &self.video_tee);
        push_tee(&mut tokens, &self.audio_tee);
        for branch in self.video_branches() {
            push_branch(&mut tokens, branch);
        }
        for branch in self.audio_branches() {
            push_branch(&mut tokens, branch);
        }
        tokens
    }

    /// Single-line pipeline description.
    pub fn to_pipeline_string(&self) -> String {
        self.to_launch_args()
            .iter()
            .map(String::as_str)
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceDescriptor;
    use crate::topology::{Endpoint, TopologyBuilder};

    #[test]
    fn local_pipeline_matches_expected_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.mp4");
        std::fs::write(&path, b"").unwrap();

        let topology = TopologyBuilder::default()
            .build(
                &SourceDescriptor::local(&path),
                &[
                    Endpoint::new("A", "10.0.0.2", 5000),
                    Endpoint::new("B", "10.0.0.3", 5001),
                ],
            )
            .unwrap();

        let expected = format!(
            "filesrc location={} ! decodebin name=dec \
             dec. ! queue ! videoconvert ! videoscale ! video/x-raw,width=1920,height=1080 ! tee name=video_tee \
             dec. ! queue ! audioconvert ! audioresample ! tee name=audio_tee \
             video_tee. ! queue ! videoconvert ! x264enc bitrate=2000 ! rtph264pay config-interval=1 pt=96 ! udpsink host=10.0.0.2 port=5000 \
             video_tee. ! queue ! videoconvert ! x264enc bitrate=2000 ! rtph264pay config-interval=1 pt=96 ! udpsink host=10.0.0.3 port=5001 \
             audio_tee. ! queue ! audioconvert ! audioresample ! lamemp3enc bitrate=128 ! rtpmpapay pt=97 ! udpsink host=10.0.0.2 port=5100 \
             audio_tee. ! queue ! audioconvert ! audioresample ! lamemp3enc bitrate=128 ! rtpmpapay pt=97 ! udpsink host=10.0.0.3 port=5101",
            path.display()
        );
        assert_eq!(topology.to_pipeline_string(), expected);
    }

    #[test]
    fn paths_with_spaces_stay_one_argument() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my movie.mp4");
        std::fs::write(&path, b"").unwrap();

        let topology = TopologyBuilder::default()
            .build(&SourceDescriptor::local(&path), &[Endpoint::new("A", "h", 5000)])
            .unwrap();

        let args = topology.to_launch_args();
        assert_eq!(args[1], format!("location={}", path.display()));
        assert!(topology
            .to_pipeline_string()
            .contains(&format!("location=\"{}\"", path.display())));
    }

    #[test]
    fn separate_audio_uses_named_decoders() {
        use crate::source::RemoteMetadata;
        let source = SourceDescriptor::Remote {
            video_url: "https://media.example/v.mp4?a=1&b=2".into(),
            audio_url: Some("https://media.example/a.webm".into()),
            metadata: RemoteMetadata {
                id: "abc12345678".into(),
                title: "T".into(),
                description: String::new(),
                duration_seconds: 1,
                uploader: "U".into(),
                thumbnail_url: None,
                is_live: false,
                original_url: "https://youtu.be/abc12345678".into(),
                extracted_at: chrono::Utc::now(),
            },
        };
        let args = TopologyBuilder::default()
            .build(&source, &[Endpoint::new("A", "h", 5000)])
            .unwrap()
            .to_launch_args();
        let line = args.join(" ");
        assert!(line.starts_with(
            "uridecodebin uri=https://media.example/v.mp4?a=1&b=2 name=vdec \
             uridecodebin uri=https://media.example/a.webm name=adec vdec. ! queue"
        ));
        assert!(line.contains("adec. ! queue ! audioconvert"));
    }

    #[test]
    fn quoting() {
        assert_eq!(quote("name=dec"), "name=dec");
        assert_eq!(quote("location=/a b/c.mp4"), "location=\"/a b/c.mp4\"");
        assert_eq!(quote("!"), "!");
    }
}
