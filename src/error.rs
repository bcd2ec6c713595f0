//! Error types for the orchestration engine.
//!
//! Every failure maps onto one of four kinds (see [`ErrorKind`]); the engine
//! façade turns them into structured outcomes instead of letting them reach
//! the caller as raw errors.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Coarse failure category reported alongside every error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad or missing caller input.
    Validation,
    /// Unknown stream id or missing local media.
    NotFound,
    /// Remote reference could not be turned into fetchable locations.
    Resolution,
    /// Child process could not be launched or supervised.
    Process,
}

/// Engine errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("No display endpoints provided")]
    NoEndpoints,

    #[error("Stream id must not be empty")]
    EmptyStreamId,

    #[error("Displays {first} and {second} both transmit to {host}:{port}")]
    PortCollision {
        first: String,
        second: String,
        host: String,
        port: u16,
    },

    #[error("Display {name}: port {port} leaves no room for the audio port offset")]
    PortOutOfRange { name: String, port: u16 },

    #[error("Stream {0} already exists")]
    AlreadyActive(String),

    #[error("Stream {0} is still starting")]
    Busy(String),

    #[error("Engine is shutting down")]
    ShuttingDown,

    #[error("Stream {0} not found")]
    StreamNotFound(String),

    #[error("Media file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Not a valid YouTube URL: {0}")]
    MalformedReference(String),

    #[error("Remote sources are disabled")]
    RemoteDisabled,

    #[error("Video duration {duration}s exceeds limit {limit}s")]
    DurationExceeded { duration: u64, limit: u64 },

    #[error("Video not accessible or private: {0}")]
    Unavailable(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("No playable format for {0}")]
    NoPlayableFormat(String),

    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process error: {0}")]
    Process(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoEndpoints
            | Self::EmptyStreamId
            | Self::PortCollision { .. }
            | Self::PortOutOfRange { .. }
            | Self::AlreadyActive(_)
            | Self::Busy(_)
            | Self::ShuttingDown => ErrorKind::Validation,
            Self::StreamNotFound(_) | Self::SourceNotFound(_) => ErrorKind::NotFound,
            Self::MalformedReference(_)
            | Self::RemoteDisabled
            | Self::DurationExceeded { .. }
            | Self::Unavailable(_)
            | Self::Extraction(_)
            | Self::NoPlayableFormat(_)
            | Self::Json(_) => ErrorKind::Resolution,
            Self::Spawn { .. } | Self::Process(_) | Self::Io(_) => ErrorKind::Process,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
