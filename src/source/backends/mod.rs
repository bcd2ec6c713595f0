//! Extraction backend implementations

pub mod ytdlp;

pub use ytdlp::YtDlpBackend;
