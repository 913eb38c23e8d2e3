//! Tubescribe - YouTube transcript extraction with resumable batch jobs
//!
//! This library retrieves text transcripts for YouTube videos, playlists, and
//! channels and organizes the results on disk. The core component is the batch
//! extraction controller: it drives sequential per-video attempts against a
//! rate-limited remote service, classifies failures, halts on IP blocking, and
//! persists job state so interrupted runs can be resumed or retried.

pub mod batch;
pub mod cli;
pub mod config;
pub mod discover;
pub mod output;
pub mod resolver;
pub mod transcript;

pub use batch::report::JobReport;
pub use batch::state::JobState;
pub use batch::{BatchExtractor, BatchOptions};
pub use config::Config;
pub use discover::{PlaylistInfo, VideoListProvider, VideoTarget};
pub use resolver::{resolve, Target};
pub use transcript::{FailureKind, Transcript, TranscriptFetcher};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types for the hard (non-per-video) failure paths
#[derive(thiserror::Error, Debug)]
pub enum TubescribeError {
    #[error("Unrecognized YouTube URL or handle: {0}")]
    UnrecognizedUrl(String),

    #[error("Video list discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
