use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod innertube;

/// A single captioned segment with timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Segment text
    pub text: String,

    /// Start time in seconds
    pub start: f64,

    /// Duration in seconds
    pub duration: f64,
}

impl Segment {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Complete transcript for one video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub video_id: String,

    /// Video title, when the source exposes it
    pub title: Option<String>,

    /// Language code of the caption track actually used
    pub language: String,

    pub segments: Vec<Segment>,
}

impl Transcript {
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn total_duration(&self) -> f64 {
        self.segments.last().map(|s| s.end()).unwrap_or(0.0)
    }

    /// Full transcript text with segments joined by single spaces
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How the batch controller reacts to a failure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the video as failed and continue to the next target
    Skip,

    /// Halt the whole batch immediately
    StopAll,

    /// Retry the same video with SSL verification disabled
    RetryWithBypass,

    /// Retry the same video with escalating delays
    RetryWithBackoff,
}

/// Closed enumeration of per-video failure kinds.
///
/// The transcript-fetch collaborator must normalize every raw error into this
/// set before returning; the controller never sees anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureKind {
    TranscriptsDisabled,
    NoTranscriptFound,
    VideoUnavailable,
    IpBlocked,
    SslError,
    NetworkError,
}

impl FailureKind {
    pub const ALL: [FailureKind; 6] = [
        FailureKind::TranscriptsDisabled,
        FailureKind::NoTranscriptFound,
        FailureKind::VideoUnavailable,
        FailureKind::IpBlocked,
        FailureKind::SslError,
        FailureKind::NetworkError,
    ];

    /// Whether another attempt at the same video can possibly succeed
    pub fn recoverable(self) -> bool {
        matches!(self, FailureKind::SslError | FailureKind::NetworkError)
    }

    /// The controller policy for this kind. Total and deterministic.
    pub fn policy(self) -> FailurePolicy {
        match self {
            FailureKind::TranscriptsDisabled => FailurePolicy::Skip,
            FailureKind::NoTranscriptFound => FailurePolicy::Skip,
            FailureKind::VideoUnavailable => FailurePolicy::Skip,
            FailureKind::IpBlocked => FailurePolicy::StopAll,
            FailureKind::SslError => FailurePolicy::RetryWithBypass,
            FailureKind::NetworkError => FailurePolicy::RetryWithBackoff,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::TranscriptsDisabled => "transcripts disabled",
            FailureKind::NoTranscriptFound => "no transcript found",
            FailureKind::VideoUnavailable => "video unavailable",
            FailureKind::IpBlocked => "ip blocked",
            FailureKind::SslError => "ssl error",
            FailureKind::NetworkError => "network error",
        };
        write!(f, "{}", name)
    }
}

/// A normalized fetch failure
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Fail-safe classification of unstructured error text.
///
/// Used when a raw error reaches the fetch boundary without a structured
/// mapping. Anything unrecognized becomes `NetworkError` so the controller
/// never receives an unclassified failure.
pub fn classify_message(raw: &str) -> FailureKind {
    let upper = raw.to_uppercase();

    if upper.contains("BLOCK") || upper.contains("TOO MANY") || upper.contains("429") {
        return FailureKind::IpBlocked;
    }
    if upper.contains("SSL") || upper.contains("CERTIFICATE") || upper.contains("TLS") {
        return FailureKind::SslError;
    }
    if upper.contains("TRANSCRIPTS DISABLED") || upper.contains("CAPTIONS DISABLED") {
        return FailureKind::TranscriptsDisabled;
    }
    if upper.contains("NO TRANSCRIPT") || upper.contains("NO CAPTION") {
        return FailureKind::NoTranscriptFound;
    }
    if upper.contains("UNAVAILABLE") || upper.contains("PRIVATE") || upper.contains("DELETED") {
        return FailureKind::VideoUnavailable;
    }

    FailureKind::NetworkError
}

/// Trait for the transcript-fetch collaborator.
///
/// Implementations must normalize every error into a [`FailureKind`]; whether
/// to fall back to other caption languages when the requested one is missing
/// is the implementation's own concern.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// Fetch the transcript for one video in the given language.
    ///
    /// `bypass_ssl` is set by the controller when retrying after an
    /// [`FailureKind::SslError`].
    async fn fetch(
        &self,
        video_id: &str,
        language: &str,
        bypass_ssl: bool,
    ) -> Result<Transcript, FetchFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_is_total() {
        for kind in FailureKind::ALL {
            // Every kind maps to exactly one policy; the match in policy()
            // is exhaustive so this is a compile-time guarantee, exercised
            // here for the recoverability pairing.
            match kind.policy() {
                FailurePolicy::Skip | FailurePolicy::StopAll => {
                    assert!(!kind.recoverable(), "{kind} should not be recoverable");
                }
                FailurePolicy::RetryWithBypass | FailurePolicy::RetryWithBackoff => {
                    assert!(kind.recoverable(), "{kind} should be recoverable");
                }
            }
        }
    }

    #[test]
    fn test_ip_blocked_stops_all() {
        assert_eq!(FailureKind::IpBlocked.policy(), FailurePolicy::StopAll);
    }

    #[test]
    fn test_classify_ip_block_messages() {
        assert_eq!(
            classify_message("YouTube is blocking requests from your IP"),
            FailureKind::IpBlocked
        );
        assert_eq!(classify_message("Too many requests"), FailureKind::IpBlocked);
        assert_eq!(classify_message("HTTP 429"), FailureKind::IpBlocked);
    }

    #[test]
    fn test_classify_ssl_messages() {
        assert_eq!(
            classify_message("SSL certificate verify failed"),
            FailureKind::SslError
        );
        assert_eq!(
            classify_message("invalid peer certificate"),
            FailureKind::SslError
        );
    }

    #[test]
    fn test_classify_unrecognized_defaults_to_network_error() {
        assert_eq!(classify_message("something odd happened"), FailureKind::NetworkError);
        assert_eq!(classify_message(""), FailureKind::NetworkError);
    }

    #[test]
    fn test_full_text_joins_and_trims() {
        let t = Transcript {
            video_id: "dQw4w9WgXcQ".to_string(),
            title: None,
            language: "en".to_string(),
            segments: vec![
                Segment {
                    text: " hello ".to_string(),
                    start: 0.0,
                    duration: 1.0,
                },
                Segment {
                    text: "".to_string(),
                    start: 1.0,
                    duration: 1.0,
                },
                Segment {
                    text: "world".to_string(),
                    start: 2.0,
                    duration: 1.5,
                },
            ],
        };
        assert_eq!(t.full_text(), "hello world");
        assert_eq!(t.segment_count(), 3);
        assert!((t.total_duration() - 3.5).abs() < f64::EPSILON);
    }
}
