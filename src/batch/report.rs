use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transcript::FailureKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessEntry {
    pub index: u32,
    pub video_id: String,
    pub title: String,
    pub segments: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub index: u32,
    pub video_id: String,
    pub title: String,
    pub error: FailureKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub index: u32,
    pub video_id: String,
    pub title: String,
    pub reason: String,
}

/// Report of one batch run, returned on every terminal transition.
///
/// The `successful`/`failed`/`skipped` lists mirror the job-state partitions
/// in ascending index order. Targets that were never scheduled (cut off by an
/// attempt cap) appear in none of the three.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist: Option<String>,

    #[serde(default)]
    pub started: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completed: Option<DateTime<Utc>>,

    pub total_videos: usize,

    pub accessible_videos: usize,

    pub successful: Vec<SuccessEntry>,

    pub failed: Vec<FailedEntry>,

    pub skipped: Vec<SkippedEntry>,

    pub ip_blocked: bool,

    /// Set when a storage write failed after its retry; results for this run
    /// are complete in memory but may be missing on disk.
    #[serde(default)]
    pub persistence_degraded: bool,
}

impl JobReport {
    /// One-line counts summary for logs and console output
    pub fn summary(&self) -> String {
        format!(
            "{} extracted, {} failed, {} skipped (of {} accessible)",
            self.successful.len(),
            self.failed.len(),
            self.skipped.len(),
            self.accessible_videos,
        )
    }
}
