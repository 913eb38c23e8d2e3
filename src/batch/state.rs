use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::transcript::FailureKind;
use crate::TubescribeError;

/// Persistent progress for one batch target.
///
/// `successful`, `failed`, and `skipped` partition the attempted subset of
/// video IDs and stay pairwise disjoint; every mutation goes through the
/// `record_*` methods which maintain that invariant. Exactly one controller
/// run owns a `JobState` at a time.
///
/// `successful` carries segment counts so a resumed run can reproduce its
/// report without refetching anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    #[serde(default)]
    pub successful: BTreeMap<String, usize>,

    #[serde(default)]
    pub failed: BTreeMap<String, FailureKind>,

    #[serde(default)]
    pub skipped: BTreeSet<String>,

    #[serde(default)]
    pub ip_blocked: bool,
}

impl JobState {
    pub fn record_success(&mut self, video_id: &str, segments: usize) {
        self.failed.remove(video_id);
        self.skipped.remove(video_id);
        self.successful.insert(video_id.to_string(), segments);
    }

    pub fn record_failure(&mut self, video_id: &str, kind: FailureKind) {
        if self.successful.contains_key(video_id) {
            return;
        }
        self.skipped.remove(video_id);
        self.failed.insert(video_id.to_string(), kind);
    }

    pub fn record_skipped(&mut self, video_id: &str) {
        if self.successful.contains_key(video_id) {
            return;
        }
        self.failed.remove(video_id);
        self.skipped.insert(video_id.to_string());
    }

    pub fn is_successful(&self, video_id: &str) -> bool {
        self.successful.contains_key(video_id)
    }

    pub fn is_failed(&self, video_id: &str) -> bool {
        self.failed.contains_key(video_id)
    }

    pub fn attempted(&self, video_id: &str) -> bool {
        self.successful.contains_key(video_id)
            || self.failed.contains_key(video_id)
            || self.skipped.contains(video_id)
    }

    /// Partition invariant check, used by tests
    pub fn partitions_disjoint(&self) -> bool {
        self.successful.keys().all(|id| !self.failed.contains_key(id) && !self.skipped.contains(id))
            && self.failed.keys().all(|id| !self.skipped.contains(id))
    }
}

/// Trait for the job-state persistence collaborator
#[async_trait]
pub trait JobStateStore: Send + Sync {
    /// Load prior state for a batch key, or `None` for a fresh batch.
    async fn load(&self, key: &str) -> Result<Option<JobState>, TubescribeError>;

    /// Persist the current state for a batch key.
    async fn save(&self, key: &str, state: &JobState) -> Result<(), TubescribeError>;
}

/// JSON-file-backed store: one `<key>.state.json` per batch under a directory.
pub struct JsonStateStore {
    dir: PathBuf,
}

impl JsonStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.state.json", safe))
    }
}

#[async_trait]
impl JobStateStore for JsonStateStore {
    async fn load(&self, key: &str) -> Result<Option<JobState>, TubescribeError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs_err::read_to_string(&path)
            .map_err(|e| TubescribeError::Storage(format!("{}: {}", path.display(), e)))?;
        let state = serde_json::from_str(&content)
            .map_err(|e| TubescribeError::Storage(format!("corrupt job state {}: {}", path.display(), e)))?;
        Ok(Some(state))
    }

    async fn save(&self, key: &str, state: &JobState) -> Result<(), TubescribeError> {
        fs_err::create_dir_all(&self.dir).map_err(|e| TubescribeError::Storage(e.to_string()))?;

        let path = self.path_for(key);
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| TubescribeError::Storage(e.to_string()))?;
        fs_err::write(&path, content)
            .map_err(|e| TubescribeError::Storage(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitions_stay_disjoint_across_transitions() {
        let mut state = JobState::default();

        state.record_failure("v1", FailureKind::NetworkError);
        state.record_skipped("v2");
        state.record_success("v3", 10);
        assert!(state.partitions_disjoint());

        // Retry of a failed video that now succeeds
        state.record_success("v1", 5);
        assert!(state.partitions_disjoint());
        assert!(state.is_successful("v1"));
        assert!(!state.is_failed("v1"));

        // Attempt of a previously skipped video that fails
        state.record_failure("v2", FailureKind::TranscriptsDisabled);
        assert!(state.partitions_disjoint());
        assert!(state.is_failed("v2"));
    }

    #[test]
    fn test_success_is_never_downgraded() {
        let mut state = JobState::default();
        state.record_success("v1", 10);
        state.record_failure("v1", FailureKind::NetworkError);
        state.record_skipped("v1");
        assert!(state.is_successful("v1"));
        assert!(state.partitions_disjoint());
    }

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path());

        assert!(store.load("PLtest").await.unwrap().is_none());

        let mut state = JobState::default();
        state.record_success("aaaaaaaaaaa", 42);
        state.record_failure("bbbbbbbbbbb", FailureKind::IpBlocked);
        state.record_skipped("ccccccccccc");
        state.ip_blocked = true;

        store.save("PLtest", &state).await.unwrap();
        let loaded = store.load("PLtest").await.unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_json_store_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path());

        let state = JobState::default();
        store.save("weird/key name", &state).await.unwrap();
        assert!(store.load("weird/key name").await.unwrap().is_some());
    }
}
