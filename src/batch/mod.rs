use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub mod rate;
pub mod report;
pub mod state;

use crate::discover::{PlaylistInfo, VideoTarget};
use crate::output::ArtifactSink;
use crate::transcript::{FailureKind, FailurePolicy, Transcript, TranscriptFetcher};
use rate::RateController;
use report::{FailedEntry, JobReport, SkippedEntry, SuccessEntry};
use state::{JobState, JobStateStore};

/// Reason recorded for targets abandoned when a batch halts
const IP_BLOCK_SKIP_REASON: &str = "ip blocked during extraction";

/// Configuration for one batch run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Skip targets already recorded as successful in prior state
    pub skip_existing: bool,

    /// Attempt only targets in the prior state's failed set
    pub retry_failed_only: bool,

    /// Cap on fetch attempts this run; skips don't count against it
    pub max_videos: Option<usize>,

    /// Preferred caption language
    pub language: String,

    /// Delay between successful attempts
    pub rate_limit: Duration,

    /// Attempts per video for the recoverable failure kinds
    pub max_fetch_attempts: u32,

    /// Allow retrying SSL failures with certificate verification disabled
    pub ssl_bypass: bool,

    /// Draw a progress bar while extracting
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            skip_existing: true,
            retry_failed_only: false,
            max_videos: None,
            language: "en".to_string(),
            rate_limit: rate::BASE_DELAY,
            max_fetch_attempts: 3,
            ssl_bypass: true,
            show_progress: false,
        }
    }
}

/// Outcome of one target after its retry budget
enum Attempted {
    Success(Transcript),
    Failed(FailureKind),
    Cancelled,
}

/// The batch extraction controller.
///
/// Drives strictly sequential per-video extraction over an ordered target
/// list: consults the rate controller for inter-attempt delays, dispatches on
/// the failure policy of each classified failure, halts unconditionally on an
/// IP block, and keeps a resumable [`JobState`] current throughout.
///
/// A controller instance performs one run and is then discarded; resumption
/// is a new instance loading the persisted state. Per-video failures never
/// escape [`BatchExtractor::run`] — the caller always gets a well-formed
/// report.
pub struct BatchExtractor {
    fetcher: Arc<dyn TranscriptFetcher>,
    sink: Arc<dyn ArtifactSink>,
    store: Arc<dyn JobStateStore>,
    options: BatchOptions,
    cancel: CancellationToken,
}

impl BatchExtractor {
    pub fn new(
        fetcher: Arc<dyn TranscriptFetcher>,
        sink: Arc<dyn ArtifactSink>,
        store: Arc<dyn JobStateStore>,
        options: BatchOptions,
    ) -> Self {
        Self {
            fetcher,
            sink,
            store,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token (e.g. wired to Ctrl-C)
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the batch over the discovered video list.
    ///
    /// `key` identifies this batch in the job-state store (typically the
    /// playlist ID). Targets are attempted in ascending index order; the only
    /// reordering exception is the immediate halt on an IP block.
    pub async fn run(&self, key: &str, info: &PlaylistInfo) -> JobReport {
        let started = Utc::now();

        let mut state = match self.store.load(key).await {
            Ok(Some(prior)) => {
                tracing::info!(
                    "Resuming batch '{}': {} successful, {} failed, {} skipped previously",
                    key,
                    prior.successful.len(),
                    prior.failed.len(),
                    prior.skipped.len(),
                );
                prior
            }
            Ok(None) => JobState::default(),
            Err(e) => {
                tracing::warn!("Could not load prior job state for '{}': {}; starting fresh", key, e);
                JobState::default()
            }
        };
        // A new run gets a fresh chance regardless of how the last one ended.
        state.ip_blocked = false;

        let prior_failed: BTreeSet<String> = state.failed.keys().cloned().collect();

        let mut targets: Vec<VideoTarget> = info.videos.clone();
        targets.sort_by_key(|v| v.index);

        let mut rate = RateController::new(self.options.rate_limit);
        let mut skip_reasons: BTreeMap<String, String> = BTreeMap::new();
        let mut degraded = false;
        let mut attempts = 0usize;
        let mut halted = false;
        let mut cancelled = false;

        let progress = if self.options.show_progress {
            let bar = ProgressBar::new(targets.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap(),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        for (position, video) in targets.iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            if self.options.retry_failed_only && !prior_failed.contains(&video.video_id) {
                progress.inc(1);
                continue;
            }

            if self.options.skip_existing && state.is_successful(&video.video_id) {
                tracing::debug!("Already extracted, skipping: {}", video.video_id);
                progress.inc(1);
                continue;
            }

            if let Some(max) = self.options.max_videos {
                if attempts >= max {
                    tracing::info!("Attempt cap of {} reached", max);
                    break;
                }
            }

            attempts += 1;
            progress.set_message(video.title.clone());
            tracing::info!(
                index = video.index,
                video_id = %video.video_id,
                "Extracting transcript"
            );

            match self.attempt(video, &mut rate).await {
                Attempted::Success(transcript) => {
                    tracing::info!(
                        video_id = %video.video_id,
                        segments = transcript.segment_count(),
                        "Transcript extracted"
                    );
                    state.record_success(&video.video_id, transcript.segment_count());
                    self.persist_artifact(video, &transcript, &mut degraded).await;
                    self.persist_state(key, &state, &mut degraded).await;
                    rate.record_success();
                    progress.inc(1);

                    if position + 1 < targets.len() && !self.pause(rate.success_delay()).await {
                        cancelled = true;
                        break;
                    }
                }
                Attempted::Failed(kind) => {
                    state.record_failure(&video.video_id, kind);
                    progress.inc(1);

                    if kind.policy() == FailurePolicy::StopAll {
                        tracing::error!(
                            video_id = %video.video_id,
                            "IP blocked by the remote service, halting batch"
                        );
                        for remaining in &targets[position + 1..] {
                            if !state.is_successful(&remaining.video_id) {
                                state.record_skipped(&remaining.video_id);
                                skip_reasons.insert(
                                    remaining.video_id.clone(),
                                    IP_BLOCK_SKIP_REASON.to_string(),
                                );
                            }
                        }
                        state.ip_blocked = true;
                        halted = true;
                        break;
                    }

                    // Exhausted recoverable failures keep the error delay;
                    // non-recoverable skips move on at the normal pace.
                    let delay = if kind.recoverable() {
                        rate.failure_delay()
                    } else {
                        rate.success_delay()
                    };
                    if position + 1 < targets.len() && !self.pause(delay).await {
                        cancelled = true;
                        break;
                    }
                }
                Attempted::Cancelled => {
                    cancelled = true;
                    break;
                }
            }
        }
        progress.finish_and_clear();

        // Persist on every terminal transition, including manual halts.
        self.persist_state(key, &state, &mut degraded).await;

        if halted {
            tracing::warn!("Batch '{}' halted: ip blocked", key);
        } else if cancelled {
            tracing::warn!("Batch '{}' cancelled; state persisted for resume", key);
        } else {
            tracing::info!("Batch '{}' completed", key);
        }

        build_report(info, &targets, &state, &skip_reasons, started, degraded)
    }

    /// One target through its retry budget.
    ///
    /// Skip and stop-all kinds return after the first failure; the
    /// recoverable kinds retry up to `max_fetch_attempts` with escalating
    /// delays, switching to the SSL-bypass client after an SSL failure.
    async fn attempt(&self, video: &VideoTarget, rate: &mut RateController) -> Attempted {
        let max_attempts = self.options.max_fetch_attempts.max(1);
        let mut bypass_ssl = false;

        for attempt in 0..max_attempts {
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return Attempted::Cancelled,
                outcome = self.fetcher.fetch(&video.video_id, &self.options.language, bypass_ssl) => outcome,
            };

            match outcome {
                Ok(transcript) => return Attempted::Success(transcript),
                Err(failure) => {
                    tracing::warn!(
                        video_id = %video.video_id,
                        attempt = attempt + 1,
                        error = %failure,
                        "Transcript fetch failed"
                    );
                    match failure.kind.policy() {
                        FailurePolicy::Skip | FailurePolicy::StopAll => {
                            return Attempted::Failed(failure.kind);
                        }
                        FailurePolicy::RetryWithBypass => {
                            if self.options.ssl_bypass {
                                bypass_ssl = true;
                            }
                        }
                        FailurePolicy::RetryWithBackoff => {}
                    }

                    rate.record_failure();
                    if attempt + 1 >= max_attempts {
                        return Attempted::Failed(failure.kind);
                    }
                    if !self.pause(rate.failure_delay()).await {
                        return Attempted::Cancelled;
                    }
                }
            }
        }

        // Loop always returns; fail-safe mirrors the classifier default.
        Attempted::Failed(FailureKind::NetworkError)
    }

    /// Cancellable sleep. Returns false when cancelled mid-delay.
    async fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn persist_artifact(&self, video: &VideoTarget, transcript: &Transcript, degraded: &mut bool) {
        for attempt in 0..2 {
            match self.sink.persist(video, transcript).await {
                Ok(path) => {
                    tracing::debug!("Saved transcript: {}", path.display());
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        video_id = %video.video_id,
                        attempt = attempt + 1,
                        "Artifact write failed: {}",
                        e
                    );
                }
            }
        }
        *degraded = true;
    }

    async fn persist_state(&self, key: &str, state: &JobState, degraded: &mut bool) {
        for attempt in 0..2 {
            match self.store.save(key, state).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, "Job state write failed: {}", e);
                }
            }
        }
        *degraded = true;
    }
}

/// Assemble the report from the final partitions, in ascending index order.
/// Targets in no partition (cut off by the attempt cap) are absent entirely.
fn build_report(
    info: &PlaylistInfo,
    targets: &[VideoTarget],
    state: &JobState,
    skip_reasons: &BTreeMap<String, String>,
    started: chrono::DateTime<Utc>,
    degraded: bool,
) -> JobReport {
    let mut report = JobReport {
        channel: Some(info.channel_name.clone()).filter(|c| !c.is_empty()),
        playlist: Some(info.title.clone()).filter(|t| !t.is_empty()),
        started: Some(started),
        completed: Some(Utc::now()),
        total_videos: if info.video_count > 0 {
            info.video_count
        } else {
            info.videos.len()
        },
        accessible_videos: info.videos.len(),
        ip_blocked: state.ip_blocked,
        persistence_degraded: degraded,
        ..Default::default()
    };

    for video in targets {
        if let Some(&segments) = state.successful.get(&video.video_id) {
            report.successful.push(SuccessEntry {
                index: video.index,
                video_id: video.video_id.clone(),
                title: video.title.clone(),
                segments,
            });
        } else if let Some(&error) = state.failed.get(&video.video_id) {
            report.failed.push(FailedEntry {
                index: video.index,
                video_id: video.video_id.clone(),
                title: video.title.clone(),
                error,
            });
        } else if state.skipped.contains(&video.video_id) {
            let reason = skip_reasons
                .get(&video.video_id)
                .cloned()
                .unwrap_or_else(|| "skipped in a previous run".to_string());
            report.skipped.push(SkippedEntry {
                index: video.index,
                video_id: video.video_id.clone(),
                title: video.title.clone(),
                reason,
            });
        }
    }

    report
}
