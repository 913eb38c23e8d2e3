//! Transcript artifact writing.
//!
//! Lays files out as `<base>/<channel>/<NN_title>.<ext>` with a JSON report
//! alongside, mirroring the directory shape a channel archive wants.

use async_trait::async_trait;
use chrono::Utc;
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::batch::report::JobReport;
use crate::discover::{PlaylistInfo, VideoTarget};
use crate::transcript::Transcript;
use crate::TubescribeError;

/// Line width for wrapped transcript text in markdown output
const WRAP_WIDTH: usize = 80;

/// Longest sanitized file or folder stem
const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Destination for extracted transcripts.
///
/// The batch controller treats persistence as best-effort: a sink error
/// degrades the run but never fails the video.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn persist(
        &self,
        video: &VideoTarget,
        transcript: &Transcript,
    ) -> Result<PathBuf, TubescribeError>;
}

/// Strip filesystem-hostile characters and squash whitespace to underscores.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    truncate_name(&joined)
}

/// Like [`sanitize_filename`] but keeps single spaces, for directory names.
pub fn sanitize_folder_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_name(&joined)
}

fn truncate_name(name: &str) -> String {
    if name.is_empty() {
        return "untitled".to_string();
    }
    name.chars().take(MAX_NAME_LEN).collect()
}

/// Greedy word wrap. Words longer than the width get their own line.
fn wrap_text(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

/// JSON artifact body, one file per video
#[derive(Debug, Serialize)]
struct TranscriptDocument<'a> {
    video_id: &'a str,
    title: &'a str,
    url: String,
    language: &'a str,
    extracted_at: chrono::DateTime<Utc>,
    segment_count: usize,
    duration_seconds: f64,
    segments: &'a [crate::transcript::Segment],
}

/// Writes transcripts, playlist manifests, and run reports under a base
/// directory, one subdirectory per channel.
pub struct OutputManager {
    base_dir: PathBuf,
    channel_dir: PathBuf,
    format: OutputFormat,
}

impl OutputManager {
    pub fn new(base_dir: impl Into<PathBuf>, channel_name: &str, format: OutputFormat) -> Self {
        let base_dir = base_dir.into();
        let folder = sanitize_folder_name(channel_name);
        let channel_dir = base_dir.join(folder);
        Self {
            base_dir,
            channel_dir,
            format,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn channel_dir(&self) -> &Path {
        &self.channel_dir
    }

    fn ensure_channel_dir(&self) -> Result<(), TubescribeError> {
        fs::create_dir_all(&self.channel_dir)
            .map_err(|e| TubescribeError::Storage(format!("create {}: {e}", self.channel_dir.display())))
    }

    /// Path a transcript for this video will be written to
    pub fn transcript_path(&self, video: &VideoTarget) -> PathBuf {
        let title = if video.title.is_empty() {
            video.video_id.as_str()
        } else {
            video.title.as_str()
        };
        let stem = format!("{:02}_{}", video.index, sanitize_filename(title));
        self.channel_dir
            .join(format!("{stem}.{}", self.format.extension()))
    }

    /// True when an artifact for this video already exists on disk
    pub fn artifact_exists(&self, video: &VideoTarget) -> bool {
        self.transcript_path(video).exists()
    }

    fn render_markdown(&self, video: &VideoTarget, transcript: &Transcript) -> String {
        let title = transcript
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(if video.title.is_empty() {
                &video.video_id
            } else {
                &video.title
            });
        let minutes = transcript.total_duration() / 60.0;

        let mut out = String::new();
        out.push_str(&format!("# {title}\n\n"));
        out.push_str(&format!("**Video URL:** {}\n", video.watch_url()));
        out.push_str(&format!("**Language:** {}\n", transcript.language));
        out.push_str(&format!(
            "**Extracted:** {}\n",
            Utc::now().format("%Y-%m-%d %H:%M UTC")
        ));
        out.push_str(&format!("**Duration:** {minutes:.1} minutes\n"));
        out.push_str(&format!(
            "**Segments:** {}\n\n",
            transcript.segment_count()
        ));
        out.push_str("## Transcript\n\n");
        out.push_str(&wrap_text(&transcript.full_text(), WRAP_WIDTH));
        out.push('\n');
        out
    }

    fn render_json(
        &self,
        video: &VideoTarget,
        transcript: &Transcript,
    ) -> Result<String, TubescribeError> {
        let doc = TranscriptDocument {
            video_id: &transcript.video_id,
            title: transcript
                .title
                .as_deref()
                .filter(|t| !t.is_empty())
                .unwrap_or(&video.title),
            url: video.watch_url(),
            language: &transcript.language,
            extracted_at: Utc::now(),
            segment_count: transcript.segment_count(),
            duration_seconds: transcript.total_duration(),
            segments: &transcript.segments,
        };
        serde_json::to_string_pretty(&doc)
            .map_err(|e| TubescribeError::Storage(format!("encode transcript json: {e}")))
    }

    /// Write the playlist manifest next to the transcripts
    pub fn save_playlist_info(&self, info: &PlaylistInfo) -> Result<PathBuf, TubescribeError> {
        self.ensure_channel_dir()?;
        let path = self.channel_dir.join("playlist_info.json");
        crate::discover::manifest::save_playlist_manifest(info, &path)
    }

    /// Write the run report as `_extraction_report.json`. The leading
    /// underscore sorts it above the numbered transcripts.
    pub fn save_report(&self, report: &JobReport) -> Result<PathBuf, TubescribeError> {
        self.ensure_channel_dir()?;
        let path = self.channel_dir.join("_extraction_report.json");
        let body = serde_json::to_string_pretty(report)
            .map_err(|e| TubescribeError::Storage(format!("encode report: {e}")))?;
        fs::write(&path, body)
            .map_err(|e| TubescribeError::Storage(format!("write {}: {e}", path.display())))?;
        Ok(path)
    }
}

#[async_trait]
impl ArtifactSink for OutputManager {
    async fn persist(
        &self,
        video: &VideoTarget,
        transcript: &Transcript,
    ) -> Result<PathBuf, TubescribeError> {
        self.ensure_channel_dir()?;
        let path = self.transcript_path(video);
        let body = match self.format {
            OutputFormat::Markdown => self.render_markdown(video, transcript),
            OutputFormat::Json => self.render_json(video, transcript)?,
        };
        fs::write(&path, body)
            .map_err(|e| TubescribeError::Storage(format!("write {}: {e}", path.display())))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Segment;

    fn sample_transcript() -> Transcript {
        Transcript {
            video_id: "dQw4w9WgXcQ".to_string(),
            title: Some("Never Gonna Give You Up".to_string()),
            language: "en".to_string(),
            segments: vec![
                Segment {
                    text: "We're no strangers to love".to_string(),
                    start: 0.0,
                    duration: 4.0,
                },
                Segment {
                    text: "You know the rules and so do I".to_string(),
                    start: 4.0,
                    duration: 4.0,
                },
            ],
        }
    }

    fn sample_video() -> VideoTarget {
        VideoTarget::new(3, "dQw4w9WgXcQ", "Never Gonna Give You Up")
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Hello: World?"), "Hello_World");
        assert_eq!(sanitize_filename("a/b\\c|d*e"), "abcde");
        assert_eq!(sanitize_filename("  spaced   out  "), "spaced_out");
        assert_eq!(sanitize_filename("<>:\"/\\|?*"), "untitled");
    }

    #[test]
    fn test_sanitize_filename_truncates() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_filename(&long).len(), 100);
    }

    #[test]
    fn test_sanitize_folder_name_keeps_spaces() {
        assert_eq!(sanitize_folder_name("My  Channel: Live"), "My Channel Live");
    }

    #[test]
    fn test_wrap_text_respects_width() {
        let text = "one two three four five six seven eight nine ten".repeat(5);
        for line in wrap_text(&text, 20).lines() {
            assert!(line.len() <= 20, "line too long: {line:?}");
        }
    }

    #[test]
    fn test_wrap_text_long_word_gets_own_line() {
        let wrapped = wrap_text("short superduperextremelylongword short", 10);
        assert!(wrapped.lines().any(|l| l == "superduperextremelylongword"));
    }

    #[test]
    fn test_transcript_path_is_indexed_and_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let manager = OutputManager::new(dir.path(), "Rick Astley", OutputFormat::Markdown);
        let path = manager.transcript_path(&sample_video());
        assert!(path.ends_with("Rick Astley/03_Never_Gonna_Give_You_Up.md"));
    }

    #[tokio::test]
    async fn test_persist_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let manager = OutputManager::new(dir.path(), "Rick Astley", OutputFormat::Markdown);
        let path = manager
            .persist(&sample_video(), &sample_transcript())
            .await
            .unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("# Never Gonna Give You Up"));
        assert!(body.contains("**Video URL:** https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(body.contains("**Segments:** 2"));
        assert!(body.contains("We're no strangers to love"));
    }

    #[tokio::test]
    async fn test_persist_json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let manager = OutputManager::new(dir.path(), "Rick Astley", OutputFormat::Json);
        let path = manager
            .persist(&sample_video(), &sample_transcript())
            .await
            .unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["video_id"], "dQw4w9WgXcQ");
        assert_eq!(value["segment_count"], 2);
        assert_eq!(value["segments"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_save_report_writes_sorted_first() {
        let dir = tempfile::tempdir().unwrap();
        let manager = OutputManager::new(dir.path(), "Rick Astley", OutputFormat::Markdown);
        let report = JobReport::default();
        let path = manager.save_report(&report).unwrap();
        assert!(path.ends_with("Rick Astley/_extraction_report.json"));
        assert!(path.exists());
    }
}
