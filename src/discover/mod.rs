use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::resolver::Target;
use crate::TubescribeError;

pub mod api;
pub mod manifest;
pub mod scrape;

/// A video discovered in a playlist or channel listing.
///
/// Identity is `video_id`; `index` only defines presentation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoTarget {
    #[serde(default)]
    pub index: u32,

    #[serde(alias = "id")]
    pub video_id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl VideoTarget {
    pub fn new(index: u32, video_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            index,
            video_id: video_id.into(),
            title: title.into(),
            duration: None,
        }
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

/// An ordered video list with its channel/playlist context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistInfo {
    pub playlist_id: String,

    pub title: String,

    pub channel_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_handle: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_url: Option<String>,

    /// Total videos the playlist claims to contain; may exceed the number of
    /// accessible entries when some are hidden or unlisted
    pub video_count: usize,

    pub videos: Vec<VideoTarget>,
}

impl PlaylistInfo {
    pub fn accessible_count(&self) -> usize {
        self.videos.len()
    }

    /// Build a single-video pseudo-playlist so one video flows through the
    /// same batch machinery as a full playlist.
    pub fn single(video: VideoTarget, channel_name: impl Into<String>) -> Self {
        Self {
            playlist_id: String::new(),
            title: String::new(),
            channel_name: channel_name.into(),
            channel_handle: None,
            channel_url: None,
            video_count: 1,
            videos: vec![video],
        }
    }
}

/// Capability selection for the video list provider.
///
/// Which method actually runs is the provider's concern; the batch controller
/// never sees this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DiscoveryMethod {
    /// Pick the best available method
    #[default]
    Auto,

    /// YouTube Data API (requires an API key)
    Api,

    /// Browser automation
    Browser,

    /// Plain HTTP scraping
    Http,
}

impl std::fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryMethod::Auto => write!(f, "auto"),
            DiscoveryMethod::Api => write!(f, "api"),
            DiscoveryMethod::Browser => write!(f, "browser"),
            DiscoveryMethod::Http => write!(f, "http"),
        }
    }
}

/// Trait for the video-list discovery collaborator
#[async_trait]
pub trait VideoListProvider: Send + Sync {
    /// Yield the ordered video list for a playlist or channel target.
    async fn discover(
        &self,
        target: &Target,
        max_count: Option<usize>,
    ) -> Result<PlaylistInfo, TubescribeError>;
}
