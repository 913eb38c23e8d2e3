use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{PlaylistInfo, VideoListProvider, VideoTarget};
use crate::resolver::{ChannelRef, Target};
use crate::TubescribeError;

const BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Environment variable consulted when no key is configured
pub const API_KEY_ENV: &str = "YOUTUBE_API_KEY";

const PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    snippet: Option<ItemSnippet>,
    content_details: Option<ItemContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemSnippet {
    title: Option<String>,
    position: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemContentDetails {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistListResponse {
    #[serde(default)]
    items: Vec<PlaylistResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistResource {
    snippet: Option<PlaylistSnippet>,
    content_details: Option<PlaylistContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistSnippet {
    title: Option<String>,
    channel_title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistContentDetails {
    item_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelResource {
    content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    snippet: Option<VideoSnippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: Option<String>,
    channel_title: Option<String>,
}

/// YouTube Data API v3 video list provider.
///
/// The key-based discovery path: immune to page-layout changes and consent
/// walls, but requires a Data API key from Google Cloud Console. Pages
/// through `playlistItems` at 50 entries per request.
pub struct DataApiProvider {
    client: reqwest::Client,
    api_key: String,
}

impl DataApiProvider {
    pub fn new(api_key: impl Into<String>) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    /// Build a provider from a configured key, falling back to the
    /// `YOUTUBE_API_KEY` environment variable. `None` when neither is set.
    pub fn from_config(configured: Option<&str>) -> crate::Result<Option<Self>> {
        let key = configured
            .filter(|k| !k.is_empty())
            .map(|k| k.to_string())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()));
        match key {
            Some(key) => Ok(Some(Self::new(key)?)),
            None => Ok(None),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, TubescribeError> {
        let url = format!("{}/{}", BASE_URL, endpoint);
        self.client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| TubescribeError::DiscoveryUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| TubescribeError::DiscoveryUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| TubescribeError::DiscoveryUnavailable(e.to_string()))
    }

    /// Page through a playlist's items, stopping early at `max_count`.
    async fn playlist_items(
        &self,
        playlist_id: &str,
        max_count: Option<usize>,
    ) -> Result<Vec<VideoTarget>, TubescribeError> {
        let page_size = PAGE_SIZE.to_string();
        let mut videos: Vec<VideoTarget> = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("part", "snippet,contentDetails"),
                ("playlistId", playlist_id),
                ("maxResults", page_size.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let resp: PlaylistItemsResponse = self.get_json("playlistItems", &params).await?;
            let next = collect_playlist_items(resp, &mut videos);

            if max_count.is_some_and(|max| videos.len() >= max) {
                videos.truncate(max_count.unwrap_or(videos.len()));
                break;
            }
            match next {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(videos)
    }

    /// Playlist title, channel, and claimed item count
    async fn playlist_meta(&self, playlist_id: &str) -> Result<(String, String, usize), TubescribeError> {
        let resp: PlaylistListResponse = self
            .get_json(
                "playlists",
                &[("part", "snippet,contentDetails"), ("id", playlist_id)],
            )
            .await?;

        let resource = resp.items.into_iter().next().ok_or_else(|| {
            TubescribeError::DiscoveryUnavailable(format!("playlist {} not found", playlist_id))
        })?;

        let (title, channel) = resource
            .snippet
            .map(|s| {
                (
                    s.title.unwrap_or_default(),
                    s.channel_title.unwrap_or_default(),
                )
            })
            .unwrap_or_default();
        let count = resource
            .content_details
            .and_then(|c| c.item_count)
            .unwrap_or(0);

        Ok((title, channel, count))
    }

    /// Resolve a channel reference to its uploads playlist ID
    async fn channel_uploads(&self, channel: &ChannelRef) -> Result<String, TubescribeError> {
        let params: [(&str, &str); 2] = match channel {
            ChannelRef::Id(id) => [("part", "contentDetails"), ("id", id)],
            ChannelRef::Handle(handle) => [("part", "contentDetails"), ("forHandle", handle)],
            ChannelRef::Legacy(name) => [("part", "contentDetails"), ("forUsername", name)],
        };

        let resp: ChannelListResponse = self.get_json("channels", &params).await?;
        resp.items
            .into_iter()
            .next()
            .and_then(|c| c.content_details)
            .and_then(|c| c.related_playlists)
            .and_then(|r| r.uploads)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                TubescribeError::DiscoveryUnavailable(format!(
                    "no uploads playlist found for {}",
                    channel.url()
                ))
            })
    }

    /// Title and channel for a single video
    async fn video_details(&self, video_id: &str) -> Result<(String, String), TubescribeError> {
        let resp: VideoListResponse = self
            .get_json("videos", &[("part", "snippet"), ("id", video_id)])
            .await?;

        let snippet = resp
            .items
            .into_iter()
            .next()
            .and_then(|v| v.snippet)
            .ok_or_else(|| {
                TubescribeError::DiscoveryUnavailable(format!("video {} not found", video_id))
            })?;

        Ok((
            snippet.title.unwrap_or_default(),
            snippet.channel_title.unwrap_or_default(),
        ))
    }

    async fn discover_playlist(
        &self,
        playlist_id: &str,
        max_count: Option<usize>,
    ) -> Result<PlaylistInfo, TubescribeError> {
        let videos = self.playlist_items(playlist_id, max_count).await?;
        if videos.is_empty() {
            return Err(TubescribeError::DiscoveryUnavailable(format!(
                "playlist {} has no accessible videos",
                playlist_id
            )));
        }

        // Metadata is cosmetic; a lookup failure should not sink the batch.
        let (title, channel_name, claimed_count) =
            self.playlist_meta(playlist_id).await.unwrap_or_else(|e| {
                tracing::debug!("Playlist metadata lookup failed: {}", e);
                (String::new(), String::new(), 0)
            });

        Ok(PlaylistInfo {
            playlist_id: playlist_id.to_string(),
            title,
            channel_name,
            channel_handle: None,
            channel_url: None,
            video_count: if claimed_count > 0 {
                claimed_count
            } else {
                videos.len()
            },
            videos,
        })
    }
}

/// Append one page of playlist items, returning the next page token.
/// Deleted or private entries (no video ID) are dropped.
fn collect_playlist_items(
    resp: PlaylistItemsResponse,
    videos: &mut Vec<VideoTarget>,
) -> Option<String> {
    for item in resp.items {
        let video_id = match item.content_details.and_then(|c| c.video_id) {
            Some(id) if !id.is_empty() => id,
            _ => continue,
        };
        let (title, position) = item
            .snippet
            .map(|s| (s.title.unwrap_or_default(), s.position))
            .unwrap_or_default();
        let index = position.map(|p| p + 1).unwrap_or(videos.len() as u32 + 1);
        videos.push(VideoTarget {
            index,
            video_id,
            title,
            duration: None,
        });
    }
    resp.next_page_token
}

#[async_trait]
impl VideoListProvider for DataApiProvider {
    async fn discover(
        &self,
        target: &Target,
        max_count: Option<usize>,
    ) -> Result<PlaylistInfo, TubescribeError> {
        let playlist_id = match target {
            Target::Playlist { playlist_id } => playlist_id.clone(),
            Target::Video {
                playlist_id: Some(playlist_id),
                ..
            } => playlist_id.clone(),
            Target::Video {
                video_id,
                playlist_id: None,
            } => {
                let (title, channel) = self.video_details(video_id).await?;
                return Ok(PlaylistInfo::single(
                    VideoTarget::new(1, video_id.clone(), title),
                    channel,
                ));
            }
            Target::Channel(channel) => self.channel_uploads(channel).await?,
        };

        self.discover_playlist(&playlist_id, max_count).await
    }
}
