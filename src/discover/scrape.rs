use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::time::Duration;

use super::{PlaylistInfo, VideoListProvider, VideoTarget};
use crate::resolver::{ChannelRef, Target};
use crate::TubescribeError;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// HTTP playlist scraper.
///
/// Parses the `ytInitialData` blob YouTube embeds in playlist pages, with a
/// regex fallback over the raw HTML when the blob is missing or malformed.
/// YouTube consent pages can still block this in some regions; the manifest
/// path exists for exactly that case.
pub struct HttpScraper {
    client: reqwest::Client,
}

impl HttpScraper {
    pub fn new() -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    async fn get_html(&self, url: &str) -> Result<String, TubescribeError> {
        self.client
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.9")
            // Pre-acknowledged consent cookie bypasses the EU consent page
            .header("Cookie", "CONSENT=YES+cb")
            .send()
            .await
            .map_err(|e| TubescribeError::DiscoveryUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| TubescribeError::DiscoveryUnavailable(e.to_string()))?
            .text()
            .await
            .map_err(|e| TubescribeError::DiscoveryUnavailable(e.to_string()))
    }

    /// Scrape a playlist page into an ordered video list.
    pub async fn get_playlist_info(&self, playlist_id: &str) -> Result<PlaylistInfo, TubescribeError> {
        let url = format!("https://www.youtube.com/playlist?list={}", playlist_id);
        tracing::info!("Scraping playlist: {}", url);

        let html = self.get_html(&url).await?;
        Ok(parse_playlist_html(playlist_id, &html))
    }

    /// Resolve a channel reference to its uploads playlist.
    ///
    /// Channel IDs map directly (`UC...` -> `UU...`); handles and legacy names
    /// need one page fetch to find the canonical channel ID first.
    pub async fn resolve_channel_uploads(&self, channel: &ChannelRef) -> Result<String, TubescribeError> {
        if let ChannelRef::Id(id) = channel {
            if let Some(rest) = id.strip_prefix("UC") {
                return Ok(format!("UU{}", rest));
            }
        }

        let html = self.get_html(&channel.url()).await?;
        let channel_id = extract_channel_id(&html).ok_or_else(|| {
            TubescribeError::DiscoveryUnavailable(format!(
                "could not find channel ID on page for {}",
                channel.url()
            ))
        })?;

        match channel_id.strip_prefix("UC") {
            Some(rest) => Ok(format!("UU{}", rest)),
            None => Err(TubescribeError::DiscoveryUnavailable(format!(
                "unexpected channel ID format: {}",
                channel_id
            ))),
        }
    }

    /// Fetch title and channel for a single video via the oEmbed endpoint.
    /// No API key required; failures degrade to a placeholder title.
    pub async fn fetch_video_info(&self, video_id: &str) -> (String, String) {
        let oembed_url = format!(
            "https://www.youtube.com/oembed?url=https://www.youtube.com/watch?v={}&format=json",
            video_id
        );

        match self.get_html(&oembed_url).await {
            Ok(body) => match serde_json::from_str::<Value>(&body) {
                Ok(data) => {
                    let title = data["title"]
                        .as_str()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("Video {}", video_id));
                    let channel = data["author_name"]
                        .as_str()
                        .unwrap_or("unknown")
                        .to_string();
                    (title, channel)
                }
                Err(_) => (format!("Video {}", video_id), "unknown".to_string()),
            },
            Err(e) => {
                tracing::debug!("oEmbed lookup failed for {}: {}", video_id, e);
                (format!("Video {}", video_id), "unknown".to_string())
            }
        }
    }
}

#[async_trait]
impl VideoListProvider for HttpScraper {
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
                let (title, channel) = self.fetch_video_info(video_id).await;
                return Ok(PlaylistInfo::single(
                    VideoTarget::new(1, video_id.clone(), title),
                    channel,
                ));
            }
            Target::Channel(channel) => self.resolve_channel_uploads(channel).await?,
        };

        let mut info = self.get_playlist_info(&playlist_id).await?;

        if info.videos.is_empty() {
            return Err(TubescribeError::DiscoveryUnavailable(format!(
                "no videos found in playlist {} (scraping may be blocked; try a JSON manifest)",
                playlist_id
            )));
        }

        if let Some(max) = max_count {
            info.videos.truncate(max);
        }

        Ok(info)
    }
}

fn parse_playlist_html(playlist_id: &str, html: &str) -> PlaylistInfo {
    if let Some(data) = extract_initial_data(html) {
        let info = parse_initial_data(playlist_id, &data);
        if !info.videos.is_empty() {
            return info;
        }
    }

    parse_html_fallback(playlist_id, html)
}

/// Pull the `ytInitialData` JSON blob out of the page
fn extract_initial_data(html: &str) -> Option<Value> {
    let patterns = [
        r"(?s)var ytInitialData = (\{.*?\});",
        r#"(?s)window\["ytInitialData"\] = (\{.*?\});"#,
    ];
    for pattern in patterns {
        let re = Regex::new(pattern).ok()?;
        if let Some(caps) = re.captures(html) {
            if let Ok(value) = serde_json::from_str::<Value>(&caps[1]) {
                return Some(value);
            }
        }
    }
    None
}

fn extract_channel_id(html: &str) -> Option<String> {
    Regex::new(r#""channelId"\s*:\s*"(UC[a-zA-Z0-9_-]+)""#)
        .ok()?
        .captures(html)
        .map(|caps| caps[1].to_string())
}

/// Navigate the ytInitialData structure for playlist header and contents
fn parse_initial_data(playlist_id: &str, data: &Value) -> PlaylistInfo {
    let mut info = PlaylistInfo {
        playlist_id: playlist_id.to_string(),
        ..Default::default()
    };

    if let Some(header) = data.pointer("/header/playlistHeaderRenderer") {
        info.title = header
            .pointer("/title/simpleText")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        if let Some(owner) = header.pointer("/ownerText/runs/0") {
            info.channel_name = owner
                .pointer("/text")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            if let Some(base_url) = owner
                .pointer("/navigationEndpoint/browseEndpoint/canonicalBaseUrl")
                .and_then(Value::as_str)
            {
                info.channel_url = Some(format!("https://www.youtube.com{}", base_url));
                if let Some(handle) = base_url.strip_prefix("/@") {
                    info.channel_handle = Some(handle.to_string());
                }
            }
        }

        if let Some(stats) = header.pointer("/stats").and_then(Value::as_array) {
            for stat in stats {
                let text = stat
                    .pointer("/simpleText")
                    .and_then(Value::as_str)
                    .or_else(|| stat.pointer("/runs/0/text").and_then(Value::as_str))
                    .unwrap_or("");
                if text.to_lowercase().contains("video") {
                    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
                    if let Ok(count) = digits.parse::<usize>() {
                        info.video_count = count;
                        break;
                    }
                }
            }
        }
    }

    let items = data
        .pointer(concat!(
            "/contents/twoColumnBrowseResultsRenderer/tabs/0/tabRenderer/content",
            "/sectionListRenderer/contents/0/itemSectionRenderer/contents/0",
            "/playlistVideoListRenderer/contents"
        ))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for (position, item) in items.iter().enumerate() {
        let renderer = match item.pointer("/playlistVideoRenderer") {
            Some(r) => r,
            None => continue,
        };
        let video_id = match renderer.pointer("/videoId").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => continue,
        };

        let title = renderer
            .pointer("/title/runs/0/text")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let duration = renderer
            .pointer("/lengthText/simpleText")
            .and_then(Value::as_str)
            .map(|s| s.to_string());
        let index = renderer
            .pointer("/index/simpleText")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(position as u32 + 1);

        info.videos.push(VideoTarget {
            index,
            video_id,
            title,
            duration,
        });
    }

    if info.video_count == 0 {
        info.video_count = info.videos.len();
    }

    info
}

/// Regex fallback when the JSON blob cannot be extracted; order-preserving
/// and deduplicated, but titles are not recoverable this way.
fn parse_html_fallback(playlist_id: &str, html: &str) -> PlaylistInfo {
    let mut videos: Vec<VideoTarget> = Vec::new();

    let pattern = format!(
        r"/watch\?v=([a-zA-Z0-9_-]{{11}})&(?:amp;)?list={}",
        regex::escape(playlist_id)
    );
    if let Ok(re) = Regex::new(&pattern) {
        for caps in re.captures_iter(html) {
            let id = caps[1].to_string();
            if videos.iter().any(|v| v.video_id == id) {
                continue;
            }
            let index = videos.len() as u32 + 1;
            videos.push(VideoTarget::new(index, id, ""));
        }
    }

    let title = Regex::new(r"<title>([^<]+)</title>")
        .ok()
        .and_then(|re| re.captures(html).map(|caps| caps[1].to_string()))
        .map(|t| t.replace(" - YouTube", "").trim().to_string())
        .unwrap_or_default();

    PlaylistInfo {
        playlist_id: playlist_id.to_string(),
        title,
        channel_name: String::new(),
        channel_handle: None,
        channel_url: None,
        video_count: videos.len(),
        videos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_initial_data_playlist() {
        let data = serde_json::json!({
            "header": {
                "playlistHeaderRenderer": {
                    "title": {"simpleText": "Trading Course"},
                    "ownerText": {"runs": [{
                        "text": "TJR Trades",
                        "navigationEndpoint": {"browseEndpoint": {"canonicalBaseUrl": "/@TJRTrades"}}
                    }]},
                    "stats": [{"runs": [{"text": "42 videos"}]}]
                }
            },
            "contents": {"twoColumnBrowseResultsRenderer": {"tabs": [{"tabRenderer": {"content": {
                "sectionListRenderer": {"contents": [{"itemSectionRenderer": {"contents": [{
                    "playlistVideoListRenderer": {"contents": [
                        {"playlistVideoRenderer": {
                            "videoId": "aaaaaaaaaaa",
                            "title": {"runs": [{"text": "Lesson 1"}]},
                            "lengthText": {"simpleText": "12:34"},
                            "index": {"simpleText": "1"}
                        }},
                        {"playlistVideoRenderer": {
                            "videoId": "bbbbbbbbbbb",
                            "title": {"runs": [{"text": "Lesson 2"}]},
                            "index": {"simpleText": "2"}
                        }},
                        {"continuationItemRenderer": {}}
                    ]}
                }]}}]}
            }}}]}}
        });

        let info = parse_initial_data("PLtest123456789", &data);
        assert_eq!(info.title, "Trading Course");
        assert_eq!(info.channel_name, "TJR Trades");
        assert_eq!(info.channel_handle.as_deref(), Some("TJRTrades"));
        assert_eq!(info.video_count, 42);
        assert_eq!(info.videos.len(), 2);
        assert_eq!(info.videos[0].video_id, "aaaaaaaaaaa");
        assert_eq!(info.videos[0].title, "Lesson 1");
        assert_eq!(info.videos[0].duration.as_deref(), Some("12:34"));
        assert_eq!(info.videos[1].index, 2);
    }

    #[test]
    fn test_parse_html_fallback_dedupes_and_orders() {
        let html = r#"
            <a href="/watch?v=aaaaaaaaaaa&list=PLtest123456789">one</a>
            <a href="/watch?v=bbbbbbbbbbb&list=PLtest123456789">two</a>
            <a href="/watch?v=aaaaaaaaaaa&list=PLtest123456789">one again</a>
            <title>My Playlist - YouTube</title>
        "#;

        let info = parse_html_fallback("PLtest123456789", html);
        assert_eq!(info.videos.len(), 2);
        assert_eq!(info.videos[0].video_id, "aaaaaaaaaaa");
        assert_eq!(info.videos[0].index, 1);
        assert_eq!(info.videos[1].video_id, "bbbbbbbbbbb");
        assert_eq!(info.title, "My Playlist");
    }

    #[test]
    fn test_extract_initial_data_var_pattern() {
        let html = r#"<script>var ytInitialData = {"a": 1};</script>"#;
        let data = extract_initial_data(html).unwrap();
        assert_eq!(data["a"], 1);
    }

    #[test]
    fn test_extract_channel_id() {
        let html = r#"{"channelId":"UCabc_123-xyz","title":"x"}"#;
        assert_eq!(extract_channel_id(html).as_deref(), Some("UCabc_123-xyz"));
    }
}
