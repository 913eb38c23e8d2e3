use std::collections::HashMap;

use url::Url;

use crate::TubescribeError;

/// Reference to a YouTube channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    /// Handle form: `@name`
    Handle(String),

    /// Canonical channel ID: `UC...`
    Id(String),

    /// Legacy custom name: `/c/name` or `/user/name`
    Legacy(String),
}

impl ChannelRef {
    pub fn url(&self) -> String {
        match self {
            ChannelRef::Handle(h) => format!("https://www.youtube.com/@{}", h),
            ChannelRef::Id(id) => format!("https://www.youtube.com/channel/{}", id),
            ChannelRef::Legacy(name) => format!("https://www.youtube.com/c/{}", name),
        }
    }
}

/// A resolved extraction target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A single video, optionally carrying the playlist it was linked from
    Video {
        video_id: String,
        playlist_id: Option<String>,
    },

    /// A playlist
    Playlist { playlist_id: String },

    /// A channel
    Channel(ChannelRef),
}

impl Target {
    pub fn video_url(&self) -> Option<String> {
        match self {
            Target::Video { video_id, .. } => {
                Some(format!("https://www.youtube.com/watch?v={}", video_id))
            }
            _ => None,
        }
    }

    pub fn playlist_id(&self) -> Option<&str> {
        match self {
            Target::Video { playlist_id, .. } => playlist_id.as_deref(),
            Target::Playlist { playlist_id } => Some(playlist_id),
            Target::Channel(_) => None,
        }
    }
}

/// Check whether a string is a canonical 11-character video ID
fn is_video_id(s: &str) -> bool {
    s.len() == 11
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Check whether a string looks like a playlist ID (PL/UU/OL/FL/RD prefixes)
fn is_playlist_id(s: &str) -> bool {
    s.len() >= 13
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && ["PL", "UU", "OL", "FL", "RD", "LL"]
            .iter()
            .any(|p| s.starts_with(p))
}

/// Resolve a URL or handle string into exactly one extraction target.
///
/// Pure and side-effect free: no network access, no metadata enrichment.
///
/// Accepted inputs:
/// - canonical watch URLs (`youtube.com/watch?v=ID`, with or without `list=`)
/// - short-form URLs (`youtu.be/ID`)
/// - shorts/embed/live URLs
/// - playlist URLs (`youtube.com/playlist?list=ID`)
/// - channel handles (`@name` or `youtube.com/@name`)
/// - channel IDs (`youtube.com/channel/UC...`)
/// - legacy channel names (`youtube.com/c/name`, `youtube.com/user/name`)
/// - bare 11-character video IDs
pub fn resolve(input: &str) -> Result<Target, TubescribeError> {
    let input = input.trim();

    if input.is_empty() {
        return Err(TubescribeError::UnrecognizedUrl("<empty>".to_string()));
    }

    if is_video_id(input) {
        return Ok(Target::Video {
            video_id: input.to_string(),
            playlist_id: None,
        });
    }

    // Bare @handle
    if let Some(handle) = input.strip_prefix('@') {
        if !handle.is_empty() && !handle.contains('/') {
            return Ok(Target::Channel(ChannelRef::Handle(handle.to_string())));
        }
    }

    let with_scheme = if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };

    let url = Url::parse(&with_scheme)
        .map_err(|_| TubescribeError::UnrecognizedUrl(input.to_string()))?;

    let host_lower = url.host_str().unwrap_or("").to_lowercase();
    let host = host_lower
        .trim_start_matches("www.")
        .trim_start_matches("m.");

    let query: HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let list_param = query
        .get("list")
        .filter(|l| is_playlist_id(l))
        .cloned();

    if host == "youtu.be" {
        let id = url
            .path_segments()
            .and_then(|mut segs| segs.next())
            .unwrap_or("");
        if is_video_id(id) {
            return Ok(Target::Video {
                video_id: id.to_string(),
                playlist_id: list_param,
            });
        }
        return Err(TubescribeError::UnrecognizedUrl(input.to_string()));
    }

    if host != "youtube.com" && host != "music.youtube.com" {
        return Err(TubescribeError::UnrecognizedUrl(input.to_string()));
    }

    let path = url.path();

    if path.starts_with("/playlist") {
        return match list_param {
            Some(playlist_id) => Ok(Target::Playlist { playlist_id }),
            None => Err(TubescribeError::UnrecognizedUrl(input.to_string())),
        };
    }

    if path.starts_with("/watch") {
        if let Some(v) = query.get("v").filter(|v| is_video_id(v)) {
            return Ok(Target::Video {
                video_id: v.clone(),
                playlist_id: list_param,
            });
        }
        return Err(TubescribeError::UnrecognizedUrl(input.to_string()));
    }

    // Path-embedded video forms: /shorts/ID, /embed/ID, /live/ID, /v/ID
    for prefix in ["/shorts/", "/embed/", "/live/", "/v/"] {
        if let Some(rest) = path.strip_prefix(prefix) {
            let id = rest.split('/').next().unwrap_or("");
            if is_video_id(id) {
                return Ok(Target::Video {
                    video_id: id.to_string(),
                    playlist_id: list_param,
                });
            }
        }
    }

    if let Some(rest) = path.strip_prefix("/@") {
        let handle = rest.split('/').next().unwrap_or("");
        if !handle.is_empty() {
            return Ok(Target::Channel(ChannelRef::Handle(handle.to_string())));
        }
    }

    if let Some(rest) = path.strip_prefix("/channel/") {
        let id = rest.split('/').next().unwrap_or("");
        if !id.is_empty() {
            return Ok(Target::Channel(ChannelRef::Id(id.to_string())));
        }
    }

    for prefix in ["/c/", "/user/"] {
        if let Some(rest) = path.strip_prefix(prefix) {
            let name = rest.split('/').next().unwrap_or("");
            if !name.is_empty() {
                return Ok(Target::Channel(ChannelRef::Legacy(name.to_string())));
            }
        }
    }

    Err(TubescribeError::UnrecognizedUrl(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_video_id() {
        assert_eq!(
            resolve("dQw4w9WgXcQ").unwrap(),
            Target::Video {
                video_id: "dQw4w9WgXcQ".to_string(),
                playlist_id: None,
            }
        );
    }

    #[test]
    fn test_watch_url() {
        let target = resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(
            target,
            Target::Video {
                video_id: "dQw4w9WgXcQ".to_string(),
                playlist_id: None,
            }
        );
    }

    #[test]
    fn test_watch_url_with_extra_params() {
        let target = resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=120").unwrap();
        assert_eq!(target.video_url().as_deref(), Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
    }

    #[test]
    fn test_watch_url_with_playlist_context() {
        let target =
            resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLabc123def456ghi").unwrap();
        assert_eq!(
            target,
            Target::Video {
                video_id: "dQw4w9WgXcQ".to_string(),
                playlist_id: Some("PLabc123def456ghi".to_string()),
            }
        );
    }

    #[test]
    fn test_short_url() {
        let target = resolve("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(
            target,
            Target::Video {
                video_id: "dQw4w9WgXcQ".to_string(),
                playlist_id: None,
            }
        );
    }

    #[test]
    fn test_short_url_with_playlist() {
        let target = resolve("https://youtu.be/dQw4w9WgXcQ?list=PLabc123def456ghi").unwrap();
        assert_eq!(target.playlist_id(), Some("PLabc123def456ghi"));
    }

    #[test]
    fn test_shorts_url() {
        let target = resolve("https://www.youtube.com/shorts/dQw4w9WgXcQ").unwrap();
        assert!(matches!(target, Target::Video { .. }));
    }

    #[test]
    fn test_embed_url() {
        let target = resolve("https://www.youtube.com/embed/dQw4w9WgXcQ").unwrap();
        assert!(matches!(target, Target::Video { .. }));
    }

    #[test]
    fn test_playlist_url() {
        let target = resolve("https://www.youtube.com/playlist?list=PLabc123def456ghi").unwrap();
        assert_eq!(
            target,
            Target::Playlist {
                playlist_id: "PLabc123def456ghi".to_string(),
            }
        );
    }

    #[test]
    fn test_bare_handle() {
        assert_eq!(
            resolve("@TJRTrades").unwrap(),
            Target::Channel(ChannelRef::Handle("TJRTrades".to_string()))
        );
    }

    #[test]
    fn test_handle_url() {
        assert_eq!(
            resolve("https://www.youtube.com/@TJRTrades/videos").unwrap(),
            Target::Channel(ChannelRef::Handle("TJRTrades".to_string()))
        );
    }

    #[test]
    fn test_channel_id_url() {
        assert_eq!(
            resolve("https://www.youtube.com/channel/UCxxxyyyzzz").unwrap(),
            Target::Channel(ChannelRef::Id("UCxxxyyyzzz".to_string()))
        );
    }

    #[test]
    fn test_legacy_channel_urls() {
        assert_eq!(
            resolve("https://www.youtube.com/c/SomeChannel").unwrap(),
            Target::Channel(ChannelRef::Legacy("SomeChannel".to_string()))
        );
        assert_eq!(
            resolve("https://www.youtube.com/user/SomeUser").unwrap(),
            Target::Channel(ChannelRef::Legacy("SomeUser".to_string()))
        );
    }

    #[test]
    fn test_mobile_host() {
        assert!(resolve("https://m.youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
    }

    #[test]
    fn test_schemeless_url() {
        assert!(resolve("youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
    }

    #[test]
    fn test_non_youtube_url() {
        assert!(matches!(
            resolve("https://vimeo.com/12345"),
            Err(TubescribeError::UnrecognizedUrl(_))
        ));
    }

    #[test]
    fn test_invalid_input() {
        assert!(resolve("not-a-valid-id").is_err());
        assert!(resolve("").is_err());
    }

    #[test]
    fn test_whitespace_trimming() {
        assert!(resolve("  dQw4w9WgXcQ  ").is_ok());
    }
}
