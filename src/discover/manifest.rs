use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{PlaylistInfo, VideoListProvider, VideoTarget};
use crate::resolver::Target;
use crate::TubescribeError;

/// On-disk playlist manifest.
///
/// The reliable discovery path when scraping is blocked: the video list is
/// prepared once (by hand, browser tooling, or a previous `--save-manifest` run)
/// and loaded from disk afterwards.
///
/// ```json
/// {
///   "channel": {
///     "name": "Channel Name",
///     "url": "https://www.youtube.com/@handle",
///     "playlist_id": "PLAYLIST_ID",
///     "playlist_name": "Playlist Name"
///   },
///   "videos": [
///     {"index": 1, "id": "VIDEO_ID", "title": "Video Title"}
///   ]
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    #[serde(default)]
    channel: ManifestChannel,
    #[serde(default)]
    videos: Vec<VideoTarget>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ManifestChannel {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    playlist_id: String,
    #[serde(default)]
    playlist_name: String,
}

/// Load a playlist manifest from a JSON file.
pub fn load_playlist_manifest(path: &Path) -> Result<PlaylistInfo, TubescribeError> {
    let content = fs_err::read_to_string(path)
        .map_err(|e| TubescribeError::DiscoveryUnavailable(format!("manifest {}: {}", path.display(), e)))?;

    let manifest: Manifest = serde_json::from_str(&content)
        .map_err(|e| TubescribeError::DiscoveryUnavailable(format!("invalid manifest JSON: {}", e)))?;

    let mut videos: Vec<VideoTarget> = manifest
        .videos
        .into_iter()
        .filter(|v| !v.video_id.is_empty())
        .collect();
    // Normalize missing indices to list position
    for (position, video) in videos.iter_mut().enumerate() {
        if video.index == 0 {
            video.index = position as u32 + 1;
        }
    }

    let channel_handle = manifest
        .channel
        .url
        .split_once("/@")
        .map(|(_, handle)| handle.split('/').next().unwrap_or("").to_string())
        .filter(|h| !h.is_empty());

    Ok(PlaylistInfo {
        playlist_id: manifest.channel.playlist_id,
        title: manifest.channel.playlist_name,
        channel_name: manifest.channel.name,
        channel_handle,
        channel_url: if manifest.channel.url.is_empty() {
            None
        } else {
            Some(manifest.channel.url)
        },
        video_count: videos.len(),
        videos,
    })
}

/// Save discovery results as a manifest for later runs.
pub fn save_playlist_manifest(info: &PlaylistInfo, path: &Path) -> Result<PathBuf, TubescribeError> {
    let manifest = Manifest {
        channel: ManifestChannel {
            id: info.channel_handle.clone().unwrap_or_default(),
            name: info.channel_name.clone(),
            url: info.channel_url.clone().unwrap_or_default(),
            playlist_id: info.playlist_id.clone(),
            playlist_name: info.title.clone(),
        },
        videos: info.videos.clone(),
    };

    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent).map_err(|e| TubescribeError::Storage(e.to_string()))?;
    }
    let content = serde_json::to_string_pretty(&manifest)
        .map_err(|e| TubescribeError::Storage(e.to_string()))?;
    fs_err::write(path, content).map_err(|e| TubescribeError::Storage(e.to_string()))?;

    Ok(path.to_path_buf())
}

/// Provider that serves a pre-loaded manifest, ignoring the target.
pub struct ManifestProvider {
    info: PlaylistInfo,
}

impl ManifestProvider {
    pub fn from_file(path: &Path) -> Result<Self, TubescribeError> {
        Ok(Self {
            info: load_playlist_manifest(path)?,
        })
    }
}

#[async_trait]
impl VideoListProvider for ManifestProvider {
    async fn discover(
        &self,
        _target: &Target,
        max_count: Option<usize>,
    ) -> Result<PlaylistInfo, TubescribeError> {
        let mut info = self.info.clone();
        if let Some(max) = max_count {
            info.videos.truncate(max);
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channel.json");

        let info = PlaylistInfo {
            playlist_id: "PLtest123456789".to_string(),
            title: "Course".to_string(),
            channel_name: "Someone".to_string(),
            channel_handle: Some("someone".to_string()),
            channel_url: Some("https://www.youtube.com/@someone".to_string()),
            video_count: 2,
            videos: vec![
                VideoTarget::new(1, "aaaaaaaaaaa", "One"),
                VideoTarget::new(2, "bbbbbbbbbbb", "Two"),
            ],
        };

        save_playlist_manifest(&info, &path).unwrap();
        let loaded = load_playlist_manifest(&path).unwrap();

        assert_eq!(loaded.playlist_id, "PLtest123456789");
        assert_eq!(loaded.title, "Course");
        assert_eq!(loaded.channel_handle.as_deref(), Some("someone"));
        assert_eq!(loaded.videos, info.videos);
    }

    #[test]
    fn test_manifest_accepts_id_alias_and_fills_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs_err::write(
            &path,
            r#"{"channel": {"name": "X", "playlist_name": "Y"},
                "videos": [{"index": 0, "id": "aaaaaaaaaaa", "title": "One"},
                           {"index": 0, "id": "bbbbbbbbbbb"}]}"#,
        )
        .unwrap();

        let loaded = load_playlist_manifest(&path).unwrap();
        assert_eq!(loaded.videos.len(), 2);
        assert_eq!(loaded.videos[0].index, 1);
        assert_eq!(loaded.videos[1].index, 2);
        assert_eq!(loaded.videos[1].title, "");
    }

    #[test]
    fn test_manifest_missing_file() {
        let result = load_playlist_manifest(Path::new("/nonexistent/manifest.json"));
        assert!(matches!(result, Err(TubescribeError::DiscoveryUnavailable(_))));
    }
}
