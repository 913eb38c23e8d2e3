use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;

use super::{classify_message, FailureKind, FetchFailure, Segment, Transcript, TranscriptFetcher};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    captions: Option<Captions>,
    video_details: Option<VideoDetails>,
    playability_status: Option<PlayabilityStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayabilityStatus {
    status: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoDetails {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Captions {
    player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    caption_tracks: Option<Vec<CaptionTrack>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
}

/// Transcript fetcher using YouTube's InnerTube player API.
///
/// Flow: watch page -> API key -> player endpoint -> caption track ->
/// timed-text XML. Every error is normalized into a [`FailureKind`] before
/// it reaches the batch controller.
pub struct InnerTubeFetcher {
    client: reqwest::Client,
    /// Separate client with certificate verification disabled, used for the
    /// retry-with-bypass policy in corporate/TLS-intercepted environments.
    bypass_client: reqwest::Client,
}

impl InnerTubeFetcher {
    pub fn new() -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let bypass_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            bypass_client,
        })
    }

    fn http(&self, bypass_ssl: bool) -> &reqwest::Client {
        if bypass_ssl {
            &self.bypass_client
        } else {
            &self.client
        }
    }

    async fn fetch_inner(
        &self,
        video_id: &str,
        language: &str,
        bypass_ssl: bool,
    ) -> Result<Transcript, FetchFailure> {
        let client = self.http(bypass_ssl);

        let watch_url = format!("https://www.youtube.com/watch?v={}", video_id);
        tracing::debug!("Fetching watch page: {}", watch_url);

        let page_html = client
            .get(&watch_url)
            .send()
            .await
            .map_err(classify_reqwest_error)?
            .error_for_status()
            .map_err(classify_reqwest_error)?
            .text()
            .await
            .map_err(classify_reqwest_error)?;

        let api_key = extract_api_key(&page_html).ok_or_else(|| {
            FetchFailure::new(
                FailureKind::NetworkError,
                "could not extract InnerTube API key from watch page",
            )
        })?;

        let player_url = format!(
            "https://www.youtube.com/youtubei/v1/player?key={}&prettyPrint=false",
            api_key
        );
        let body = serde_json::json!({
            "context": {
                "client": {
                    "hl": language,
                    "gl": "US",
                    "clientName": "WEB",
                    "clientVersion": "2.20240101.00.00"
                }
            },
            "videoId": video_id
        });

        let resp: PlayerResponse = client
            .post(&player_url)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?
            .error_for_status()
            .map_err(classify_reqwest_error)?
            .json()
            .await
            .map_err(classify_reqwest_error)?;

        if let Some(status) = resp.playability_status.as_ref().and_then(|p| p.status.as_deref()) {
            if status == "ERROR" || status == "LOGIN_REQUIRED" || status == "UNPLAYABLE" {
                let reason = resp
                    .playability_status
                    .as_ref()
                    .and_then(|p| p.reason.clone())
                    .unwrap_or_else(|| status.to_string());
                return Err(FetchFailure::new(
                    FailureKind::VideoUnavailable,
                    format!("video is unavailable: {}", reason),
                ));
            }
        }

        let title = resp.video_details.as_ref().and_then(|vd| vd.title.clone());

        let tracks = match resp
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
        {
            Some(renderer) => renderer.caption_tracks.unwrap_or_default(),
            None => {
                return Err(FetchFailure::new(
                    FailureKind::TranscriptsDisabled,
                    "captions are disabled for this video",
                ));
            }
        };

        if tracks.is_empty() {
            return Err(FetchFailure::new(
                FailureKind::NoTranscriptFound,
                "no caption tracks are listed for this video",
            ));
        }

        // Prefer the requested language, fall back to the first available
        // track rather than failing outright.
        let track = tracks
            .iter()
            .find(|t| t.language_code == language || t.language_code.starts_with(&format!("{}-", language)))
            .unwrap_or(&tracks[0]);
        let actual_language = track.language_code.clone();
        tracing::debug!("Using caption track: lang={}", actual_language);

        let caption_xml = client
            .get(&track.base_url)
            .send()
            .await
            .map_err(classify_reqwest_error)?
            .error_for_status()
            .map_err(classify_reqwest_error)?
            .text()
            .await
            .map_err(classify_reqwest_error)?;

        let segments = parse_caption_xml(&caption_xml)?;

        if segments.is_empty() {
            return Err(FetchFailure::new(
                FailureKind::NoTranscriptFound,
                format!("caption track '{}' contains no text", actual_language),
            ));
        }

        Ok(Transcript {
            video_id: video_id.to_string(),
            title,
            language: actual_language,
            segments,
        })
    }
}

#[async_trait]
impl TranscriptFetcher for InnerTubeFetcher {
    async fn fetch(
        &self,
        video_id: &str,
        language: &str,
        bypass_ssl: bool,
    ) -> Result<Transcript, FetchFailure> {
        self.fetch_inner(video_id, language, bypass_ssl).await
    }
}

/// Map a reqwest error into the closed failure set
fn classify_reqwest_error(err: reqwest::Error) -> FetchFailure {
    if let Some(status) = err.status() {
        let kind = match status.as_u16() {
            429 | 403 => FailureKind::IpBlocked,
            404 | 410 => FailureKind::VideoUnavailable,
            _ => FailureKind::NetworkError,
        };
        return FetchFailure::new(kind, format!("http status {}", status));
    }

    let message = format!("{:#}", anyhow::Error::from(err));
    let lower = message.to_lowercase();
    if lower.contains("certificate") || lower.contains("ssl") || lower.contains("tls") {
        return FetchFailure::new(FailureKind::SslError, message);
    }

    FetchFailure::new(classify_message(&message), message)
}

fn extract_api_key(html: &str) -> Option<String> {
    // The key appears in the embedded config; a secondary pattern covers the
    // older page layout.
    let patterns = [
        r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#,
        r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#,
    ];
    for pattern in patterns {
        if let Some(caps) = Regex::new(pattern).ok()?.captures(html) {
            return Some(caps[1].to_string());
        }
    }
    None
}

fn parse_caption_xml(xml: &str) -> Result<Vec<Segment>, FetchFailure> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut segments = Vec::new();
    let mut current_start: Option<f64> = None;
    let mut current_duration: Option<f64> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => {
                let mut start = None;
                let mut duration = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"start" => {
                            start = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
                        }
                        b"dur" => {
                            duration = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
                        }
                        _ => {}
                    }
                }
                current_start = start;
                current_duration = duration;
            }
            Ok(Event::Text(ref e)) => {
                if let (Some(start), Some(duration)) =
                    (current_start.take(), current_duration.take())
                {
                    let raw = e.unescape().unwrap_or_default().to_string();
                    // Caption payloads are frequently double-escaped.
                    let text = html_escape::decode_html_entities(&raw).trim().to_string();
                    if !text.is_empty() {
                        segments.push(Segment {
                            text,
                            start,
                            duration,
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FetchFailure::new(
                    FailureKind::NetworkError,
                    format!("malformed caption XML: {}", e),
                ));
            }
            _ => {}
        }
    }

    Ok(segments)
}
