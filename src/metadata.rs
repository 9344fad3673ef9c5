//! YouTube Data API v3: video metadata and, when an OAuth token is available,
//! caption tracks.

use std::collections::HashMap;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use crate::captions::{CaptionSource, TrackFormat, TrackRef};
use crate::{CaptionKind, Error, Result, VideoId, VideoInfo};

const DATA_API: &str = "youtube-data-api";
const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Anything that can describe a video by id. `Ok(None)` means the video does not exist.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn video_info(&self, video_id: &VideoId) -> Result<Option<VideoInfo>>;
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: Option<Snippet>,
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

impl From<VideoItem> for VideoInfo {
    fn from(item: VideoItem) -> Self {
        let snippet = item.snippet;
        let thumbnail = snippet.as_ref().and_then(|s| {
            ["high", "medium", "default"]
                .iter()
                .find_map(|size| s.thumbnails.get(*size))
                .map(|t| t.url.clone())
        });
        let (title, description) = match snippet {
            Some(s) => (s.title, s.description),
            None => (None, None),
        };
        VideoInfo {
            title,
            thumbnail,
            description,
            duration: item.content_details.and_then(|c| c.duration),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CaptionListResponse {
    #[serde(default)]
    items: Vec<CaptionItem>,
}

#[derive(Debug, Deserialize)]
struct CaptionItem {
    id: String,
    snippet: CaptionSnippet,
}

#[derive(Debug, Deserialize)]
struct CaptionSnippet {
    language: String,
    #[serde(rename = "trackKind")]
    track_kind: Option<String>,
}

impl CaptionItem {
    fn into_track_ref(self) -> TrackRef {
        let kind = match self.snippet.track_kind.as_deref() {
            Some(k) if k.eq_ignore_ascii_case("asr") => CaptionKind::Generated,
            _ => CaptionKind::Manual,
        };
        TrackRef {
            language: self.snippet.language,
            kind,
            locator: self.id,
            format: TrackFormat::Srt,
        }
    }
}

/// Client for the YouTube Data API, authenticated with an API key
#[derive(Clone)]
pub struct DataApiClient {
    client: reqwest::Client,
    api_key: String,
}

impl DataApiClient {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }

    /// Caption strategy backed by `captions.list` and `captions.download`.
    /// Downloads need an OAuth token; the API key alone is only good for listing.
    pub fn caption_source(&self, oauth_token: impl Into<String>) -> DataApiCaptionSource {
        DataApiCaptionSource {
            api: self.clone(),
            oauth_token: oauth_token.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let resp = request.send().await.map_err(|e| Error::from_reqwest(DATA_API, e))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::http_status(DATA_API, status, body));
        }
        resp.json().await.map_err(|e| Error::from_reqwest(DATA_API, e))
    }
}

#[async_trait]
impl MetadataSource for DataApiClient {
    async fn video_info(&self, video_id: &VideoId) -> Result<Option<VideoInfo>> {
        debug!("Fetching metadata for {video_id}");
        let request = self.client.get(format!("{API_BASE}/videos")).query(&[
            ("part", "snippet,contentDetails"),
            ("id", video_id.as_str()),
            ("key", self.api_key.as_str()),
        ]);
        let resp: VideoListResponse = self.get_json(request).await?;
        Ok(resp.items.into_iter().next().map(VideoInfo::from))
    }
}

pub struct DataApiCaptionSource {
    api: DataApiClient,
    oauth_token: String,
}

#[async_trait]
impl CaptionSource for DataApiCaptionSource {
    fn name(&self) -> &'static str {
        DATA_API
    }

    async fn list_tracks(&self, video_id: &VideoId, _languages: &[String]) -> Result<Vec<TrackRef>> {
        let request = self.api.client.get(format!("{API_BASE}/captions")).query(&[
            ("part", "snippet"),
            ("videoId", video_id.as_str()),
            ("key", self.api.api_key.as_str()),
        ]);
        let resp: CaptionListResponse = self.api.get_json(request).await?;
        Ok(resp.items.into_iter().map(CaptionItem::into_track_ref).collect())
    }

    async fn download(&self, track: &TrackRef) -> Result<String> {
        let resp = self
            .api
            .client
            .get(format!("{API_BASE}/captions/{}", track.locator))
            .query(&[("tfmt", "srt")])
            .bearer_auth(&self.oauth_token)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(DATA_API, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::http_status(DATA_API, status, body));
        }
        resp.text().await.map_err(|e| Error::from_reqwest(DATA_API, e))
    }
}

/// Render an ISO 8601 duration (`PT1H2M3S`) as `1:02:03`, or `2:05` under an hour.
pub fn format_duration(iso: &str) -> Option<String> {
    let rest = iso.strip_prefix('P')?;
    let mut seconds: u64 = 0;
    let mut current = String::new();
    let mut in_time = false;

    for c in rest.chars() {
        match c {
            'T' => in_time = true,
            '0'..='9' => current.push(c),
            unit => {
                let n: u64 = current.parse().ok()?;
                current.clear();
                let scale = match (unit, in_time) {
                    ('W', false) => 7 * 86_400,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                seconds = n.checked_mul(scale).and_then(|s| seconds.checked_add(s))?;
            }
        }
    }
    if !current.is_empty() {
        return None;
    }

    let (h, m, s) = (seconds / 3_600, (seconds % 3_600) / 60, seconds % 60);
    if h > 0 {
        Some(format!("{h}:{m:02}:{s:02}"))
    } else {
        Some(format!("{m}:{s:02}"))
    }
}
