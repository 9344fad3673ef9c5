use std::sync::LazyLock;

use async_trait::async_trait;
use log::debug;
use regex::Regex;
use serde::Deserialize;

use crate::captions::{CaptionSource, TrackFormat, TrackRef};
use crate::{CaptionKind, Error, Result, VideoId};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const INNERTUBE: &str = "innertube";
const TIMEDTEXT: &str = "timedtext";

#[derive(Debug, Deserialize)]
struct InnerTubePlayerResponse {
    captions: Option<CaptionsData>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<InnerTubeTrack>>,
}

#[derive(Debug, Deserialize)]
struct InnerTubeTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
    kind: Option<String>,
}

impl InnerTubeTrack {
    fn into_track_ref(self) -> TrackRef {
        let kind = match self.kind.as_deref() {
            Some("asr") => CaptionKind::Generated,
            _ => CaptionKind::Manual,
        };
        TrackRef {
            language: self.language_code,
            kind,
            locator: self.base_url,
            format: TrackFormat::TimedTextXml,
        }
    }
}

async fn get_text(client: &reqwest::Client, service: &'static str, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await
        .map_err(|e| Error::from_reqwest(service, e))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::http_status(service, status, body));
    }

    resp.text().await.map_err(|e| Error::from_reqwest(service, e))
}

/// Captions via the InnerTube player API that the watch page itself uses
pub struct InnerTubeSource {
    client: reqwest::Client,
}

impl InnerTubeSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CaptionSource for InnerTubeSource {
    fn name(&self) -> &'static str {
        INNERTUBE
    }

    async fn list_tracks(&self, video_id: &VideoId, languages: &[String]) -> Result<Vec<TrackRef>> {
        // Step 1: Fetch the watch page to get the InnerTube API key
        let watch_url = video_id.watch_url();
        debug!("Fetching watch page: {watch_url}");
        let page_html = get_text(&self.client, INNERTUBE, &watch_url).await?;

        let api_key = extract_api_key(&page_html)?;
        debug!("Extracted InnerTube API key: {api_key}");

        // Step 2: Call InnerTube player endpoint
        let player_url = format!("https://www.youtube.com/youtubei/v1/player?key={api_key}&prettyPrint=false");
        let hl = languages.first().map(String::as_str).unwrap_or("en");

        let body = serde_json::json!({
            "context": {
                "client": {
                    "hl": hl,
                    "gl": "US",
                    "clientName": "WEB",
                    "clientVersion": "2.20241126.01.00"
                }
            },
            "videoId": video_id.as_str()
        });

        let resp = self
            .client
            .post(&player_url)
            .header("User-Agent", USER_AGENT)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(INNERTUBE, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::http_status(INNERTUBE, status, body));
        }

        let player: InnerTubePlayerResponse = resp.json().await.map_err(|e| Error::from_reqwest(INNERTUBE, e))?;

        // A missing captions block means captions are disabled for the video
        let tracks = player
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .and_then(|r| r.caption_tracks)
            .unwrap_or_default();

        Ok(tracks.into_iter().map(InnerTubeTrack::into_track_ref).collect())
    }

    async fn download(&self, track: &TrackRef) -> Result<String> {
        debug!("Downloading {} caption track", track.language);
        get_text(&self.client, INNERTUBE, &track.locator).await
    }
}

/// Captions via the public timed-text endpoint: one request per language and
/// kind, answering with an empty body when the track does not exist.
pub struct TimedTextSource {
    client: reqwest::Client,
}

impl TimedTextSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CaptionSource for TimedTextSource {
    fn name(&self) -> &'static str {
        TIMEDTEXT
    }

    async fn list_tracks(&self, video_id: &VideoId, languages: &[String]) -> Result<Vec<TrackRef>> {
        let mut tracks = Vec::with_capacity(languages.len() * 2);
        for kind in [CaptionKind::Manual, CaptionKind::Generated] {
            for lang in languages {
                let mut locator = format!("https://www.youtube.com/api/timedtext?v={video_id}&lang={lang}&fmt=srv1");
                if kind == CaptionKind::Generated {
                    locator.push_str("&kind=asr");
                }
                tracks.push(TrackRef {
                    language: lang.clone(),
                    kind,
                    locator,
                    format: TrackFormat::TimedTextXml,
                });
            }
        }
        Ok(tracks)
    }

    async fn download(&self, track: &TrackRef) -> Result<String> {
        match get_text(&self.client, TIMEDTEXT, &track.locator).await {
            Err(Error::Transport { status: Some(404), .. }) => Ok(String::new()),
            other => other,
        }
    }
}

static API_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#).unwrap());
static API_KEY_FALLBACK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#).unwrap());

/// A watch page without a key is usually a consent or bot-check interstitial.
fn extract_api_key(html: &str) -> Result<String> {
    API_KEY
        .captures(html)
        .or_else(|| API_KEY_FALLBACK.captures(html))
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| Error::malformed(INNERTUBE, "watch page has no InnerTube API key"))
}

/// Parse timed-text XML into one string per cue. Handles both the `<text>`
/// cues of the classic format and the `<p>` cues (with nested `<s>` words) of
/// the newer one.
pub fn parse_caption_xml(xml: &str) -> Result<Vec<String>> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut cues = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if matches!(e.name().as_ref(), b"text" | b"p") => {
                current = Some(String::new());
            }
            Ok(Event::End(ref e)) if matches!(e.name().as_ref(), b"text" | b"p") => {
                if let Some(cue) = current.take() {
                    let cue = cue.trim().to_string();
                    if !cue.is_empty() {
                        cues.push(cue);
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(cue) = current.as_mut() {
                    let raw_text = e.unescape().unwrap_or_default().to_string();
                    cue.push_str(&html_escape::decode_html_entities(&raw_text));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::parse("caption XML", e.to_string())),
            _ => {}
        }
    }

    Ok(cues)
}
