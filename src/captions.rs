use async_trait::async_trait;
use log::{debug, info, warn};

use crate::normalize::normalize;
use crate::retry::{RetryPolicy, retry};
use crate::{CaptionKind, CaptionTrack, Error, Result, Transcript, VideoId, youtube};

/// Wire format of a caption track body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFormat {
    /// YouTube timed-text XML (`<text start=".." dur="..">`)
    TimedTextXml,
    Srt,
}

/// A caption track a source says it can download
#[derive(Debug, Clone)]
pub struct TrackRef {
    pub language: String,
    pub kind: CaptionKind,
    /// Source-specific handle: a download URL or a track id
    pub locator: String,
    pub format: TrackFormat,
}

/// One way of retrieving captions. Sources report "no such track" by returning
/// an empty listing or an empty body; errors are reserved for failures talking
/// to the service.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_tracks(&self, video_id: &VideoId, languages: &[String]) -> Result<Vec<TrackRef>>;

    async fn download(&self, track: &TrackRef) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePreference {
    pub primary: String,
    pub fallback: String,
}

impl Default for LanguagePreference {
    fn default() -> Self {
        Self {
            primary: "en".to_string(),
            fallback: "en".to_string(),
        }
    }
}

impl LanguagePreference {
    pub fn new(primary: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
        }
    }

    fn languages(&self) -> Vec<String> {
        let mut langs = vec![self.primary.clone()];
        if !self.fallback.eq_ignore_ascii_case(&self.primary) {
            langs.push(self.fallback.clone());
        }
        langs
    }

    /// Tiers in the order they are tried: manual tracks by language, then
    /// generated tracks by language.
    fn tiers(&self) -> Vec<(CaptionKind, String)> {
        let langs = self.languages();
        let mut tiers = Vec::with_capacity(langs.len() * 2);
        for kind in [CaptionKind::Manual, CaptionKind::Generated] {
            for lang in &langs {
                tiers.push((kind, lang.clone()));
            }
        }
        tiers
    }
}

fn matches_language(code: &str, wanted: &str) -> bool {
    let code = code.to_ascii_lowercase();
    let wanted = wanted.to_ascii_lowercase();
    code == wanted || code.starts_with(&format!("{wanted}-"))
}

pub struct CaptionFetcher {
    sources: Vec<Box<dyn CaptionSource>>,
    languages: LanguagePreference,
    retry: RetryPolicy,
}

impl CaptionFetcher {
    pub fn new(sources: Vec<Box<dyn CaptionSource>>, languages: LanguagePreference, retry: RetryPolicy) -> Self {
        Self {
            sources,
            languages,
            retry,
        }
    }

    /// Find the best available transcript for a video.
    ///
    /// `Ok(None)` means no source has a usable track in any tier. An error means
    /// nothing was found and at least one source failed, so the absence may not
    /// be real.
    pub async fn fetch(&self, video_id: &VideoId) -> Result<Option<Transcript>> {
        let languages = self.languages.languages();
        let mut listings: Vec<Option<Vec<TrackRef>>> = vec![None; self.sources.len()];
        let mut last_err: Option<Error> = None;

        for (kind, lang) in self.languages.tiers() {
            for (idx, source) in self.sources.iter().enumerate() {
                if listings[idx].is_none() {
                    let listed = retry(&self.retry, source.name(), || source.list_tracks(video_id, &languages)).await;
                    listings[idx] = Some(match listed {
                        Ok(tracks) => {
                            debug!("{}: {} caption tracks for {video_id}", source.name(), tracks.len());
                            tracks
                        }
                        Err(e) => {
                            warn!("{}: listing captions for {video_id} failed: {e}", source.name());
                            last_err = Some(e);
                            Vec::new()
                        }
                    });
                }

                let candidates = listings[idx]
                    .iter()
                    .flatten()
                    .filter(|t| t.kind == kind && matches_language(&t.language, &lang));

                for track in candidates {
                    match self.download(source.as_ref(), track).await {
                        Ok(Some(caption)) => {
                            info!(
                                "Using {} {} captions for {video_id} from {}",
                                caption.language,
                                caption.kind,
                                source.name()
                            );
                            return Ok(Some(Transcript {
                                video_id: video_id.clone(),
                                language: caption.language,
                                kind: caption.kind,
                                text: caption.text,
                            }));
                        }
                        Ok(None) => debug!("{}: {} {kind} track was empty", source.name(), track.language),
                        Err(e) => {
                            warn!("{}: downloading {} {kind} track failed: {e}", source.name(), track.language);
                            last_err = Some(e);
                        }
                    }
                }
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => {
                info!("No captions found for {video_id}");
                Ok(None)
            }
        }
    }

    async fn download(&self, source: &dyn CaptionSource, track: &TrackRef) -> Result<Option<CaptionTrack>> {
        // Parsing sits inside the retry so a truncated body is fetched again
        let flattened = retry(&self.retry, source.name(), || async move {
            let body = source.download(track).await?;
            flatten(source.name(), track.format, body)
        })
        .await?;
        let text = normalize(&flattened);
        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(CaptionTrack {
            language: track.language.clone(),
            kind: track.kind,
            text,
        }))
    }
}

/// One cue per line for XML bodies; SRT goes to the normalizer as-is.
fn flatten(service: &'static str, format: TrackFormat, body: String) -> Result<String> {
    match format {
        TrackFormat::TimedTextXml if body.trim().is_empty() => Ok(String::new()),
        TrackFormat::TimedTextXml => youtube::parse_caption_xml(&body)
            .map(|cues| cues.join("\n"))
            .map_err(|e| Error::malformed(service, e)),
        TrackFormat::Srt => Ok(body),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Serves a fixed listing (or fails to list when `tracks` is `None`); bodies
    /// are keyed by locator and a missing locator fails the download.
    struct FakeSource {
        name: &'static str,
        tracks: Option<Vec<TrackRef>>,
        bodies: Vec<(&'static str, &'static str)>,
        downloads: Arc<Mutex<Vec<String>>>,
    }

    impl FakeSource {
        fn new(name: &'static str, tracks: Vec<TrackRef>, bodies: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                name,
                tracks: Some(tracks),
                bodies,
                downloads: Arc::default(),
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                name,
                tracks: None,
                bodies: Vec::new(),
                downloads: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl CaptionSource for FakeSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn list_tracks(&self, _video_id: &VideoId, _languages: &[String]) -> Result<Vec<TrackRef>> {
            self.tracks
                .clone()
                .ok_or_else(|| Error::http_status(self.name, reqwest::StatusCode::SERVICE_UNAVAILABLE, "unavailable"))
        }

        async fn download(&self, track: &TrackRef) -> Result<String> {
            self.downloads.lock().unwrap().push(track.locator.clone());
            self.bodies
                .iter()
                .find(|(loc, _)| *loc == track.locator)
                .map(|(_, body)| body.to_string())
                .ok_or_else(|| Error::transport(self.name, "connection reset"))
        }
    }

    fn track(language: &str, kind: CaptionKind, locator: &str) -> TrackRef {
        TrackRef {
            language: language.to_string(),
            kind,
            locator: locator.to_string(),
            format: TrackFormat::Srt,
        }
    }

    fn video() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    fn fetcher(sources: Vec<Box<dyn CaptionSource>>) -> CaptionFetcher {
        CaptionFetcher::new(sources, LanguagePreference::new("ja", "en"), RetryPolicy::immediate(1))
    }

    #[tokio::test]
    async fn test_prefers_manual_primary() {
        let source = FakeSource::new(
            "fake",
            vec![
                track("en", CaptionKind::Manual, "en-manual"),
                track("ja", CaptionKind::Generated, "ja-asr"),
                track("ja", CaptionKind::Manual, "ja-manual"),
            ],
            vec![("en-manual", "hello"), ("ja-asr", "auto"), ("ja-manual", "1\n00:00:01,000 --> 00:00:02,000\nkonnichiwa\n")],
        );
        let transcript = fetcher(vec![Box::new(source)]).fetch(&video()).await.unwrap().unwrap();
        assert_eq!(transcript.language, "ja");
        assert_eq!(transcript.kind, CaptionKind::Manual);
        assert_eq!(transcript.text, "konnichiwa");
    }

    #[tokio::test]
    async fn test_manual_fallback_beats_generated_primary() {
        let source = FakeSource::new(
            "fake",
            vec![
                track("ja", CaptionKind::Generated, "ja-asr"),
                track("en-US", CaptionKind::Manual, "en-manual"),
            ],
            vec![("ja-asr", "auto"), ("en-manual", "hello there")],
        );
        let transcript = fetcher(vec![Box::new(source)]).fetch(&video()).await.unwrap().unwrap();
        assert_eq!(transcript.language, "en-US");
        assert_eq!(transcript.kind, CaptionKind::Manual);
    }

    #[tokio::test]
    async fn test_generated_prefers_primary_language() {
        let source = FakeSource::new(
            "fake",
            vec![
                track("en", CaptionKind::Generated, "en-asr"),
                track("ja", CaptionKind::Generated, "ja-asr"),
            ],
            vec![("en-asr", "english auto"), ("ja-asr", "japanese auto")],
        );
        let transcript = fetcher(vec![Box::new(source)]).fetch(&video()).await.unwrap().unwrap();
        assert_eq!(transcript.text, "japanese auto");
        assert_eq!(transcript.kind, CaptionKind::Generated);
    }

    #[tokio::test]
    async fn test_no_tracks_is_none() {
        let source = FakeSource::new("fake", vec![track("de", CaptionKind::Manual, "de")], vec![("de", "hallo")]);
        let result = fetcher(vec![Box::new(source)]).fetch(&video()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_empty_body_treated_as_absent() {
        let source = FakeSource::new(
            "fake",
            vec![
                track("ja", CaptionKind::Manual, "ja-manual"),
                track("ja", CaptionKind::Generated, "ja-asr"),
            ],
            vec![("ja-manual", "1\n00:00:01,000 --> 00:00:02,000\n\n"), ("ja-asr", "spoken words")],
        );
        let transcript = fetcher(vec![Box::new(source)]).fetch(&video()).await.unwrap().unwrap();
        assert_eq!(transcript.kind, CaptionKind::Generated);
    }

    #[tokio::test]
    async fn test_failed_tier_does_not_abort_later_tiers() {
        // ja-manual has no body, so its download fails; the en manual track still wins.
        let source = FakeSource::new(
            "fake",
            vec![
                track("ja", CaptionKind::Manual, "ja-manual"),
                track("en", CaptionKind::Manual, "en-manual"),
            ],
            vec![("en-manual", "fallback text")],
        );
        let transcript = fetcher(vec![Box::new(source)]).fetch(&video()).await.unwrap().unwrap();
        assert_eq!(transcript.text, "fallback text");
    }

    #[tokio::test]
    async fn test_failing_source_falls_through_to_next() {
        let good = FakeSource::new("good", vec![track("en", CaptionKind::Generated, "en")], vec![("en", "ok")]);
        let transcript = fetcher(vec![Box::new(FakeSource::failing("bad")), Box::new(good)])
            .fetch(&video())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(transcript.text, "ok");
    }

    #[tokio::test]
    async fn test_transport_failure_without_result_is_error() {
        let result = fetcher(vec![Box::new(FakeSource::failing("bad"))]).fetch(&video()).await;
        assert!(result.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn test_stops_at_first_hit() {
        let source = FakeSource::new(
            "fake",
            vec![
                track("ja", CaptionKind::Manual, "ja-manual"),
                track("en", CaptionKind::Manual, "en-manual"),
            ],
            vec![("ja-manual", "first"), ("en-manual", "second")],
        );
        let downloads = Arc::clone(&source.downloads);
        let transcript = fetcher(vec![Box::new(source)]).fetch(&video()).await.unwrap().unwrap();
        assert_eq!(transcript.text, "first");
        assert_eq!(*downloads.lock().unwrap(), vec!["ja-manual".to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_track_body_is_transport_failure() {
        let mut broken = track("ja", CaptionKind::Manual, "ja-manual");
        broken.format = TrackFormat::TimedTextXml;
        let source = FakeSource::new(
            "fake",
            vec![broken],
            vec![("ja-manual", r#"<transcript><text start="0">hello</oops></transcript>"#)],
        );
        let downloads = Arc::clone(&source.downloads);
        let fetcher = CaptionFetcher::new(
            vec![Box::new(source)],
            LanguagePreference::new("ja", "en"),
            RetryPolicy::immediate(2),
        );
        let err = fetcher.fetch(&video()).await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.is_retryable());
        assert_eq!(downloads.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_xml_track_is_flattened() {
        let mut xml = track("ja", CaptionKind::Manual, "ja-manual");
        xml.format = TrackFormat::TimedTextXml;
        let source = FakeSource::new(
            "fake",
            vec![xml],
            vec![("ja-manual", r#"<transcript><text start="0">it&amp;#39;s</text><text start="1">fine</text></transcript>"#)],
        );
        let transcript = fetcher(vec![Box::new(source)]).fetch(&video()).await.unwrap().unwrap();
        assert_eq!(transcript.text, "it's fine");
    }

    #[test]
    fn test_language_matching() {
        assert!(matches_language("en", "en"));
        assert!(matches_language("en-GB", "en"));
        assert!(matches_language("EN", "en"));
        assert!(!matches_language("eno", "en"));
        assert!(!matches_language("ja", "en"));
    }

    #[test]
    fn test_tiers_dedupe_same_language() {
        let tiers = LanguagePreference::new("en", "EN").tiers();
        assert_eq!(
            tiers,
            vec![(CaptionKind::Manual, "en".to_string()), (CaptionKind::Generated, "en".to_string())]
        );
    }
}
