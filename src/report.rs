use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisResult, KeyPhrase, SentimentScores, Summary};
use crate::{CaptionKind, Error, Result, Transcript, VideoId, VideoInfo};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportVideo {
    pub title: String,
    pub thumbnail: String,
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Everything known about one analyzed video, ready to render or store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub video_id: VideoId,
    pub video: ReportVideo,
    pub summary: Summary,
    pub key_phrases: Vec<KeyPhrase>,
    pub sentiment: SentimentScores,
    /// Language and kind of the caption track the transcript came from
    pub caption_language: String,
    pub caption_kind: CaptionKind,
    pub full_text: String,
}

fn required(value: &Option<String>, field: &'static str) -> Result<String> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .ok_or(Error::MissingField(field))
}

impl ReportVideo {
    /// The metadata a report cannot do without. Checked before any analysis
    /// is paid for.
    pub fn from_info(video: &VideoInfo) -> Result<Self> {
        Ok(ReportVideo {
            title: required(&video.title, "title")?,
            thumbnail: required(&video.thumbnail, "thumbnail")?,
            duration: required(&video.duration, "duration")?,
            description: video.description.clone(),
        })
    }
}

/// Merge metadata, analysis and transcript into a report. Values pass through
/// untouched; a missing required input fails the whole assembly.
pub fn assemble(video: &VideoInfo, analysis: AnalysisResult, transcript: &Transcript) -> Result<Report> {
    from_parts(ReportVideo::from_info(video)?, analysis, transcript)
}

/// `assemble` for metadata that has already been validated
pub fn from_parts(video: ReportVideo, analysis: AnalysisResult, transcript: &Transcript) -> Result<Report> {
    if transcript.text.trim().is_empty() {
        return Err(Error::MissingField("transcript"));
    }

    Ok(Report {
        video_id: transcript.video_id.clone(),
        video,
        summary: analysis.summary,
        key_phrases: analysis.key_phrases,
        sentiment: analysis.sentiment,
        caption_language: transcript.language.clone(),
        caption_kind: transcript.kind,
        full_text: transcript.text.clone(),
    })
}
