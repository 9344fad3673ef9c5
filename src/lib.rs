pub mod analysis;
pub mod captions;
pub mod config;
pub mod error;
pub mod generation;
pub mod metadata;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod storage;
pub mod youtube;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use error::{Error, Result};

/// An 11-character YouTube video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

static BARE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9A-Za-z_-]{11}$").unwrap());

impl VideoId {
    /// Accept a bare identifier, rejecting anything that is not exactly 11 id characters.
    pub fn parse(raw: &str) -> Option<Self> {
        BARE_ID.is_match(raw).then(|| VideoId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VideoId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        VideoId::parse(&value).ok_or(Error::InvalidUrl(value))
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

/// Whether a caption track was written by a person or generated by speech recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionKind {
    Manual,
    Generated,
}

impl std::fmt::Display for CaptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptionKind::Manual => write!(f, "manual"),
            CaptionKind::Generated => write!(f, "auto-generated"),
        }
    }
}

/// A downloaded caption track, before normalization
#[derive(Debug, Clone)]
pub struct CaptionTrack {
    pub language: String,
    pub kind: CaptionKind,
    pub text: String,
}

/// Normalized transcript text for a video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub video_id: VideoId,
    pub language: String,
    pub kind: CaptionKind,
    pub text: String,
}

/// Video metadata as returned by the metadata API. Fields are optional because
/// the API omits them freely; the report assembler decides which are required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub duration: Option<String>,
}

// Each form captures the id and requires it to end there, so a longer token never yields a
// truncated match.
static URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // youtube.com/watch?v=ID
        r"(?:^|[/.])youtube(?:-nocookie)?\.com/watch\?(?:[^#]*&)?v=([0-9A-Za-z_-]{11})(?:[^0-9A-Za-z_-]|$)",
        // youtube.com/embed/ID
        r"(?:^|[/.])youtube(?:-nocookie)?\.com/embed/([0-9A-Za-z_-]{11})(?:[^0-9A-Za-z_-]|$)",
        // youtu.be/ID
        r"(?:^|[/.])youtu\.be/([0-9A-Za-z_-]{11})(?:[^0-9A-Za-z_-]|$)",
        // youtube.com/shorts/ID and youtube.com/live/ID
        r"(?:^|[/.])youtube\.com/(?:shorts|live)/([0-9A-Za-z_-]{11})(?:[^0-9A-Za-z_-]|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Extract video ID from various YouTube URL formats
pub fn extract_video_id(input: &str) -> Option<VideoId> {
    let input = input.trim();

    if let Some(id) = VideoId::parse(input) {
        return Some(id);
    }

    URL_PATTERNS
        .iter()
        .find_map(|re| re.captures(input))
        .map(|caps| VideoId(caps[1].to_string()))
}
