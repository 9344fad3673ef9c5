mod json;
mod sqlite;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{KeyPhrase, SentimentScores};
use crate::report::Report;
use crate::{Result, VideoId};

pub use json::JsonStore;
pub use sqlite::SqliteStore;

/// A stored analysis, one per video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewRecord {
    pub video_id: VideoId,
    pub video_title: String,
    pub video_url: String,
    pub transcript: String,
    pub summary_brief: String,
    pub summary_detailed: String,
    pub key_phrases: Vec<KeyPhrase>,
    pub sentiment_scores: SentimentScores,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InterviewRecord {
    pub fn from_report(report: &Report, now: DateTime<Utc>) -> Self {
        Self {
            video_id: report.video_id.clone(),
            video_title: report.video.title.clone(),
            video_url: report.video_id.watch_url(),
            transcript: report.full_text.clone(),
            summary_brief: report.summary.brief.clone(),
            summary_detailed: report.summary.detailed.clone(),
            key_phrases: report.key_phrases.clone(),
            sentiment_scores: report.sentiment.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Persistence for analyses. `save` upserts by video id: a second save for the
/// same video replaces the stored fields but keeps the original `created_at`.
pub trait InterviewStore: Send + Sync {
    fn save(&self, record: &InterviewRecord) -> Result<()>;

    fn list(&self) -> Result<Vec<InterviewRecord>>;

    fn load(&self, video_id: &VideoId) -> Result<Option<InterviewRecord>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Json,
    Sqlite,
    None,
}

pub fn default_store_path(kind: StorageKind) -> PathBuf {
    let file = match kind {
        StorageKind::Sqlite => "interviews.db",
        _ => "interviews.json",
    };
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytinsight")
        .join(file)
}

/// Open the configured store; `StorageKind::None` disables persistence.
pub fn open_store(kind: StorageKind, path: Option<PathBuf>) -> Result<Option<Box<dyn InterviewStore>>> {
    let path = path.unwrap_or_else(|| default_store_path(kind));
    let store: Box<dyn InterviewStore> = match kind {
        StorageKind::Json => Box::new(JsonStore::open(path)?),
        StorageKind::Sqlite => Box::new(SqliteStore::open(path)?),
        StorageKind::None => return Ok(None),
    };
    Ok(Some(store))
}
