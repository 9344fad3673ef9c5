use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::de::DeserializeOwned;

use super::{InterviewRecord, InterviewStore};
use crate::{Error, Result, VideoId};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS interviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    video_id TEXT NOT NULL UNIQUE,
    video_title TEXT NOT NULL,
    video_url TEXT NOT NULL,
    transcript TEXT NOT NULL,
    summary_brief TEXT NOT NULL,
    summary_detailed TEXT NOT NULL,
    key_phrases TEXT NOT NULL,
    sentiment_scores TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);";

const COLUMNS: &str = "video_id, video_title, video_url, transcript, summary_brief, summary_detailed, \
key_phrases, sentiment_scores, created_at, updated_at";

/// Records in an `interviews` table, unique on `video_id`. Structured fields
/// (key phrases, sentiment) are stored as JSON text.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        debug!("Opening SQLite store: {}", path.display());
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("SQLite connection lock poisoned".to_string()))
    }
}

fn conversion_err(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, e))
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<InterviewRecord> {
    let video_id: String = row.get(0)?;
    Ok(InterviewRecord {
        video_id: VideoId::try_from(video_id).map_err(|e| conversion_err(0, e))?,
        video_title: row.get(1)?,
        video_url: row.get(2)?,
        transcript: row.get(3)?,
        summary_brief: row.get(4)?,
        summary_detailed: row.get(5)?,
        key_phrases: json_column(row, 6)?,
        sentiment_scores: json_column(row, 7)?,
        created_at: time_column(row, 8)?,
        updated_at: time_column(row, 9)?,
    })
}

impl InterviewStore for SqliteStore {
    fn save(&self, record: &InterviewRecord) -> Result<()> {
        let key_phrases = serde_json::to_string(&record.key_phrases)?;
        let sentiment = serde_json::to_string(&record.sentiment_scores)?;
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO interviews ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(video_id) DO UPDATE SET
                    video_title = excluded.video_title,
                    video_url = excluded.video_url,
                    transcript = excluded.transcript,
                    summary_brief = excluded.summary_brief,
                    summary_detailed = excluded.summary_detailed,
                    key_phrases = excluded.key_phrases,
                    sentiment_scores = excluded.sentiment_scores,
                    updated_at = excluded.updated_at"
            ),
            params![
                record.video_id.as_str(),
                record.video_title,
                record.video_url,
                record.transcript,
                record.summary_brief,
                record.summary_detailed,
                key_phrases,
                sentiment,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        debug!("Saved {} to SQLite", record.video_id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<InterviewRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM interviews ORDER BY id"))?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn load(&self, video_id: &VideoId) -> Result<Option<InterviewRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM interviews WHERE video_id = ?1"),
                [video_id.as_str()],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }
}
