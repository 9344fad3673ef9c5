use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;

use super::{InterviewRecord, InterviewStore};
use crate::{Error, Result, VideoId};

fn storage_err(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::Storage(format!("{}: {err}", path.display()))
}

/// All records in one pretty-printed JSON array
pub struct JsonStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStore {
    /// Open the store, creating the directory and an empty array file if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| storage_err(dir, e))?;
        }
        if !path.exists() {
            std::fs::write(&path, "[]").map_err(|e| storage_err(&path, e))?;
            debug!("Created JSON store: {}", path.display());
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<InterviewRecord>> {
        let data = std::fs::read_to_string(&self.path).map_err(|e| storage_err(&self.path, e))?;
        serde_json::from_str(&data).map_err(|e| storage_err(&self.path, e))
    }

    /// Write through a sibling temp file so a crash never leaves half an array behind.
    fn write_all(&self, records: &[InterviewRecord]) -> Result<()> {
        let data = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data).map_err(|e| storage_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| storage_err(&self.path, e))
    }
}

impl InterviewStore for JsonStore {
    fn save(&self, record: &InterviewRecord) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::Storage("JSON store lock poisoned".to_string()))?;

        let mut records = self.read_all()?;
        match records.iter_mut().find(|r| r.video_id == record.video_id) {
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = record.clone();
                existing.created_at = created_at;
                debug!("Updated {} in {}", record.video_id, self.path.display());
            }
            None => {
                records.push(record.clone());
                debug!("Added {} to {}", record.video_id, self.path.display());
            }
        }
        self.write_all(&records)
    }

    fn list(&self) -> Result<Vec<InterviewRecord>> {
        self.read_all()
    }

    fn load(&self, video_id: &VideoId) -> Result<Option<InterviewRecord>> {
        Ok(self.read_all()?.into_iter().find(|r| &r.video_id == video_id))
    }
}
