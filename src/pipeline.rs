use chrono::Utc;
use log::{info, warn};

use crate::analysis::AnalysisEngine;
use crate::captions::CaptionFetcher;
use crate::metadata::MetadataSource;
use crate::report::{self, Report, ReportVideo};
use crate::retry::{RetryPolicy, retry};
use crate::storage::{InterviewRecord, InterviewStore};
use crate::{Error, Result, extract_video_id};

/// A finished analysis and the outcome of persisting it. A failed save never
/// discards the report.
#[derive(Debug)]
pub struct Processed {
    pub report: Report,
    pub save_error: Option<Error>,
}

/// URL in, report out. Owns one handle per external service.
pub struct Pipeline {
    metadata: Box<dyn MetadataSource>,
    captions: CaptionFetcher,
    engine: AnalysisEngine,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        metadata: Box<dyn MetadataSource>,
        captions: CaptionFetcher,
        engine: AnalysisEngine,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            metadata,
            captions,
            engine,
            retry,
        }
    }

    /// Fetch metadata and captions concurrently, analyze the transcript and
    /// assemble the report. An unknown video, incomplete metadata or missing
    /// captions stop the run before any generation call.
    pub async fn run(&self, url: &str) -> Result<Report> {
        let video_id = extract_video_id(url).ok_or_else(|| Error::InvalidUrl(url.to_string()))?;
        info!("Processing video {video_id}");

        let (video_info, transcript) = tokio::join!(
            retry(&self.retry, "metadata", || self.metadata.video_info(&video_id)),
            self.captions.fetch(&video_id),
        );

        let video_info = video_info?.ok_or_else(|| Error::VideoNotFound(video_id.to_string()))?;
        let video = ReportVideo::from_info(&video_info)?;
        let transcript = transcript?.ok_or_else(|| Error::CaptionsUnavailable(video_id.to_string()))?;

        let analysis = self.engine.analyze(&transcript.text).await?;
        report::from_parts(video, analysis, &transcript)
    }

    /// Run, then hand the report to the store if there is one.
    pub async fn run_and_save(&self, url: &str, store: Option<&dyn InterviewStore>) -> Result<Processed> {
        let report = self.run(url).await?;
        let save_error = store.and_then(|store| {
            let record = InterviewRecord::from_report(&report, Utc::now());
            store.save(&record).err()
        });
        match &save_error {
            Some(e) => warn!("Analysis of {} not saved: {e}", report.video_id),
            None if store.is_some() => info!("Saved analysis of {}", report.video_id),
            None => {}
        }
        Ok(Processed { report, save_error })
    }
}
