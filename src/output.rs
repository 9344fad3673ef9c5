use std::fmt::Write;

use crate::Result;
use crate::analysis::SentimentScores;
use crate::metadata::format_duration;
use crate::report::Report;
use crate::storage::InterviewRecord;

const GAUGE_WIDTH: usize = 20;

/// Sentiment scores as display percentages, e.g. `0.8` → `80.00%`
pub fn format_sentiment(scores: &SentimentScores) -> Vec<(String, String)> {
    scores
        .iter()
        .map(|(metric, value)| (metric.clone(), format!("{:.2}%", value * 100.0)))
        .collect()
}

fn gauge(value: f64) -> String {
    let filled = (value.clamp(0.0, 1.0) * GAUGE_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(GAUGE_WIDTH - filled))
}

/// Render a report for the terminal
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let video = &report.video;
    let duration = format_duration(&video.duration).unwrap_or_else(|| video.duration.clone());

    let _ = writeln!(out, "{}", video.title);
    let _ = writeln!(out, "{} | {duration}", report.video_id.watch_url());
    let _ = writeln!(out, "Thumbnail: {}", video.thumbnail);

    let _ = writeln!(out, "\n--- Summary ---\n{}", report.summary.brief);
    let _ = writeln!(out, "\n--- Details ---\n{}", report.summary.detailed);

    let _ = writeln!(out, "\n--- Key Phrases ---");
    for kp in &report.key_phrases {
        let _ = writeln!(out, "* {}: {}", kp.phrase, kp.explanation);
    }

    let _ = writeln!(out, "\n--- Sentiment ---");
    let width = report.sentiment.keys().map(String::len).max().unwrap_or(0);
    for ((metric, pct), value) in format_sentiment(&report.sentiment).into_iter().zip(report.sentiment.values()) {
        let _ = writeln!(out, "{metric:<width$} {} {pct:>7}", gauge(*value));
    }

    let _ = write!(
        out,
        "\n--- Transcript ({}, {}) ---\n{}",
        report.caption_language, report.caption_kind, report.full_text
    );
    out
}

pub fn render_json(report: &Report) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// One line per saved analysis, newest update first
pub fn render_records(records: &[InterviewRecord]) -> String {
    let mut sorted: Vec<&InterviewRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    sorted
        .iter()
        .map(|r| {
            format!(
                "{}  {}  {}",
                r.video_id,
                r.updated_at.format("%Y-%m-%d %H:%M"),
                r.video_title
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
