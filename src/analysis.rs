use std::collections::BTreeMap;
use std::sync::LazyLock;

use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::generation::TextGenerator;
use crate::retry::{RetryPolicy, retry};
use crate::{Error, Result};

const BRIEF_PROMPT: &str = "Summarize the following interview text in 2-3 sentences, \
focusing on the most important points: ";

const DETAILED_PROMPT: &str = "Provide a detailed summary of the following interview text \
in bullet points, highlighting key discussion points: ";

const KEY_PHRASES_PROMPT: &str = "Extract the 5-7 most important phrases or technical terms from \
the following interview text. Put each on its own line in the form 'phrase: explanation', \
where the explanation briefly describes its context and importance: ";

const SENTIMENT_PROMPT: &str = "Analyze the sentiment of the following interview text. \
Provide scores from 0 to 1 for: confidence, positivity, and engagement. \
Format the response as 'confidence: X, positivity: Y, engagement: Z': ";

/// Metrics every sentiment response must contain
pub const SENTIMENT_METRICS: [&str; 3] = ["confidence", "positivity", "engagement"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub brief: String,
    pub detailed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPhrase {
    pub phrase: String,
    pub explanation: String,
}

/// Metric name to score in [0, 1]
pub type SentimentScores = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: Summary,
    pub key_phrases: Vec<KeyPhrase>,
    pub sentiment: SentimentScores,
}

pub struct AnalysisEngine {
    generator: Box<dyn TextGenerator>,
    retry: RetryPolicy,
}

impl AnalysisEngine {
    pub fn new(generator: Box<dyn TextGenerator>, retry: RetryPolicy) -> Self {
        Self { generator, retry }
    }

    /// Run every analysis prompt over the transcript. The prompts are independent
    /// and run concurrently; the first failure fails the whole analysis.
    pub async fn analyze(&self, transcript: &str) -> Result<AnalysisResult> {
        info!("Analyzing transcript ({} chars)", transcript.len());
        let (brief, detailed, key_phrases, sentiment) = tokio::try_join!(
            self.ask("brief summary", BRIEF_PROMPT, transcript),
            self.ask("detailed summary", DETAILED_PROMPT, transcript),
            self.extract_key_phrases(transcript),
            self.analyze_sentiment(transcript),
        )?;

        Ok(AnalysisResult {
            summary: Summary {
                brief: brief.trim().to_string(),
                detailed: detailed.trim().to_string(),
            },
            key_phrases,
            sentiment,
        })
    }

    pub async fn extract_key_phrases(&self, transcript: &str) -> Result<Vec<KeyPhrase>> {
        let response = self.ask("key phrases", KEY_PHRASES_PROMPT, transcript).await?;
        let phrases = parse_key_phrases(&response);
        if phrases.is_empty() {
            warn!("No key phrases could be parsed from the response");
        }
        Ok(phrases)
    }

    pub async fn analyze_sentiment(&self, transcript: &str) -> Result<SentimentScores> {
        let response = self.ask("sentiment", SENTIMENT_PROMPT, transcript).await?;
        parse_sentiment(&response)
    }

    async fn ask(&self, what: &str, instruction: &str, transcript: &str) -> Result<String> {
        let prompt = format!("{instruction}{transcript}");
        let text = retry(&self.retry, what, || self.generator.generate(&prompt)).await?;
        debug!("{what}: {} chars of response", text.len());
        Ok(text)
    }
}

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]+|\d+[.)])\s*").unwrap());

fn clean_label(raw: &str) -> &str {
    let raw = LIST_MARKER.find(raw).map_or(raw, |m| &raw[m.end()..]);
    raw.trim().trim_matches(|c: char| matches!(c, '*' | '"' | '\'' | '`' | '_')).trim()
}

/// Parse `phrase: explanation` lines, splitting on the first colon. Lines
/// without a colon, or with nothing on either side of it, are skipped; the
/// latter also drops a `Key phrases:` heading above the list.
pub fn parse_key_phrases(response: &str) -> Vec<KeyPhrase> {
    response
        .lines()
        .filter_map(|line| {
            let (phrase, explanation) = line.split_once(':')?;
            let phrase = clean_label(phrase);
            let explanation = explanation.trim().trim_start_matches('*').trim();
            if phrase.is_empty() || explanation.is_empty() {
                return None;
            }
            Some(KeyPhrase {
                phrase: phrase.to_string(),
                explanation: explanation.to_string(),
            })
        })
        .collect()
}

fn parse_score(metric: &str, raw: &str) -> Result<f64> {
    let raw = raw.trim().trim_matches('*').trim_end_matches('.').trim();
    let (number, scale) = match raw.strip_suffix('%') {
        Some(n) => (n.trim(), 100.0),
        None => (raw, 1.0),
    };
    let value = number
        .parse::<f64>()
        .map_err(|_| Error::parse("sentiment", format!("value for {metric} is not a number: {raw:?}")))?;
    if !value.is_finite() {
        return Err(Error::parse("sentiment", format!("value for {metric} is not finite: {raw:?}")));
    }
    let value = value / scale;
    if !(0.0..=1.0).contains(&value) {
        warn!("Sentiment {metric} = {value} out of range, clamping");
    }
    Ok(value.clamp(0.0, 1.0))
}

/// Parse `metric: value` pairs separated by commas (or newlines).
///
/// Strict: a segment without a colon, a non-numeric value, or a missing
/// canonical metric fails the parse instead of defaulting. Metrics outside the
/// canonical set are kept.
pub fn parse_sentiment(response: &str) -> Result<SentimentScores> {
    let mut scores = SentimentScores::new();

    for segment in response.split([',', '\n']) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (metric, value) = segment
            .split_once(':')
            .ok_or_else(|| Error::parse("sentiment", format!("segment has no ':' delimiter: {segment:?}")))?;
        let metric = clean_label(metric).to_lowercase();
        if metric.is_empty() {
            return Err(Error::parse("sentiment", format!("segment has no metric name: {segment:?}")));
        }
        let value = parse_score(&metric, value)?;
        scores.insert(metric, value);
    }

    for metric in SENTIMENT_METRICS {
        if !scores.contains_key(metric) {
            return Err(Error::parse("sentiment", format!("missing metric {metric}")));
        }
    }

    Ok(scores)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;

    #[test]
    fn test_parse_sentiment_exact() {
        let scores = parse_sentiment("confidence: 0.8, positivity: 0.6, engagement: 0.9").unwrap();
        let expected: SentimentScores = [("confidence", 0.8), ("positivity", 0.6), ("engagement", 0.9)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(scores, expected);
    }

    #[test]
    fn test_parse_sentiment_non_numeric() {
        let err = parse_sentiment("speed: 1, efficiency: notanumber").unwrap_err();
        assert!(matches!(err, Error::Parse { what: "sentiment", .. }));
    }

    #[test]
    fn test_parse_sentiment_missing_delimiter() {
        let err = parse_sentiment("confidence: 0.8, positivity 0.6, engagement: 0.9").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_parse_sentiment_missing_metric() {
        let err = parse_sentiment("confidence: 0.8, positivity: 0.6").unwrap_err();
        assert!(err.to_string().contains("engagement"));
    }

    #[test]
    fn test_parse_sentiment_tolerates_drift() {
        let scores = parse_sentiment("**Confidence**: 0.7\nPositivity: 65%\nEngagement: 0.9.\n").unwrap();
        assert_eq!(scores["confidence"], 0.7);
        assert_eq!(scores["positivity"], 0.65);
        assert_eq!(scores["engagement"], 0.9);
    }

    #[test]
    fn test_parse_sentiment_clamps_and_keeps_extra_metrics() {
        let scores = parse_sentiment("confidence: 1.4, positivity: -0.2, engagement: 0.5, clarity: 0.3").unwrap();
        assert_eq!(scores["confidence"], 1.0);
        assert_eq!(scores["positivity"], 0.0);
        assert_eq!(scores["clarity"], 0.3);
    }

    #[test]
    fn test_parse_sentiment_rejects_nan() {
        assert!(parse_sentiment("confidence: NaN, positivity: 0.6, engagement: 0.9").is_err());
    }

    #[test]
    fn test_parse_key_phrases_drops_malformed() {
        let response = "Ownership: Rust's memory model\nthis line has no delimiter\nBorrow checker: enforces aliasing rules\nAsync: futures and executors";
        let phrases = parse_key_phrases(response);
        let names: Vec<&str> = phrases.iter().map(|p| p.phrase.as_str()).collect();
        assert_eq!(names, vec!["Ownership", "Borrow checker", "Async"]);
        assert_eq!(phrases[1].explanation, "enforces aliasing rules");
    }

    #[test]
    fn test_parse_key_phrases_splits_on_first_colon() {
        let phrases = parse_key_phrases("Time: 10:30 is when the talk starts");
        assert_eq!(phrases[0].phrase, "Time");
        assert_eq!(phrases[0].explanation, "10:30 is when the talk starts");
    }

    #[test]
    fn test_parse_key_phrases_strips_list_markup() {
        let response = "1. **Zero-cost abstractions**: no runtime overhead\n- *Traits*: shared behaviour\n* `Cargo`: the build tool";
        let phrases = parse_key_phrases(response);
        let names: Vec<&str> = phrases.iter().map(|p| p.phrase.as_str()).collect();
        assert_eq!(names, vec!["Zero-cost abstractions", "Traits", "Cargo"]);
    }

    #[test]
    fn test_parse_key_phrases_skips_heading_line() {
        let response = "Here are the key phrases:\nOwnership: Rust's memory model\n**Lifetimes**:   \nTraits: shared behaviour";
        let phrases = parse_key_phrases(response);
        let names: Vec<&str> = phrases.iter().map(|p| p.phrase.as_str()).collect();
        assert_eq!(names, vec!["Ownership", "Traits"]);
    }

    #[test]
    fn test_parse_key_phrases_empty() {
        assert!(parse_key_phrases("").is_empty());
        assert!(parse_key_phrases("no structure at all").is_empty());
    }

    /// Answers each prompt by its leading instruction
    struct ScriptedGenerator {
        sentiment: &'static str,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = if prompt.starts_with(BRIEF_PROMPT) {
                "  A short summary.\n"
            } else if prompt.starts_with(DETAILED_PROMPT) {
                "- point one\n- point two"
            } else if prompt.starts_with(KEY_PHRASES_PROMPT) {
                "Rust: a systems language\nnoise\nCargo: its package manager"
            } else {
                self.sentiment
            };
            Ok(reply.to_string())
        }
    }

    #[tokio::test]
    async fn test_analyze_assembles_all_parts() {
        let generator = ScriptedGenerator {
            sentiment: "confidence: 0.8, positivity: 0.6, engagement: 0.9",
            calls: AtomicU32::new(0),
        };
        let engine = AnalysisEngine::new(Box::new(generator), RetryPolicy::immediate(1));
        let result = engine.analyze("the transcript").await.unwrap();
        assert_eq!(result.summary.brief, "A short summary.");
        assert_eq!(result.summary.detailed, "- point one\n- point two");
        assert_eq!(result.key_phrases.len(), 2);
        assert_eq!(result.sentiment["engagement"], 0.9);
    }

    #[tokio::test]
    async fn test_analyze_fails_on_bad_sentiment() {
        let generator = ScriptedGenerator {
            sentiment: "speed: 1, efficiency: notanumber",
            calls: AtomicU32::new(0),
        };
        let engine = AnalysisEngine::new(Box::new(generator), RetryPolicy::immediate(1));
        let err = engine.analyze("the transcript").await.unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    struct DownGenerator {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TextGenerator for DownGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::http_status("gemini", reqwest::StatusCode::SERVICE_UNAVAILABLE, "overloaded"))
        }
    }

    #[tokio::test]
    async fn test_sentiment_retries_transport_then_fails() {
        let engine = AnalysisEngine::new(Box::new(DownGenerator { calls: AtomicU32::new(0) }), RetryPolicy::immediate(2));
        let err = engine.analyze_sentiment("text").await.unwrap_err();
        assert!(err.is_transport());
    }
}
