use clap::Parser;
use std::path::PathBuf;

use ytinsight::storage::StorageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "ytinsight",
    about = "Summarize a YouTube interview and score its sentiment",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// YouTube video URL or video ID (reads from stdin if omitted)
    pub url: Option<String>,

    /// Output format: text (default), json
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Preferred caption language [default: en]
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Caption language to try when the preferred one is missing [default: en]
    #[arg(long)]
    pub fallback_lang: Option<String>,

    /// LLM model for analysis (gemini-*, gpt-*, claude-*)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Where to save analyses [default: json]
    #[arg(long, value_enum)]
    pub storage: Option<StorageKind>,

    /// Path of the JSON file or SQLite database
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// List saved analyses instead of analyzing a video
    #[arg(long)]
    pub list: bool,

    /// Show caption source and storage details
    #[arg(short, long)]
    pub verbose: bool,
}
