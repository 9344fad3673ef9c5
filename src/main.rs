use std::io::{self, BufRead};
use std::path::PathBuf;

use eyre::{Result, WrapErr, bail};
use log::{debug, info};

use ytinsight::analysis::AnalysisEngine;
use ytinsight::captions::{CaptionFetcher, CaptionSource, LanguagePreference};
use ytinsight::config::{Config, DEFAULT_MODEL};
use ytinsight::metadata::DataApiClient;
use ytinsight::pipeline::Pipeline;
use ytinsight::storage::{self, InterviewStore, StorageKind};
use ytinsight::youtube::{InnerTubeSource, TimedTextSource};

mod cli;

use cli::{Cli, OutputFormat};

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytinsight.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytinsight")
        .join("logs")
}

fn key_status(var: &str, purpose: &str) -> String {
    if std::env::var(var).is_ok() {
        format!("  \x1b[32m✅\x1b[0m {var:<20} set")
    } else {
        format!("  \x1b[31m❌\x1b[0m {var:<20} (not set, needed for {purpose})")
    }
}

fn build_after_help() -> String {
    let keys = [
        key_status("YOUTUBE_API_KEY", "video metadata"),
        key_status("GEMINI_API_KEY", "gemini-* models"),
        key_status("OPENAI_API_KEY", "gpt-* models"),
        key_status("ANTHROPIC_API_KEY", "claude-* models"),
        key_status("YOUTUBE_OAUTH_TOKEN", "Data API caption downloads"),
    ]
    .join("\n");

    format!(
        "\nAPI KEYS:\n{keys}\n\nConfig: {}\nLogs are written to: {}",
        ytinsight::config::config_path().display(),
        log_dir().join("ytinsight.log").display()
    )
}

fn build_pipeline(cli: &Cli, config: &Config, client: &reqwest::Client) -> Result<Pipeline> {
    let retry = config.retry_policy();

    let youtube_key = std::env::var("YOUTUBE_API_KEY")
        .map_err(|_| eyre::eyre!("YOUTUBE_API_KEY environment variable not set (required for video metadata)"))?;
    let data_api = DataApiClient::new(client.clone(), youtube_key);

    let mut sources: Vec<Box<dyn CaptionSource>> = vec![
        Box::new(InnerTubeSource::new(client.clone())),
        Box::new(TimedTextSource::new(client.clone())),
    ];
    if let Ok(token) = std::env::var("YOUTUBE_OAUTH_TOKEN") {
        sources.push(Box::new(data_api.caption_source(token)));
    }

    let primary = cli
        .lang
        .clone()
        .or_else(|| config.primary_lang.clone())
        .unwrap_or_else(|| "en".to_string());
    let fallback = cli
        .fallback_lang
        .clone()
        .or_else(|| config.fallback_lang.clone())
        .unwrap_or_else(|| "en".to_string());
    let languages = LanguagePreference::new(primary, fallback);
    debug!("Caption languages: {languages:?}");

    let model = cli
        .model
        .clone()
        .or_else(|| config.model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let generator = ytinsight::generation::generator_for_model(client.clone(), &model)?;

    Ok(Pipeline::new(
        Box::new(data_api),
        CaptionFetcher::new(sources, languages, retry),
        AnalysisEngine::new(generator, retry),
        retry,
    ))
}

fn open_store(cli: &Cli, config: &Config) -> Result<Option<Box<dyn InterviewStore>>> {
    let kind = cli.storage.or(config.storage).unwrap_or(StorageKind::Json);
    let path = cli.store.clone().or_else(|| config.store_path.clone());
    if cli.verbose && kind != StorageKind::None {
        let shown = path.clone().unwrap_or_else(|| storage::default_store_path(kind));
        eprintln!("Storage: {kind:?} at {}", shown.display());
    }
    storage::open_store(kind, path).wrap_err("opening analysis store")
}

fn emit(cli: &Cli, rendered: &str) -> Result<()> {
    if let Some(ref path) = cli.output {
        std::fs::write(path, rendered)?;
        if cli.verbose {
            eprintln!("Output written to: {}", path.display());
        }
    } else {
        println!("{rendered}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let after_help = build_after_help();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    // Load config file (non-fatal if missing/invalid)
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring config: {e:#}");
        Config::default()
    });

    let store = open_store(&cli, &config)?;

    if cli.list {
        let Some(store) = store.as_deref() else {
            bail!("--list needs a store; --storage none disables it");
        };
        let records = store.list()?;
        let rendered = match cli.format {
            OutputFormat::Text => ytinsight::output::render_records(&records),
            OutputFormat::Json => serde_json::to_string_pretty(&records)?,
        };
        return emit(&cli, &rendered);
    }

    let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
    let pipeline = build_pipeline(&cli, &config, &client)?;

    // Collect URLs: from arg or stdin
    let urls = if let Some(ref url) = cli.url {
        vec![url.clone()]
    } else {
        let stdin = io::stdin();
        stdin.lock().lines().collect::<Result<Vec<_>, _>>()?
    };

    if urls.is_empty() {
        bail!("no URL or video ID provided\n\nUsage: ytinsight <URL>\n       echo <URL> | ytinsight");
    }

    for url_input in &urls {
        let url_input = url_input.trim();
        if url_input.is_empty() {
            continue;
        }

        let processed = match pipeline.run_and_save(url_input, store.as_deref()).await {
            Ok(p) => p,
            Err(e @ ytinsight::Error::InvalidUrl(_)) => {
                return Err(eyre::eyre!(e).wrap_err(
                    "Supported formats:\n  https://www.youtube.com/watch?v=ID\n  https://youtu.be/ID\n  https://www.youtube.com/embed/ID\n  https://www.youtube.com/shorts/ID\n  <11-character video ID>",
                ));
            }
            Err(e) => return Err(eyre::eyre!(e).wrap_err(format!("analysis of {url_input} failed"))),
        };

        let report = &processed.report;
        if cli.verbose {
            eprintln!("Video: {} ({})", report.video.title, report.video_id);
            eprintln!("Captions: {} ({})", report.caption_language, report.caption_kind);
        }

        let rendered = match cli.format {
            OutputFormat::Text => ytinsight::output::render_text(report),
            OutputFormat::Json => ytinsight::output::render_json(report)?,
        };
        emit(&cli, &rendered)?;

        if let Some(e) = processed.save_error {
            eprintln!("Warning: analysis was not saved: {e}");
        }
    }

    Ok(())
}
