use std::path::PathBuf;
use std::time::Duration;

use eyre::{Result, WrapErr};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;
use crate::storage::StorageKind;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub primary_lang: Option<String>,
    pub fallback_lang: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub storage: Option<StorageKind>,
    pub store_path: Option<PathBuf>,
}

impl Config {
    /// Load config from ~/.config/ytinsight/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path).wrap_err_with(|| format!("reading {}", path.display()))?;
            let config: Config = toml::from_str(&content).wrap_err_with(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Retry policy for every external call; attempts are clamped to `1..=MAX_RETRY_ATTEMPTS`.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self.retry_attempts {
            Some(n) => RetryPolicy::new(n.clamp(1, MAX_RETRY_ATTEMPTS)),
            None => RetryPolicy::default(),
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytinsight")
        .join("config.toml")
}
