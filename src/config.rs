//! Configuration management for the Kalon explorer client
//!
//! Settings come from an optional `explorer.toml`, then environment variables
//! override the API endpoint. Every field has a default so an absent file
//! yields a working configuration against a local explorer API.

use crate::error::ConfigError;
use crate::resource::ResourceKind;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "explorer.toml";
pub const ENV_API_URL: &str = "KALON_API_URL";
pub const ENV_API_TIMEOUT_SECS: &str = "KALON_API_TIMEOUT_SECS";

/// Backend caps `limit` at this value.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Per-resource refresh periods. Kinds missing from the table use the
/// built-in dashboard cadence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollingConfig {
    #[serde(default, deserialize_with = "deserialize_intervals")]
    pub intervals: HashMap<ResourceKind, Duration>,
}

impl PollingConfig {
    pub fn interval_for(&self, kind: ResourceKind) -> Duration {
        self.intervals
            .get(&kind)
            .copied()
            .unwrap_or_else(|| default_interval(kind))
    }

    pub fn with_interval(mut self, kind: ResourceKind, interval: Duration) -> Self {
        self.intervals.insert(kind, interval);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            currency_symbol: default_currency_symbol(),
            page_size: default_page_size(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Apply environment overrides. `lookup` is `std::env::var(..).ok()` in
    /// production and a map in tests.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api.base_url = url.trim().to_string();
        }
        if let Some(secs) = lookup(ENV_API_TIMEOUT_SECS) {
            self.api.timeout_secs = secs.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} must be an integer, got '{}'", ENV_API_TIMEOUT_SECS, secs))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.api.base_url)
            .map_err(|e| ConfigError::Invalid(format!("api.base_url '{}': {}", self.api.base_url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Invalid(format!(
                "api.base_url must be http(s), got '{}'",
                url.scheme()
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be positive".to_string()));
        }

        if let Some((kind, _)) = self.polling.intervals.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::Invalid(format!(
                "polling.intervals.{} must be positive",
                kind
            )));
        }

        if self.display.page_size == 0 || self.display.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "display.page_size must be within 1..={}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(())
    }
}

/// Load configuration from the first file found in the search path, falling
/// back to defaults, then apply environment overrides and validate.
pub fn load_config() -> Result<Config, ConfigError> {
    let mut config = match config_search_path().into_iter().find(|p| p.is_file()) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            Config::from_toml_str(&fs::read_to_string(&path)?)?
        }
        None => Config::default(),
    };
    config.apply_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from an explicit file. A missing file is an error here.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let mut config = Config::from_toml_str(&fs::read_to_string(path)?)?;
    config.apply_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

fn config_search_path() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("kalon-explorer").join(CONFIG_FILE_NAME));
    }
    paths
}

/// Dashboard cadence: slow-moving network data every 30 s, chain data every 10 s.
pub fn default_interval(kind: ResourceKind) -> Duration {
    match kind {
        ResourceKind::NetworkStats | ResourceKind::Treasury | ResourceKind::Peers => {
            Duration::from_secs(30)
        }
        ResourceKind::Blocks
        | ResourceKind::Transactions
        | ResourceKind::PendingTransactions
        | ResourceKind::LatestBlock
        | ResourceKind::Stats => Duration::from_secs(10),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Secs(u64),
    Text(String),
}

fn deserialize_intervals<'de, D>(deserializer: D) -> Result<HashMap<ResourceKind, Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = HashMap::<String, RawDuration>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(name, value)| {
            let kind = ResourceKind::from_name(&name).ok_or_else(|| {
                serde::de::Error::custom(format!("unknown resource kind '{}'", name))
            })?;
            let duration = match value {
                RawDuration::Secs(secs) => Duration::from_secs(secs),
                RawDuration::Text(text) => humantime::parse_duration(&text).map_err(|e| {
                    serde::de::Error::custom(format!("invalid interval for {}: {}", kind, e))
                })?,
            };
            Ok((kind, duration))
        })
        .collect()
}

fn default_base_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_currency_symbol() -> String {
    "KALON".to_string()
}

fn default_page_size() -> u32 {
    20
}
