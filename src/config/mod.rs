pub mod env;
pub mod validation;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use directories::ProjectDirs;
use tracing::{debug, warn};

use crate::core::lyrics::CleanerSettings;
use crate::core::PipelineSettings;
use crate::error::{ConfigError, LyricSyncError, Result};
use env::{EnvParser, EnvVars};
use validation::ConfigValidator;

fn default_true() -> bool {
    true
}

fn default_enrich_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_enrich_target_lang() -> String {
    "zh".to_string()
}

fn default_search_timeout_secs() -> u64 {
    15
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_fetch_attempts() -> u32 {
    3
}

fn default_fetch_backoff_ms() -> u64 {
    500
}

fn default_max_candidates() -> usize {
    5
}

fn default_fetch_concurrency() -> usize {
    3
}

fn default_cache_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("net", "lyricsync", "lyricsync")
}

fn default_cache_dir() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.data_dir().join("lyrics"),
        None => {
            warn!("ProjectDirs unavailable; falling back to current directory for cache path");
            PathBuf::from("lyrics")
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Enable the QQ Music provider
    #[serde(default = "default_true")]
    pub enable_qq: bool,

    /// Enable the Kugou provider
    #[serde(default = "default_true")]
    pub enable_kugou: bool,

    /// Enable the Netease provider
    #[serde(default = "default_true")]
    pub enable_netease: bool,

    /// API key for the chat-completions enrichment endpoint
    #[serde(default)]
    pub enrich_key: Option<String>,

    /// Base URL of the enrichment endpoint (OpenAI-compatible)
    #[serde(default)]
    pub enrich_url: Option<String>,

    #[serde(default = "default_enrich_model")]
    pub enrich_model: String,

    /// Language requested from the enrichment model
    #[serde(default = "default_enrich_target_lang")]
    pub enrich_target_lang: String,

    /// Machine-translation endpoint used for romaji and English query expansion
    #[serde(default)]
    pub translate_url: Option<String>,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Redis URL for cache (optional)
    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,

    #[serde(default = "default_fetch_backoff_ms")]
    pub fetch_backoff_ms: u64,

    /// Ranked candidates fetched per request
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Candidate fetches in flight at once
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    #[serde(default)]
    pub cleaner: CleanerSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_qq: true,
            enable_kugou: true,
            enable_netease: true,
            enrich_key: None,
            enrich_url: None,
            enrich_model: default_enrich_model(),
            enrich_target_lang: default_enrich_target_lang(),
            translate_url: None,
            cache_enabled: true,
            cache_dir: default_cache_dir(),
            redis_url: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            search_timeout_secs: default_search_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            fetch_attempts: default_fetch_attempts(),
            fetch_backoff_ms: default_fetch_backoff_ms(),
            max_candidates: default_max_candidates(),
            fetch_concurrency: default_fetch_concurrency(),
            cleaner: CleanerSettings::default(),
        }
    }
}

impl Config {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // .env is optional (Docker and development)
        dotenvy::dotenv().ok();

        let config_file = match config_path {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    return Err(ConfigError::FileNotFound { path }.into());
                }
                path
            }
            None => Self::config_path()?,
        };

        let mut config = if config_file.exists() {
            debug!("Loading configuration from {}", config_file.display());
            let content = fs::read_to_string(&config_file)?;
            toml::from_str(&content)?
        } else {
            let config = Self::default();
            if let Some(parent) = config_file.parent() {
                fs::create_dir_all(parent)?;
            }
            config.save(&config_file)?;
            debug!("Wrote default configuration to {}", config_file.display());
            config
        };

        // Environment variables have the highest priority
        config.load_from_env()?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_env(&mut self) -> Result<()> {
        if let Some(value) = EnvParser::parse_bool(EnvVars::ENABLE_QQ)? {
            self.enable_qq = value;
        }
        if let Some(value) = EnvParser::parse_bool(EnvVars::ENABLE_KUGOU)? {
            self.enable_kugou = value;
        }
        if let Some(value) = EnvParser::parse_bool(EnvVars::ENABLE_NETEASE)? {
            self.enable_netease = value;
        }

        if let Some(key) = EnvParser::parse_string(EnvVars::ENRICH_KEY, None)? {
            self.enrich_key = Some(key);
        }
        if let Some(url) = EnvParser::parse_string(EnvVars::ENRICH_URL, Some(validate_http_url))? {
            self.enrich_url = Some(url);
        }
        if let Some(model) = EnvParser::parse_string(EnvVars::ENRICH_MODEL, None)? {
            self.enrich_model = model;
        }

        if let Some(url) = EnvParser::parse_string(EnvVars::TRANSLATE_URL, Some(validate_http_url))? {
            self.translate_url = Some(url);
        }

        if let Some(dir) = EnvParser::parse_path(EnvVars::CACHE_DIR, false)? {
            self.cache_dir = dir;
        }
        if let Some(url) = EnvParser::parse_string(EnvVars::REDIS_URL, Some(ConfigValidator::validate_redis_url))? {
            self.redis_url = Some(url);
        }
        if let Some(enabled) = EnvParser::parse_bool(EnvVars::CACHE_ENABLED)? {
            self.cache_enabled = enabled;
        }

        if let Some(secs) = EnvParser::parse_u64(EnvVars::SEARCH_TIMEOUT_SECS, 1, 300)? {
            self.search_timeout_secs = secs;
        }
        if let Some(secs) = EnvParser::parse_u64(EnvVars::FETCH_TIMEOUT_SECS, 1, 300)? {
            self.fetch_timeout_secs = secs;
        }
        if let Some(concurrency) = EnvParser::parse_usize(EnvVars::FETCH_CONCURRENCY, 1, 16)? {
            self.fetch_concurrency = concurrency;
        }

        Ok(())
    }

    /// Range and URL checks for values that came from the file.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.enrich_url {
            ConfigValidator::validate_url(url, "enrichment")?;
        }
        if let Some(url) = &self.translate_url {
            ConfigValidator::validate_url(url, "translation")?;
        }
        if let Some(url) = &self.redis_url {
            ConfigValidator::validate_redis_url(url)?;
        }
        ConfigValidator::validate_language(&self.enrich_target_lang, "enrich_target_lang")?;

        ConfigValidator::validate_range(self.search_timeout_secs, 1, 300, "search_timeout_secs")?;
        ConfigValidator::validate_range(self.fetch_timeout_secs, 1, 300, "fetch_timeout_secs")?;
        ConfigValidator::validate_range(self.fetch_attempts, 1, 10, "fetch_attempts")?;
        ConfigValidator::validate_range(self.fetch_backoff_ms, 0, 60_000, "fetch_backoff_ms")?;
        ConfigValidator::validate_range(self.max_candidates, 1, 50, "max_candidates")?;
        ConfigValidator::validate_range(self.fetch_concurrency, 1, 16, "fetch_concurrency")?;
        ConfigValidator::validate_range(self.cleaner.zero_time_threshold, 0.0, 60.0, "cleaner.zero_time_threshold")?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| LyricSyncError::Internal(e.into()))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let project_dirs = project_dirs().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_path".to_string(),
            value: "no home directory".to_string(),
        })?;

        Ok(project_dirs.config_dir().join("config.toml"))
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            search_timeout: Duration::from_secs(self.search_timeout_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            fetch_attempts: self.fetch_attempts,
            fetch_backoff: Duration::from_millis(self.fetch_backoff_ms),
            max_candidates: self.max_candidates,
            fetch_concurrency: self.fetch_concurrency,
        }
    }
}

fn validate_http_url(url: &str) -> Result<()> {
    ConfigValidator::validate_url(url, "HTTP endpoint")
}
