use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::analytics::DEFAULT_GRAVITY;
use crate::cache::{CacheSettings, DEFAULT_MAX_REPORTS_PER_CHANNEL, DEFAULT_PAGE_SIZE};
use crate::error::{AppError, Result};

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub youtube_api_key: Option<String>,
    pub gemini_api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Most recent uploads pulled per analysis.
    #[serde(default = "default_max_videos")]
    pub max_videos: usize,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    #[serde(default = "default_max_reports")]
    pub max_reports_per_channel: usize,

    /// Substrate byte quota; `0` disables the limit.
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: u64,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_gravity")]
    pub gravity: f64,

    #[serde(default = "default_highlight_top")]
    pub highlight_top: usize,

    #[serde(default = "default_tag_top_n")]
    pub tag_top_n: usize,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("channel-insights");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("reports.db").to_string_lossy().to_string()
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_max_videos() -> usize {
    50
}

fn default_ttl_hours() -> u64 {
    7 * 24
}

fn default_max_reports() -> usize {
    DEFAULT_MAX_REPORTS_PER_CHANNEL
}

fn default_quota_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_gravity() -> f64 {
    DEFAULT_GRAVITY
}

fn default_highlight_top() -> usize {
    5
}

fn default_tag_top_n() -> usize {
    10
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            max_reports_per_channel: default_max_reports(),
            quota_bytes: default_quota_bytes(),
            page_size: default_page_size(),
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            gravity: default_gravity(),
            highlight_top: default_highlight_top(),
            tag_top_n: default_tag_top_n(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            youtube_api_key: None,
            gemini_api_key: None,
            gemini_model: default_gemini_model(),
            max_videos: default_max_videos(),
            cache: CacheConfig::default(),
            ranking: RankingConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: Duration::from_secs(self.ttl_hours.saturating_mul(60 * 60)),
            max_reports_per_channel: self.max_reports_per_channel,
        }
    }

    pub fn quota(&self) -> Option<u64> {
        (self.quota_bytes > 0).then_some(self.quota_bytes)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.apply_env();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.cache.max_reports_per_channel == 0 {
            return Err(AppError::Config(
                "cache.max_reports_per_channel must be at least 1".to_string(),
            ));
        }
        if self.cache.ttl_hours == 0 {
            return Err(AppError::Config("cache.ttl_hours must be at least 1".to_string()));
        }
        if !self.ranking.gravity.is_finite() || self.ranking.gravity <= 0.0 {
            return Err(AppError::Config("ranking.gravity must be positive".to_string()));
        }
        Ok(())
    }

    /// API keys from the environment win over the file.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("YOUTUBE_API_KEY") {
            if !key.is_empty() {
                self.youtube_api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.is_empty() {
                self.gemini_api_key = Some(key);
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("channel-insights")
            .join("config.toml")
    }
}
