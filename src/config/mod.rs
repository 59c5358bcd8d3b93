//! Configuration management for sitesearch
//!
//! Handles loading and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sites to crawl and index
    #[serde(default)]
    pub sites: Vec<SiteConfig>,

    /// Crawl configuration
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Field weights used to combine title and body occurrence counts
    #[serde(default)]
    pub weights: WeightsConfig,

    /// Path to the morphology dictionary (tab-separated surface/lemma/tags)
    pub dictionary_file: PathBuf,

    /// SQLite database file
    #[serde(default = "default_db_file")]
    pub db_file: PathBuf,
}

/// One configured site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Root URL without a trailing slash, e.g. "https://example.ru"
    pub url: String,

    /// Human-readable site name
    pub name: String,
}

/// Crawl configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// User agent string sent with every fetch
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Referrer header sent with every fetch
    #[serde(default = "default_referrer")]
    pub referrer: String,

    /// Politeness delay before each request, in milliseconds
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Fetch timeout in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Cap on concurrent page-index tasks per site
    #[serde(default = "default_max_concurrent_pages")]
    pub max_concurrent_pages: usize,

    /// How often the completion watcher polls indexing sites, in seconds
    #[serde(default = "default_heartbeat_poll_secs")]
    pub heartbeat_poll_secs: u64,

    /// Idle window after which an indexing site is declared indexed
    #[serde(default = "default_idle_window_secs")]
    pub idle_window_secs: u64,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Lemmas present on more than this percentage of candidate pages are
    /// dropped from the query
    #[serde(default = "default_max_lemma_frequency_percent")]
    pub max_lemma_frequency_percent: f32,

    /// Default result window size
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,

    /// Tokens of context on each side of the snippet anchor word
    #[serde(default = "default_snippet_window")]
    pub snippet_window: usize,
}

/// Field weights for rank computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_title_weight")]
    pub title: f32,

    #[serde(default = "default_body_weight")]
    pub body: f32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            referrer: default_referrer(),
            request_delay_ms: default_request_delay_ms(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_concurrent_pages: default_max_concurrent_pages(),
            heartbeat_poll_secs: default_heartbeat_poll_secs(),
            idle_window_secs: default_idle_window_secs(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_lemma_frequency_percent: default_max_lemma_frequency_percent(),
            default_limit: default_search_limit(),
            snippet_window: default_snippet_window(),
        }
    }
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            title: default_title_weight(),
            body: default_body_weight(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sites.is_empty() {
            return Err(Error::Config("at least one [[sites]] entry is required".to_string()));
        }

        for site in &self.sites {
            if site.url.ends_with('/') {
                return Err(Error::Config(format!(
                    "site url must not end with '/': {}",
                    site.url
                )));
            }
            url::Url::parse(&site.url)
                .map_err(|e| Error::Config(format!("invalid site url {}: {}", site.url, e)))?;
        }

        if self.weights.title < 0.0 || self.weights.body < 0.0 {
            return Err(Error::Config("field weights must be non-negative".to_string()));
        }

        let pct = self.search.max_lemma_frequency_percent;
        if !(0.0..=100.0).contains(&pct) {
            return Err(Error::Config(
                "search.max_lemma_frequency_percent must be between 0 and 100".to_string(),
            ));
        }

        if self.crawl.max_concurrent_pages == 0 {
            return Err(Error::Config(
                "crawl.max_concurrent_pages must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
