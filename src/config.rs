//! Run configuration loaded from a YAML file.
//!
//! Keys are camelCase. Every option has a default except `baseUrl`, which must
//! be set. Once validated, the configuration is split into the immutable
//! settings each component receives at construction; nothing reads it
//! globally.
//!
//! ```yaml
//! baseUrl: https://www.example.com
//! articleUrlTemplate: /news/{id}.html
//! startingId: 2000000
//! perRunAttemptCeiling: 500
//! consecutiveMissThreshold: 30
//! blockedPageMarkers: ["Access Denied"]
//! cursorPath: state/last_id.txt
//! feed:
//!   outputPath: docs/feed.xml
//!   title: Example News
//! ```

use crate::classify::ClassifierRules;
use crate::error::{CrawlError, CrawlResult};
use crate::fetch::{FetchSettings, RetryPolicy};
use crate::models::{ArticleUrl, Cursor, ID_PLACEHOLDER};
use crate::outputs::FeedSettings;
use crate::scan::{Pacing, ScanSettings};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Config {
    /// Site root; also the channel link of the generated feed.
    pub base_url: String,
    /// Path (or absolute URL) of an article, containing `{id}`.
    pub article_url_template: String,
    /// Cursor to resume from when no cursor file exists yet.
    pub starting_id: u64,
    pub per_run_attempt_ceiling: u32,
    pub consecutive_miss_threshold: u32,
    pub request_timeout_ms: u64,
    /// Retries after the first attempt for network-level failures.
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub min_content_length: usize,
    pub blocked_page_markers: Vec<String>,
    pub user_agent: String,
    /// Wall-clock budget for the whole scan. Unset means no deadline.
    pub run_deadline_secs: Option<u64>,
    pub cursor_path: PathBuf,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct FeedConfig {
    pub output_path: PathBuf,
    pub archive_path: PathBuf,
    pub title: String,
    pub description: String,
    pub max_items: usize,
    pub description_max_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            article_url_template: "/news/{id}.html".to_string(),
            starting_id: 0,
            per_run_attempt_ceiling: 500,
            consecutive_miss_threshold: 30,
            request_timeout_ms: 15_000,
            retry_attempts: 2,
            retry_delay_ms: 2_000,
            delay_min_ms: 1_000,
            delay_max_ms: 1_000,
            min_content_length: 200,
            blocked_page_markers: Vec::new(),
            user_agent: FetchSettings::default().user_agent,
            run_deadline_secs: None,
            cursor_path: PathBuf::from("state/last_id.txt"),
            feed: FeedConfig::default(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("docs/feed.xml"),
            archive_path: PathBuf::from("state/items.json"),
            title: "News feed".to_string(),
            description: "Automatically generated news feed".to_string(),
            max_items: 50,
            description_max_chars: 400,
        }
    }
}

impl Config {
    /// Read and validate the YAML file at `path`.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> CrawlResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| CrawlError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&text).map_err(|source| CrawlError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        info!(base_url = %config.base_url, starting_id = config.starting_id, "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> CrawlResult<()> {
        self.article_urls()?;
        if !self.article_url_template.contains(ID_PLACEHOLDER) {
            return Err(CrawlError::Config(format!(
                "articleUrlTemplate {:?} must contain {ID_PLACEHOLDER}",
                self.article_url_template
            )));
        }
        if self.per_run_attempt_ceiling == 0 {
            return Err(CrawlError::Config("perRunAttemptCeiling must be at least 1".into()));
        }
        if self.consecutive_miss_threshold == 0 {
            return Err(CrawlError::Config("consecutiveMissThreshold must be at least 1".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(CrawlError::Config("requestTimeoutMs must be at least 1".into()));
        }
        if self.delay_min_ms > self.delay_max_ms {
            return Err(CrawlError::Config(format!(
                "delayMinMs ({}) exceeds delayMaxMs ({})",
                self.delay_min_ms, self.delay_max_ms
            )));
        }
        if self.feed.max_items == 0 {
            return Err(CrawlError::Config("feed.maxItems must be at least 1".into()));
        }
        if self.starting_id == u64::MAX {
            return Err(CrawlError::Config("startingId leaves no IDs to scan".into()));
        }
        Ok(())
    }

    pub fn article_urls(&self) -> CrawlResult<ArticleUrl> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| CrawlError::Config(format!("invalid baseUrl {:?}: {e}", self.base_url)))?;
        let urls = ArticleUrl::new(base, self.article_url_template.clone());
        // Probe the template once so a bad template fails at startup, not mid-scan.
        let probe = Cursor::default()
            .next_candidate()
            .ok_or_else(|| CrawlError::Config("empty ID space".into()))?;
        urls.for_id(probe).map_err(|e| {
            CrawlError::Config(format!(
                "articleUrlTemplate {:?} does not form a URL: {e}",
                self.article_url_template
            ))
        })?;
        Ok(urls)
    }

    pub fn scan_settings(&self) -> CrawlResult<ScanSettings> {
        Ok(ScanSettings {
            urls: self.article_urls()?,
            per_run_attempt_ceiling: self.per_run_attempt_ceiling,
            consecutive_miss_threshold: self.consecutive_miss_threshold,
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            pacing: Pacing::new(
                Duration::from_millis(self.delay_min_ms),
                Duration::from_millis(self.delay_max_ms),
            ),
            run_deadline: self.run_deadline_secs.map(Duration::from_secs),
        })
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            user_agent: self.user_agent.clone(),
            connect_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retry_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn classifier_rules(&self) -> ClassifierRules {
        ClassifierRules {
            min_content_length: self.min_content_length,
            blocked_page_markers: self.blocked_page_markers.clone(),
        }
    }

    pub fn default_cursor(&self) -> Cursor {
        Cursor::new(self.starting_id)
    }

    pub fn feed_settings(&self) -> CrawlResult<FeedSettings> {
        Ok(FeedSettings {
            urls: self.article_urls()?,
            output_path: self.feed.output_path.clone(),
            archive_path: self.feed.archive_path.clone(),
            title: self.feed.title.clone(),
            description: self.feed.description.clone(),
            max_items: self.feed.max_items,
            description_max_chars: self.feed.description_max_chars,
        })
    }
}
