//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::Watch;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client, retry and concurrency settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Snapshot database location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Notification transport; notifications are only logged when absent
    #[serde(default)]
    pub notify: Option<NotifyConfig>,

    /// Status codes that never trigger an error notification
    #[serde(default)]
    pub http_errors_to_ignore: Vec<u16>,

    /// Watched resources, processed in declaration order
    #[serde(default)]
    pub watches: Vec<Watch>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load and validate configuration.
    pub fn load_validated(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.retries == 0 {
            return Err(AppError::validation("http.retries must be > 0"));
        }
        if self.http.parallel_checks == 0 {
            return Err(AppError::validation("http.parallel_checks must be > 0"));
        }
        if self.storage.database.as_os_str().is_empty() {
            return Err(AppError::validation("storage.database is empty"));
        }

        if let Some(notify) = &self.notify {
            Url::parse(&notify.webhook_url).map_err(|e| {
                AppError::validation(format!("notify.webhook_url is invalid: {e}"))
            })?;
            if notify.timeout_secs == 0 {
                return Err(AppError::validation("notify.timeout_secs must be > 0"));
            }
        }

        let mut seen_urls = HashSet::new();
        for watch in &self.watches {
            if watch.name.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "watch for {} has no name",
                    watch.url
                )));
            }

            let url = Url::parse(&watch.url).map_err(|e| {
                AppError::validation(format!("watch {} has invalid url: {e}", watch.name))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(AppError::validation(format!(
                    "watch {} must use http or https, got {}",
                    watch.name,
                    url.scheme()
                )));
            }

            // Snapshots are keyed by URL, so two watches must never share one.
            if !seen_urls.insert(watch.url.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate watch url {}",
                    watch.url
                )));
            }
        }

        Ok(())
    }

    /// URLs of every configured watch, disabled ones included.
    pub fn watch_urls(&self) -> HashSet<String> {
        self.watches.iter().map(|w| w.url.clone()).collect()
    }

    /// Whether `status` is in the global ignore list or the watch's own.
    pub fn ignores_status(&self, watch: &Watch, status: u16) -> bool {
        self.http_errors_to_ignore.contains(&status)
            || watch.additional_http_errors_to_ignore.contains(&status)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            storage: StorageConfig::default(),
            notify: None,
            http_errors_to_ignore: Vec::new(),
            watches: Vec::new(),
        }
    }
}

/// HTTP client and scheduling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per fetch, including the first one
    #[serde(default = "defaults::retries")]
    pub retries: u32,

    /// Delay between attempts in milliseconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,

    /// Maximum number of watches checked at the same time
    #[serde(default = "defaults::parallel_checks")]
    pub parallel_checks: usize,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            retries: defaults::retries(),
            retry_delay_ms: defaults::retry_delay(),
            parallel_checks: defaults::parallel_checks(),
        }
    }
}

/// Snapshot database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the JSON snapshot database
    #[serde(default = "defaults::database")]
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: defaults::database(),
        }
    }
}

/// Webhook notification transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Endpoint receiving rendered messages as JSON
    pub webhook_url: String,

    /// Sender address passed along with every message
    #[serde(default = "defaults::from")]
    pub from: String,

    /// Recipients of every message
    #[serde(default)]
    pub to: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

mod defaults {
    use std::path::PathBuf;

    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; webwatch/1.0)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn retries() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        2000
    }
    pub fn parallel_checks() -> usize {
        5
    }
    pub fn database() -> PathBuf {
        PathBuf::from("database.json")
    }
    pub fn from() -> String {
        "webwatch@localhost".into()
    }
}
