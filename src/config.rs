//! Configuration module for feedwatch.

use serde::Deserialize;
use std::path::Path;

use crate::{FeedwatchError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/feedwatch.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/feedwatch.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// HTTP fetch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum response body size in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size_bytes: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_body_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_body_size_bytes: default_max_body_size(),
        }
    }
}

/// Polling cadence and retry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Base polling interval in minutes.
    #[serde(default = "default_base_interval")]
    pub base_interval_mins: u64,
    /// Backoff schedule in minutes, applied per consecutive failure.
    #[serde(default = "default_backoff_minutes")]
    pub backoff_minutes: Vec<u64>,
    /// Maximum failed attempts before returning to the base cadence.
    ///
    /// Zero means "length of the backoff schedule".
    #[serde(default)]
    pub max_attempts: u32,
    /// Number of sources fetched concurrently within one pass.
    ///
    /// 1 = strictly sequential (single-device profile).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_base_interval() -> u64 {
    15
}

fn default_backoff_minutes() -> Vec<u64> {
    vec![1, 2, 5]
}

fn default_concurrency() -> usize {
    1
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            base_interval_mins: default_base_interval(),
            backoff_minutes: default_backoff_minutes(),
            max_attempts: 0,
            concurrency: default_concurrency(),
        }
    }
}

impl PollConfig {
    /// Effective attempt cap: explicit value, or the schedule length.
    pub fn effective_max_attempts(&self) -> u32 {
        if self.max_attempts > 0 {
            self.max_attempts
        } else {
            self.backoff_minutes.len() as u32
        }
    }

    /// Backoff delay in minutes for the given attempt count.
    pub fn backoff_for_attempt(&self, attempt: u32) -> u64 {
        let idx = (attempt as usize).min(self.backoff_minutes.len().saturating_sub(1));
        self.backoff_minutes.get(idx).copied().unwrap_or(self.base_interval_mins)
    }
}

/// Timeline source configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineConfig {
    /// Base URL of the timeline API.
    #[serde(default = "default_timeline_api_base")]
    pub api_base: String,
    /// Bearer token for the timeline API. Empty = timeline sources skipped.
    #[serde(default)]
    pub bearer_token: String,
    /// Page size for recent-items requests.
    #[serde(default = "default_timeline_page_size")]
    pub page_size: usize,
}

fn default_timeline_api_base() -> String {
    "https://api.example.com/2".to_string()
}

fn default_timeline_page_size() -> usize {
    20
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            api_base: default_timeline_api_base(),
            bearer_token: String::new(),
            page_size: default_timeline_page_size(),
        }
    }
}

/// Notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Maximum notifications retained in history (oldest evicted first).
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
    /// Items treated as new on a source's first-ever fetch.
    #[serde(default = "default_first_run_limit")]
    pub first_run_limit: usize,
    /// Case-insensitive title keywords that mark an item as breaking.
    ///
    /// This is a heuristic, not a feed-provided flag.
    #[serde(default = "default_breaking_keywords")]
    pub breaking_keywords: Vec<String>,
    /// Maximum notification message length in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

fn default_history_cap() -> usize {
    50
}

fn default_first_run_limit() -> usize {
    5
}

fn default_breaking_keywords() -> Vec<String> {
    vec!["breaking".to_string(), "urgent".to_string(), "alert".to_string()]
}

fn default_max_message_length() -> usize {
    500
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            history_cap: default_history_cap(),
            first_run_limit: default_first_run_limit(),
            breaking_keywords: default_breaking_keywords(),
            max_message_length: default_max_message_length(),
        }
    }
}

/// Push fanout configuration (server variant).
#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Whether server-side fanout is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Push gateway endpoint URL.
    #[serde(default)]
    pub endpoint: String,
    /// API key for the push gateway (must be set if enabled).
    #[serde(default)]
    pub api_key: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            api_key: String::new(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// HTTP fetch configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Polling cadence configuration.
    #[serde(default)]
    pub poll: PollConfig,
    /// Timeline source configuration.
    #[serde(default)]
    pub timeline: TimelineConfig,
    /// Notification configuration.
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Push fanout configuration.
    #[serde(default)]
    pub push: PushConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FeedwatchError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| FeedwatchError::Validation(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FEEDWATCH_TIMELINE_TOKEN`: Override the timeline bearer token
    /// - `FEEDWATCH_PUSH_API_KEY`: Override the push gateway API key
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("FEEDWATCH_TIMELINE_TOKEN") {
            if !token.is_empty() {
                self.timeline.bearer_token = token;
            }
        }
        if let Ok(key) = std::env::var("FEEDWATCH_PUSH_API_KEY") {
            if !key.is_empty() {
                self.push.api_key = key;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - The base polling interval is zero
    /// - The backoff schedule is empty
    /// - Push fanout is enabled without an endpoint
    pub fn validate(&self) -> Result<()> {
        if self.poll.base_interval_mins == 0 {
            return Err(FeedwatchError::Validation(
                "poll.base_interval_mins must be at least 1".to_string(),
            ));
        }
        if self.poll.backoff_minutes.is_empty() {
            return Err(FeedwatchError::Validation(
                "poll.backoff_minutes must not be empty".to_string(),
            ));
        }
        if self.push.enabled && self.push.endpoint.is_empty() {
            return Err(FeedwatchError::Validation(
                "push fanout is enabled but push.endpoint is not set. \
                 Set it in config.toml."
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.database.path, "data/feedwatch.db");

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/feedwatch.log");

        assert_eq!(config.fetch.connect_timeout_secs, 10);
        assert_eq!(config.fetch.read_timeout_secs, 20);
        assert_eq!(config.fetch.total_timeout_secs, 30);
        assert_eq!(config.fetch.max_redirects, 5);
        assert_eq!(config.fetch.max_body_size_bytes, 5 * 1024 * 1024);

        assert_eq!(config.poll.base_interval_mins, 15);
        assert_eq!(config.poll.backoff_minutes, vec![1, 2, 5]);
        assert_eq!(config.poll.max_attempts, 0);
        assert_eq!(config.poll.effective_max_attempts(), 3);
        assert_eq!(config.poll.concurrency, 1);

        assert_eq!(config.timeline.page_size, 20);
        assert!(config.timeline.bearer_token.is_empty());

        assert_eq!(config.notify.history_cap, 50);
        assert_eq!(config.notify.first_run_limit, 5);
        assert_eq!(
            config.notify.breaking_keywords,
            vec!["breaking", "urgent", "alert"]
        );
        assert_eq!(config.notify.max_message_length, 500);

        assert!(!config.push.enabled);
        assert!(config.push.endpoint.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[database]
path = "custom/db.sqlite"

[logging]
level = "debug"
file = "custom/logs/app.log"

[fetch]
connect_timeout_secs = 15
read_timeout_secs = 25
total_timeout_secs = 45
max_redirects = 3
max_body_size_bytes = 10485760

[poll]
base_interval_mins = 5
backoff_minutes = [1, 3, 10]
max_attempts = 4
concurrency = 8

[timeline]
api_base = "https://timeline.example.org/api"
bearer_token = "secret-token"
page_size = 40

[notify]
history_cap = 100
first_run_limit = 10
breaking_keywords = ["flash", "urgent"]
max_message_length = 280

[push]
enabled = true
endpoint = "https://push.example.org/send"
api_key = "push-key"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.database.path, "custom/db.sqlite");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.fetch.connect_timeout_secs, 15);
        assert_eq!(config.fetch.max_body_size_bytes, 10485760);
        assert_eq!(config.poll.base_interval_mins, 5);
        assert_eq!(config.poll.backoff_minutes, vec![1, 3, 10]);
        assert_eq!(config.poll.effective_max_attempts(), 4);
        assert_eq!(config.poll.concurrency, 8);
        assert_eq!(config.timeline.api_base, "https://timeline.example.org/api");
        assert_eq!(config.timeline.bearer_token, "secret-token");
        assert_eq!(config.timeline.page_size, 40);
        assert_eq!(config.notify.history_cap, 100);
        assert_eq!(config.notify.first_run_limit, 10);
        assert_eq!(config.notify.breaking_keywords, vec!["flash", "urgent"]);
        assert_eq!(config.notify.max_message_length, 280);
        assert!(config.push.enabled);
        assert_eq!(config.push.endpoint, "https://push.example.org/send");
        assert_eq!(config.push.api_key, "push-key");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[poll]
base_interval_mins = 30

[notify]
first_run_limit = 3
"#;

        let config = Config::parse(toml).unwrap();

        // Specified values
        assert_eq!(config.poll.base_interval_mins, 30);
        assert_eq!(config.notify.first_run_limit, 3);

        // Default values
        assert_eq!(config.database.path, "data/feedwatch.db");
        assert_eq!(config.poll.backoff_minutes, vec![1, 2, 5]);
        assert_eq!(config.notify.history_cap, 50);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.database.path, "data/feedwatch.db");
        assert_eq!(config.poll.base_interval_mins, 15);
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        assert!(result.is_err());
        if let Err(FeedwatchError::Validation(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Validation error");
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");

        assert!(result.is_err());
        assert!(matches!(result, Err(FeedwatchError::Io(_))));
    }

    #[test]
    fn test_backoff_for_attempt() {
        let poll = PollConfig::default();
        assert_eq!(poll.backoff_for_attempt(0), 1);
        assert_eq!(poll.backoff_for_attempt(1), 2);
        assert_eq!(poll.backoff_for_attempt(2), 5);
        // Past the end of the schedule, the last entry applies
        assert_eq!(poll.backoff_for_attempt(10), 5);
    }

    #[test]
    fn test_apply_env_overrides_timeline_token() {
        let original = std::env::var("FEEDWATCH_TIMELINE_TOKEN").ok();

        std::env::set_var("FEEDWATCH_TIMELINE_TOKEN", "env-token");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.timeline.bearer_token, "env-token");

        if let Some(val) = original {
            std::env::set_var("FEEDWATCH_TIMELINE_TOKEN", val);
        } else {
            std::env::remove_var("FEEDWATCH_TIMELINE_TOKEN");
        }
    }

    #[test]
    fn test_apply_env_overrides_empty_value() {
        let original = std::env::var("FEEDWATCH_PUSH_API_KEY").ok();

        std::env::set_var("FEEDWATCH_PUSH_API_KEY", "");

        let mut config = Config::default();
        config.push.api_key = "original-key".to_string();
        config.apply_env_overrides();

        // Should not override with empty string
        assert_eq!(config.push.api_key, "original-key");

        if let Some(val) = original {
            std::env::set_var("FEEDWATCH_PUSH_API_KEY", val);
        } else {
            std::env::remove_var("FEEDWATCH_PUSH_API_KEY");
        }
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = Config::default();
        config.poll.base_interval_mins = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_backoff() {
        let mut config = Config::default();
        config.poll.backoff_minutes = vec![];

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_push_enabled_no_endpoint() {
        let mut config = Config::default();
        config.push.enabled = true;

        let result = config.validate();
        assert!(result.is_err());
        if let Err(FeedwatchError::Validation(msg)) = result {
            assert!(msg.contains("push.endpoint"));
        }
    }

    #[test]
    fn test_validate_default_ok() {
        assert!(Config::default().validate().is_ok());
    }
}
