//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::RetentionPolicy;

/// Stand-in for the token in printed configuration.
pub const MASKED_TOKEN: &str = "***";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ordered search queries; one search request sequence per entry
    #[serde(default = "defaults::queries")]
    pub queries: Vec<String>,

    /// Scheduling and backoff settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Search API settings
    #[serde(default)]
    pub github: GithubConfig,

    /// Durable state settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Report sink settings
    #[serde(default)]
    pub report: ReportConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Serialize the effective configuration to TOML, token masked.
    pub fn to_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.github.token.is_some() {
            shown.github.token = Some(MASKED_TOKEN.to_string());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }

    /// The ordered query list for a run.
    pub fn ordered_queries(&self) -> Vec<String> {
        self.queries.iter().map(|q| q.trim().to_string()).collect()
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.queries.is_empty() {
            return Err(AppError::validation("No queries defined"));
        }
        let mut unique = HashSet::new();
        for query in &self.queries {
            let query = query.trim();
            if query.is_empty() {
                return Err(AppError::validation("queries contains a blank entry"));
            }
            if !unique.insert(query) {
                return Err(AppError::validation(format!(
                    "queries contains '{query}' more than once"
                )));
            }
        }

        if self.watch.interval_secs == 0 {
            return Err(AppError::validation("watch.interval_secs must be > 0"));
        }
        if self.watch.backoff_base_secs == 0 {
            return Err(AppError::validation("watch.backoff_base_secs must be > 0"));
        }
        if self.watch.max_backoff_secs < self.watch.backoff_base_secs {
            return Err(AppError::validation(
                "watch.max_backoff_secs must be >= watch.backoff_base_secs",
            ));
        }

        if self.github.user_agent.trim().is_empty() {
            return Err(AppError::validation("github.user_agent is empty"));
        }
        if self.github.timeout_secs == 0 {
            return Err(AppError::validation("github.timeout_secs must be > 0"));
        }
        if !(1..=100).contains(&self.github.per_page) {
            return Err(AppError::validation("github.per_page must be within 1..=100"));
        }
        if self.github.max_pages_per_query == 0 {
            return Err(AppError::validation(
                "github.max_pages_per_query must be > 0",
            ));
        }
        url::Url::parse(&self.github.api_url)
            .map_err(|e| AppError::validation(format!("github.api_url is invalid: {e}")))?;

        if self.storage.state_file.as_os_str().is_empty() {
            return Err(AppError::validation("storage.state_file is empty"));
        }
        if self.storage.max_seen == Some(0) {
            return Err(AppError::validation("storage.max_seen must be > 0 when set"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queries: defaults::queries(),
            watch: WatchConfig::default(),
            github: GithubConfig::default(),
            storage: StorageConfig::default(),
            report: ReportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Scheduler timing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Period between successful cycles
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Upper bound of the random delay added to each wake
    #[serde(default = "defaults::jitter")]
    pub jitter_secs: u64,

    /// First delay after a transient failure
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_secs: u64,

    /// Ceiling for the transient failure backoff
    #[serde(default = "defaults::max_backoff")]
    pub max_backoff_secs: u64,

    /// Run a cycle immediately instead of waiting one interval
    #[serde(default = "defaults::run_on_start")]
    pub run_on_start: bool,

    /// Locators that are already known and never reported
    #[serde(default)]
    pub ignore_urls: Vec<String>,

    /// Track whether the known repositories in `ignore_urls` still exist
    #[serde(default = "defaults::check_known")]
    pub check_known: bool,
}

impl WatchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            jitter_secs: defaults::jitter(),
            backoff_base_secs: defaults::backoff_base(),
            max_backoff_secs: defaults::max_backoff(),
            run_on_start: defaults::run_on_start(),
            ignore_urls: Vec::new(),
            check_known: defaults::check_known(),
        }
    }
}

/// Which GitHub search endpoint the queries run against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    Repositories,
    Code,
}

impl SearchKind {
    /// Path segment under `/search/`.
    pub fn endpoint(&self) -> &'static str {
        match self {
            SearchKind::Repositories => "repositories",
            SearchKind::Code => "code",
        }
    }
}

/// Search API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Base URL of the REST API
    #[serde(default = "defaults::api_url")]
    pub api_url: String,

    /// Search endpoint to use
    #[serde(default)]
    pub kind: SearchKind,

    /// Personal access token; `GITHUB_TOKEN` overrides this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Results per page (API maximum is 100)
    #[serde(default = "defaults::per_page")]
    pub per_page: u32,

    /// Safety bound on pages fetched for one query
    #[serde(default = "defaults::max_pages")]
    pub max_pages_per_query: u32,

    /// Requests are refused while the remaining quota is at or below this
    #[serde(default)]
    pub rate_limit_reserve: u32,

    /// Scope repository searches to results pushed since the last run
    #[serde(default = "defaults::use_since")]
    pub use_since: bool,
}

impl GithubConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::api_url(),
            kind: SearchKind::default(),
            token: None,
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            per_page: defaults::per_page(),
            max_pages_per_query: defaults::max_pages(),
            rate_limit_reserve: 0,
            use_since: defaults::use_since(),
        }
    }
}

/// Durable state settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding the seen set and last-run timestamp
    #[serde(default = "defaults::state_file")]
    pub state_file: PathBuf,

    /// Forget identifiers first seen more than this many days ago
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u32>,

    /// Keep at most this many identifiers, dropping the oldest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_seen: Option<usize>,
}

impl StorageConfig {
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_age: self
                .retention_days
                .map(|days| chrono::Duration::days(i64::from(days))),
            max_entries: self.max_seen,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: defaults::state_file(),
            retention_days: None,
            max_seen: None,
        }
    }
}

/// Report sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Log each new result
    #[serde(default = "defaults::console")]
    pub console: bool,

    /// Line template for console output
    #[serde(default = "defaults::template")]
    pub template: String,

    /// Append new results as JSON lines to this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonl_path: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            console: defaults::console(),
            template: defaults::template(),
            jsonl_path: None,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when neither `--verbose` nor `RUST_LOG` is given
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn queries() -> Vec<String> {
        vec!["epstein files".into()]
    }

    // Watch defaults
    pub fn interval() -> u64 {
        6 * 60 * 60
    }
    pub fn jitter() -> u64 {
        60
    }
    pub fn backoff_base() -> u64 {
        30
    }
    pub fn max_backoff() -> u64 {
        60 * 60
    }
    pub fn run_on_start() -> bool {
        true
    }

    pub fn check_known() -> bool {
        true
    }

    // GitHub defaults
    pub fn api_url() -> String {
        "https://api.github.com".into()
    }
    pub fn user_agent() -> String {
        "ghwatch/0.1 (+https://github.com)".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn per_page() -> u32 {
        100
    }
    pub fn max_pages() -> u32 {
        10
    }
    pub fn use_since() -> bool {
        true
    }

    // Storage defaults
    pub fn state_file() -> PathBuf {
        PathBuf::from("state/ghwatch_state.json")
    }

    // Report defaults
    pub fn console() -> bool {
        true
    }
    pub fn template() -> String {
        "[{query}] {label} {url}".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
