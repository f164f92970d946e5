//! Runtime configuration
//!
//! All endpoints, timings and limits live in a single [`ExtractorConfig`]
//! value that is handed to each component at construction. The value is
//! assembled from built-in defaults, an optional JSON file and a handful of
//! environment overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// GraphQL endpoint of the AniList API
pub const DEFAULT_ANILIST_ENDPOINT: &str = "https://graphql.anilist.co";

/// Base URL of the Miruro watch pages
pub const DEFAULT_WATCH_BASE: &str = "https://www.miruro.to/watch";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON for this schema
    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A value is out of its accepted range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How a watch page URL is built from a media id and an episode number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchUrlStyle {
    /// `<base>/<id>/episode-<n>`
    #[default]
    Path,
    /// `<base>?id=<id>&ep=<n>`
    Query,
}

impl WatchUrlStyle {
    /// Builds the watch page URL for one episode
    pub fn watch_url(&self, base: &str, media_id: u32, episode: u32) -> String {
        let base = base.trim_end_matches('/');
        match self {
            WatchUrlStyle::Path => format!("{}/{}/episode-{}", base, media_id, episode),
            WatchUrlStyle::Query => format!("{}?id={}&ep={}", base, media_id, episode),
        }
    }
}

/// Headless browser launch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Explicit browser executable; skips discovery and provisioning
    pub executable: Option<PathBuf>,
    /// Download a pinned headless shell when no browser can be found
    pub auto_provision: bool,
    /// Viewport width and height
    pub window_size: (u32, u32),
    /// Idle time after which the browser connection is considered dead
    pub idle_timeout_ms: u64,
    /// Upper bound for page loads and other tab operations
    pub page_load_timeout_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            auto_provision: true,
            window_size: (1920, 1080),
            idle_timeout_ms: 300_000,
            page_load_timeout_ms: 120_000,
        }
    }
}

impl BrowserSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load_timeout_ms)
    }
}

/// Complete configuration for metadata lookup, extraction and reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// GraphQL endpoint queried for media records
    pub anilist_endpoint: String,
    /// Base URL of the watch pages
    pub watch_base_url: String,
    /// Shape of the watch page URL
    pub watch_url_style: WatchUrlStyle,
    /// Timeout for metadata requests
    pub request_timeout_ms: u64,
    /// Pause after navigation before polling starts
    pub initial_settle_ms: u64,
    /// Pause between a keypress and the following markup scan
    pub poll_interval_ms: u64,
    /// Maximum number of poll attempts per episode
    pub attempt_ceiling: u32,
    /// Key dispatched to the page body on every attempt
    pub trigger_key: String,
    /// Number of episodes extracted concurrently
    pub worker_count: usize,
    /// Upper bound on the number of episodes processed per run
    pub episode_cap: u32,
    /// Episode count assumed when the metadata has none
    pub default_episode_count: u32,
    /// Directory the report file is written to
    pub output_dir: PathBuf,
    /// Browser launch settings
    pub browser: BrowserSettings,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            anilist_endpoint: DEFAULT_ANILIST_ENDPOINT.to_string(),
            watch_base_url: DEFAULT_WATCH_BASE.to_string(),
            watch_url_style: WatchUrlStyle::default(),
            request_timeout_ms: 30_000,
            initial_settle_ms: 5_000,
            poll_interval_ms: 1_200,
            attempt_ceiling: 25,
            trigger_key: "k".to_string(),
            worker_count: 10,
            episode_cap: 25,
            default_episode_count: 12,
            output_dir: PathBuf::from("."),
            browser: BrowserSettings::default(),
        }
    }
}

impl ExtractorConfig {
    /// Loads configuration from defaults, an optional file and the environment
    ///
    /// When `path` is `None`, `config.json` in the platform configuration
    /// directory is used if it exists. A missing default file is not an
    /// error; a missing explicit file is.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_file() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file; absent fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Applies environment overrides using the given lookup function
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(endpoint) = non_empty("ANILIST_ENDPOINT") {
            self.anilist_endpoint = endpoint;
        }
        if let Some(base) = non_empty("MIRURO_WATCH_BASE") {
            self.watch_base_url = base;
        }
        if let Some(workers) = non_empty("MIRURO_WORKERS").and_then(|v| v.parse().ok()) {
            self.worker_count = workers;
        }
        if let Some(executable) = non_empty("CHROME_EXECUTABLE") {
            self.browser.executable = Some(PathBuf::from(executable));
        }
    }

    /// Rejects values that would make extraction impossible
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.attempt_ceiling == 0 {
            return Err(ConfigError::Invalid(
                "attempt_ceiling must be at least 1".to_string(),
            ));
        }
        if self.episode_cap == 0 {
            return Err(ConfigError::Invalid(
                "episode_cap must be at least 1".to_string(),
            ));
        }
        if self.default_episode_count == 0 {
            return Err(ConfigError::Invalid(
                "default_episode_count must be at least 1".to_string(),
            ));
        }
        if self.browser.page_load_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "browser.page_load_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn initial_settle(&self) -> Duration {
        Duration::from_millis(self.initial_settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Watch page URL for one episode of a title
    pub fn watch_url(&self, media_id: u32, episode: u32) -> String {
        self.watch_url_style
            .watch_url(&self.watch_base_url, media_id, episode)
    }
}

/// Location of the default configuration file
///
/// - Linux: ~/.config/miruro-extractor/config.json
/// - macOS: ~/Library/Application Support/io.miruro.miruro-extractor/config.json
/// - Windows: %APPDATA%\miruro\miruro-extractor\config\config.json
pub fn default_config_file() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "miruro", "miruro-extractor")
        .map(|dirs| dirs.config_dir().join("config.json"))
}
