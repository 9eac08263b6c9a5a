//! Configuration: TOML tuning file, environment secrets, and window bounds
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/gatecount.toml
//!
//! Every TOML section is optional. A missing file means defaults; a file that
//! exists but doesn't parse is an error. Credentials and the LibInsight URL
//! only ever come from the environment.

use crate::domain::window::DayWindow;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/gatecount.toml";
pub const ENV_TRAFSYS_USER: &str = "TRAFSYS_USER";
pub const ENV_TRAFSYS_PASS: &str = "TRAFSYS_PASS";
pub const ENV_LIBINSIGHT_URL: &str = "LIBINSIGHT_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("TRAFSYS_USER and TRAFSYS_PASS must both be set")]
    MissingCredentials,

    #[error("{0} must be set based on the LibInsight admin API code (combining host and the POST path)")]
    MissingSinkUrl(&'static str),

    #[error("--days-ago-start must be at least 1")]
    StartTooRecent,

    #[error("--days-ago-end must be at least 0")]
    NegativeEnd,

    #[error("--days-ago-start cannot be greater than {0}")]
    StartTooOld(u32),

    #[error("--days-ago-start must be greater than --days-ago-end")]
    InvertedWindow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrafSysConfig {
    #[serde(default = "default_trafsys_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause between window requests so Traf-Sys doesn't 429 us
    #[serde(default = "default_throttle_secs")]
    pub throttle_secs: u64,
    #[serde(default = "default_max_days_ago_start")]
    pub max_days_ago_start: u32,
}

impl Default for TrafSysConfig {
    fn default() -> Self {
        Self {
            base_url: default_trafsys_base_url(),
            timeout_secs: default_timeout_secs(),
            throttle_secs: default_throttle_secs(),
            max_days_ago_start: default_max_days_ago_start(),
        }
    }
}

fn default_trafsys_base_url() -> String {
    "https://portal.trafnet.com/rest".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_throttle_secs() -> u64 {
    5
}

fn default_max_days_ago_start() -> u32 {
    33
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibInsightConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LibInsightConfig {
    fn default() -> Self {
        Self { timeout_secs: default_timeout_secs() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_batch_size")]
    pub initial_batch_size: usize,
    #[serde(default = "default_min_batch_size")]
    pub min_batch_size: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_batch_size: default_initial_batch_size(),
            min_batch_size: default_min_batch_size(),
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

fn default_initial_batch_size() -> usize {
    500
}

fn default_min_batch_size() -> usize {
    10
}

fn default_max_attempts() -> u32 {
    10
}

fn default_base_delay_secs() -> u64 {
    5
}

fn default_max_delay_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub trafsys: TrafSysConfig,
    #[serde(default)]
    pub libinsight: LibInsightConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    trafsys_base_url: String,
    trafsys_timeout: Duration,
    trafsys_throttle: Duration,
    max_days_ago_start: u32,
    libinsight_timeout: Duration,
    retry: RetryConfig,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            trafsys_base_url: toml_config.trafsys.base_url.trim_end_matches('/').to_string(),
            trafsys_timeout: Duration::from_secs(toml_config.trafsys.timeout_secs),
            trafsys_throttle: Duration::from_secs(toml_config.trafsys.throttle_secs),
            max_days_ago_start: toml_config.trafsys.max_days_ago_start,
            libinsight_timeout: Duration::from_secs(toml_config.libinsight.timeout_secs),
            retry: toml_config.retry,
            config_file,
        }
    }

    /// Determine config file path from the CLI value or environment
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        DEFAULT_CONFIG_PATH.to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::from_file(path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Read { path, source }) if source.kind() == io::ErrorKind::NotFound => {
                eprintln!("Warning: config file {} not found. Using defaults.", path);
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    // Getters for all config fields
    pub fn trafsys_base_url(&self) -> &str {
        &self.trafsys_base_url
    }

    pub fn trafsys_timeout(&self) -> Duration {
        self.trafsys_timeout
    }

    pub fn trafsys_throttle(&self) -> Duration {
        self.trafsys_throttle
    }

    pub fn max_days_ago_start(&self) -> u32 {
        self.max_days_ago_start
    }

    pub fn libinsight_timeout(&self) -> Duration {
        self.libinsight_timeout
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to point at a mock Traf-Sys
    pub fn with_trafsys_base_url(mut self, url: &str) -> Self {
        self.trafsys_base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_trafsys_throttle(mut self, throttle: Duration) -> Self {
        self.trafsys_throttle = throttle;
        self
    }

    /// Builder method for tests that shouldn't wait on throttles or backoff
    pub fn without_delays(mut self) -> Self {
        self.trafsys_throttle = Duration::ZERO;
        self.retry.base_delay_secs = 0;
        self.retry.max_delay_secs = 0;
        self
    }
}

/// Traf-Sys login
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Values that must come from the environment
#[derive(Debug, Clone)]
pub struct RunEnv {
    pub credentials: Credentials,
    pub libinsight_url: String,
}

impl RunEnv {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the required values through `lookup`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let (Some(username), Some(password)) = (get(ENV_TRAFSYS_USER), get(ENV_TRAFSYS_PASS))
        else {
            return Err(ConfigError::MissingCredentials);
        };

        let libinsight_url =
            get(ENV_LIBINSIGHT_URL).ok_or(ConfigError::MissingSinkUrl(ENV_LIBINSIGHT_URL))?;

        Ok(Self { credentials: Credentials { username, password }, libinsight_url })
    }
}

/// Validated, inclusive range of days to pull, counted back from today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    start_days_ago: u32,
    end_days_ago: u32,
}

impl FetchWindow {
    /// Check CLI bounds. `max_start` caps how far back a run may reach.
    pub fn validate(
        start_days_ago: i64,
        end_days_ago: i64,
        max_start: u32,
    ) -> Result<Self, ConfigError> {
        if start_days_ago < 1 {
            return Err(ConfigError::StartTooRecent);
        }
        if end_days_ago < 0 {
            return Err(ConfigError::NegativeEnd);
        }
        if start_days_ago > i64::from(max_start) {
            return Err(ConfigError::StartTooOld(max_start));
        }
        if start_days_ago < end_days_ago {
            return Err(ConfigError::InvertedWindow);
        }

        // Both bounds are within 0..=max_start here
        Ok(Self { start_days_ago: start_days_ago as u32, end_days_ago: end_days_ago as u32 })
    }

    pub fn start_days_ago(&self) -> u32 {
        self.start_days_ago
    }

    pub fn end_days_ago(&self) -> u32 {
        self.end_days_ago
    }

    /// The whole range as one (possibly oversized) day window
    pub fn days(&self) -> DayWindow {
        DayWindow { start_days_ago: self.start_days_ago, end_days_ago: self.end_days_ago }
    }
}
