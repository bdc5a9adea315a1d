use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs;
use std::path::Path;

/// Application configuration module
/// This module holds the knobs the pipeline consumes: chunking, model
/// selection, retry pacing and feature flags, along with API key loading.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Number of subtitle records per remote-call chunk.
    /// Changing this invalidates any prior chunk progress.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Primary model identifier
    #[serde(default = "default_primary_model")]
    pub primary_model: String,

    /// Secondary model used for a single fallback attempt per chunk
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    /// Service endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key (usually loaded from the environment, not the config file)
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Sampling temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Enable the second-pass review stage
    #[serde(default)]
    pub review: bool,

    /// Allow the service to split long records into sub-line segments
    #[serde(default = "default_true")]
    pub split_segments: bool,

    /// User-supplied terminology, "term:description" pairs separated by commas
    #[serde(default)]
    pub user_terms: Option<String>,

    /// Pacing and failure-budget configuration
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Inter-chunk pacing and failure-budget settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PacingConfig {
    /// Minimum delay between chunk calls, in seconds
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: u64,

    /// Maximum adaptive delay between chunk calls, in seconds
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    /// Consecutive chunk failures before the pipeline-wide cooldown
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Pipeline-wide cooldown after the failure budget is exhausted, in seconds
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: default_min_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

/// Log level for the application
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,
    /// Errors and warnings
    Warn,
    /// Normal operational output
    #[default]
    Info,
    /// Verbose diagnostics
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// Convert to the log crate's level filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_chunk_size() -> usize {
    300
}

fn default_primary_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_fallback_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_min_delay_secs() -> u64 {
    2
}

fn default_max_delay_secs() -> u64 {
    120
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown_secs() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            primary_model: default_primary_model(),
            fallback_model: default_fallback_model(),
            endpoint: default_endpoint(),
            api_key: String::new(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            review: false,
            split_segments: default_true(),
            user_terms: None,
            pacing: PacingConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Validate the configuration values
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(anyhow!("chunk_size must be at least 1"));
        }
        if self.primary_model.trim().is_empty() {
            return Err(anyhow!("primary_model must not be empty"));
        }
        if self.pacing.min_delay_secs > self.pacing.max_delay_secs {
            return Err(anyhow!(
                "pacing.min_delay_secs ({}) must not exceed pacing.max_delay_secs ({})",
                self.pacing.min_delay_secs,
                self.pacing.max_delay_secs
            ));
        }
        if self.pacing.failure_threshold == 0 {
            return Err(anyhow!("pacing.failure_threshold must be at least 1"));
        }
        Ok(())
    }
}

/// Environment variable holding the API key
pub const API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";

/// Load the API key from the environment, falling back to a `.env` file
/// in the current directory. A missing key is a fatal configuration error.
pub fn load_api_key() -> Result<String> {
    if let Ok(key) = std::env::var(API_KEY_ENV_VAR) {
        let key = key.trim().to_string();
        if !key.is_empty() {
            return Ok(key);
        }
    }

    if let Some(key) = read_env_file_key(Path::new(".env")) {
        return Ok(key);
    }

    Err(anyhow!(
        "{} not found. Either export it, or create a .env file containing {}=your-api-key",
        API_KEY_ENV_VAR,
        API_KEY_ENV_VAR
    ))
}

/// Read the API key from a `.env`-style file, if present
pub fn read_env_file_key(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    for line in content.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix(&format!("{}=", API_KEY_ENV_VAR)) {
            let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}
