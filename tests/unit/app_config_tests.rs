/*!
 * Tests for configuration defaults, validation and API key loading
 */

use std::fs;
use anyhow::Result;
use tempfile::tempdir;

use bisub::app_config::{read_env_file_key, Config, LogLevel, API_KEY_ENV_VAR};

/// Test the default configuration values
#[test]
fn test_config_default_shouldMatchDocumentedValues() {
    let config = Config::default();
    assert_eq!(config.chunk_size, 300);
    assert_eq!(config.primary_model, "gemini-2.0-flash");
    assert_eq!(config.fallback_model, "gemini-1.5-flash");
    assert_eq!(config.temperature, 0.1);
    assert_eq!(config.timeout_secs, 120);
    assert!(!config.review);
    assert!(config.split_segments);
    assert_eq!(config.pacing.min_delay_secs, 2);
    assert_eq!(config.pacing.max_delay_secs, 120);
    assert_eq!(config.pacing.failure_threshold, 3);
    assert_eq!(config.pacing.cooldown_secs, 300);
    assert_eq!(config.log_level, LogLevel::Info);
}

/// Test deserialization fills every omitted field with its default
#[test]
fn test_config_deserialize_withPartialInput_shouldUseDefaults() -> Result<()> {
    let config: Config = serde_json::from_str(r#"{"chunk_size": 50, "review": true}"#)?;
    assert_eq!(config.chunk_size, 50);
    assert!(config.review);
    assert_eq!(config.primary_model, "gemini-2.0-flash");
    assert_eq!(config.pacing.cooldown_secs, 300);
    Ok(())
}

/// Test validation rejects inconsistent values
#[test]
fn test_config_validate_withBadValues_shouldFail() {
    let ok = Config::default();
    assert!(ok.validate().is_ok());

    let mut bad = Config::default();
    bad.chunk_size = 0;
    assert!(bad.validate().is_err());

    let mut bad = Config::default();
    bad.primary_model = "  ".to_string();
    assert!(bad.validate().is_err());

    let mut bad = Config::default();
    bad.pacing.min_delay_secs = 200;
    assert!(bad.validate().is_err());

    let mut bad = Config::default();
    bad.pacing.failure_threshold = 0;
    assert!(bad.validate().is_err());
}

/// Test log level conversion
#[test]
fn test_log_level_to_level_filter_shouldMapAll() {
    assert_eq!(LogLevel::Error.to_level_filter(), log::LevelFilter::Error);
    assert_eq!(LogLevel::Warn.to_level_filter(), log::LevelFilter::Warn);
    assert_eq!(LogLevel::Info.to_level_filter(), log::LevelFilter::Info);
    assert_eq!(LogLevel::Debug.to_level_filter(), log::LevelFilter::Debug);
    assert_eq!(LogLevel::Trace.to_level_filter(), log::LevelFilter::Trace);
}

/// Test .env file parsing finds the key and strips quoting
#[test]
fn test_read_env_file_key_withDotEnv_shouldExtractKey() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join(".env");

    fs::write(
        &path,
        format!("# comment\nOTHER=1\n{}=\"abc123\"\n", API_KEY_ENV_VAR),
    )?;
    assert_eq!(read_env_file_key(&path).as_deref(), Some("abc123"));

    fs::write(&path, format!("{}=   \n", API_KEY_ENV_VAR))?;
    assert_eq!(read_env_file_key(&path), None);

    assert_eq!(read_env_file_key(&dir.path().join("missing.env")), None);

    Ok(())
}
