//! Service configuration.
//!
//! Centralizes everything the binary reads from the environment. Core
//! components receive plain values and never touch the environment
//! themselves.

use std::env;
use std::time::Duration;
use tracing::Level;

/// Default synthesis endpoint, matching the local TTS backend.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/api/v1/tts/stream";

const DEFAULT_FORWARD_GRACE_MS: u64 = 200;
const DEFAULT_METADATA_TIMEOUT_MS: u64 = 5000;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub forward_grace: Duration,
    pub metadata_timeout: Duration,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("invalid millisecond value for {0}: {1}")]
    InvalidDuration(&'static str, String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `READALOUD_BACKEND_URL`: synthesis endpoint. Defaults to the local backend.
    // *   `READALOUD_FORWARD_GRACE_MS`: (Optional) relay readiness grace in milliseconds. Defaults to 200.
    // *   `READALOUD_METADATA_TIMEOUT_MS`: (Optional) media metadata timeout in milliseconds. Defaults to 5000.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. Useful for local development, ignored if absent.
        dotenvy::dotenv().ok();

        let backend_url =
            env::var("READALOUD_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());

        let forward_grace = duration_ms("READALOUD_FORWARD_GRACE_MS", DEFAULT_FORWARD_GRACE_MS)?;
        let metadata_timeout =
            duration_ms("READALOUD_METADATA_TIMEOUT_MS", DEFAULT_METADATA_TIMEOUT_MS)?;

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            backend_url,
            forward_grace,
            metadata_timeout,
            log_level,
        })
    }
}

fn duration_ms(var: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidDuration(var, raw)),
        Err(_) => Ok(Duration::from_millis(default_ms)),
    }
}
