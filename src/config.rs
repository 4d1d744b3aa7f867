//! Environment-driven configuration.
//!
//! Everything has a default so the pipeline runs out of the box against
//! `~/.salesos/salesos.db`; the classifier additionally needs an API key.

use std::path::PathBuf;
use std::time::Duration;

use crate::classifier::RetryPolicy;

/// Default Gemini model used for meeting classification.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

/// Runtime settings, read once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path. `SALESOS_DB` overrides the default
    /// `~/.salesos/salesos.db`.
    pub db_path: PathBuf,
    /// API key for the external classifier (`GEMINI_API_KEY`).
    pub api_key: Option<String>,
    /// Classifier model name (`SALESOS_MODEL`).
    pub model: String,
    /// Retry budget for rate-limited classifier calls.
    pub retry: RetryPolicy,
}

impl Config {
    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        let db_path = std::env::var("SALESOS_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_db_path());
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let model =
            std::env::var("SALESOS_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let mut retry = RetryPolicy::default();
        if let Some(attempts) = env_u64("SALESOS_CLASSIFY_MAX_ATTEMPTS") {
            retry.max_attempts = attempts.max(1) as u32;
        }
        if let Some(secs) = env_u64("SALESOS_CLASSIFY_BACKOFF_SECS") {
            retry.backoff = Duration::from_secs(secs);
        }

        Config {
            db_path,
            api_key,
            model,
            retry,
        }
    }
}

/// Resolve the default database path: `~/.salesos/salesos.db`.
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".salesos")
        .join("salesos.db")
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.trim().parse().ok()
}
