//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing or
//! malformed. API keys and the database URL are wrapped in
//! secrecy::SecretString so they never show up in logs.

pub mod secrets;

use crate::error::{Error, Result};
use secrecy::SecretString;
use std::time::Duration;

/// Model used when `COACH_MODEL` / `EXTRACTION_MODEL` are unset.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub openai_api_key: SecretString,
    /// Model answering the user.
    pub chat_model: String,
    /// Model used by the background note extraction.
    pub extraction_model: String,
    /// Per-task execution limit for the dispatcher. None = unbounded.
    pub task_timeout: Option<Duration>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            openai_api_key: SecretString::from(required_var("OPENAI_API_KEY")?),
            chat_model: optional_var("COACH_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            extraction_model: optional_var("EXTRACTION_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            task_timeout: parse_timeout(optional_var("TASK_TIMEOUT_SECS").as_deref())?,
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

/// Unset and empty are treated the same.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `TASK_TIMEOUT_SECS`. Must be a positive whole number of seconds.
pub fn parse_timeout(raw: Option<&str>) -> Result<Option<Duration>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(Error::Config(format!(
            "TASK_TIMEOUT_SECS must be a positive integer, got {raw:?}"
        ))),
        Ok(secs) => Ok(Some(Duration::from_secs(secs))),
    }
}
