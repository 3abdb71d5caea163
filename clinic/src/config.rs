//! Configuration management for the event handler server.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Only the Ably API key is required. The server loads it once at startup and
//! every invocation shares the resulting client, so rotating the key needs a
//! restart.

use clinic_ably::{AblyKey, DEFAULT_REST_URL, KeyError};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default channel that carries the event's state.
pub const DEFAULT_CHANNEL: &str = "code-clinic-event";

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set to something unusable
    #[error("Invalid value for {var} ({value}): {reason}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// Offending value (redacted for secrets)
        value: String,
        /// What was wrong
        reason: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ably REST configuration
    pub ably: AblyConfig,
    /// Quiz configuration
    pub quiz: QuizConfig,
    /// HTTP server configuration
    pub server: ServerConfig,
}

/// Ably configuration
#[derive(Debug, Clone)]
pub struct AblyConfig {
    /// API key used as basic auth credentials
    pub api_key: AblyKey,
    /// REST API base URL
    pub rest_url: String,
    /// Timeout for each history or publish request
    pub timeout: Duration,
}

/// Quiz configuration
#[derive(Debug, Clone)]
pub struct QuizConfig {
    /// Channel the state lives on
    pub channel: String,
    /// Question bank override; the bundled bank is used when unset
    pub questions_path: Option<PathBuf>,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Whether to install the Prometheus recorder and serve `/metrics`
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `ABLY_API_KEY` is missing or any variable
    /// has an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        let raw_key = get("ABLY_API_KEY").ok_or(ConfigError::Missing("ABLY_API_KEY"))?;
        let api_key = raw_key
            .parse::<AblyKey>()
            .map_err(|e: KeyError| ConfigError::Invalid {
                var: "ABLY_API_KEY",
                value: "<redacted>".to_string(),
                reason: e.to_string(),
            })?;

        let timeout_secs: u64 = parse_or(&get, "HTTP_TIMEOUT_SECS", 10)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "HTTP_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least one second".to_string(),
            });
        }

        Ok(Self {
            ably: AblyConfig {
                api_key,
                rest_url: get("ABLY_REST_URL").unwrap_or_else(|| DEFAULT_REST_URL.to_string()),
                timeout: Duration::from_secs(timeout_secs),
            },
            quiz: QuizConfig {
                channel: get("QUIZ_CHANNEL").unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
                questions_path: get("QUIZ_QUESTIONS_PATH").map(PathBuf::from),
            },
            server: ServerConfig {
                host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&get, "SERVER_PORT", 8888)?,
                metrics_enabled: parse_or(&get, "METRICS_ENABLED", true)?,
            },
        })
    }

    /// Get the server bind address
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}
