//! Server configuration module.
//!
//! Parses configuration from environment variables for the extension backend.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `EXTENSION_SECRET` | Yes | - | Base64-encoded JWT signing secret shared with the extension |
//! | `EXTENSION_CLIENT_ID` | No | - | Extension client identifier |
//! | `ALERT_SERVER_URL` | No | `http://localhost:3000` | Base URL of the alert server |
//! | `ALERT_TIMEOUT_SECS` | No | 5 | Timeout for calls to the alert server |
//! | `STATS_UPDATE_SECRET` | No | - | Shared secret required on `POST /stats/update` |
//! | `PORT` | No | 8081 | HTTP server port |

use std::env;
use std::fmt;
use std::time::Duration;

use base64::prelude::*;
use thiserror::Error;
use tracing::warn;
use zeroize::Zeroizing;

/// Default HTTP server port.
const DEFAULT_PORT: u16 = 8081;

/// Default alert server location.
const DEFAULT_ALERT_SERVER_URL: &str = "http://localhost:3000";

/// Default timeout for outbound alert server calls.
const DEFAULT_ALERT_TIMEOUT_SECS: u64 = 5;

/// Upper bound accepted for `ALERT_TIMEOUT_SECS`.
const MAX_ALERT_TIMEOUT_SECS: u64 = 60;

/// Errors that can occur when parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has invalid format.
    #[error("invalid format for {var}: {message}")]
    InvalidFormat { var: String, message: String },

    /// Port number is invalid.
    #[error("invalid port number: {0}")]
    InvalidPort(#[from] std::num::ParseIntError),

    /// Alert timeout is outside the accepted range.
    #[error("invalid alert timeout: {0}")]
    InvalidTimeout(String),
}

/// Server configuration parsed from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Decoded JWT signing secret.
    pub extension_secret: Zeroizing<Vec<u8>>,

    /// Extension client identifier, if provided.
    pub extension_client_id: Option<String>,

    /// Base URL of the alert server, without a trailing slash.
    pub alert_server_url: String,

    /// Timeout applied to every alert server request.
    pub alert_timeout: Duration,

    /// Shared secret for the stats callback. `None` leaves the route open.
    pub stats_update_secret: Option<Zeroizing<String>>,

    /// HTTP server port.
    pub port: u16,
}

impl Config {
    /// Parse configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `EXTENSION_SECRET` is missing or not valid base64
    /// - `PORT` is not a valid u16
    /// - `ALERT_TIMEOUT_SECS` is not an integer between 1 and 60
    ///
    /// # Example
    ///
    /// ```no_run
    /// use arena_ebs::config::Config;
    ///
    /// let config = Config::from_env().expect("Failed to load config");
    /// println!("Server will listen on port {}", config.port);
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        let extension_secret = parse_extension_secret()?;
        let extension_client_id = non_empty_env("EXTENSION_CLIENT_ID");
        let alert_server_url = parse_alert_server_url()?;
        let alert_timeout = parse_alert_timeout()?;
        let stats_update_secret = non_empty_env("STATS_UPDATE_SECRET").map(Zeroizing::new);
        let port = parse_port()?;

        if stats_update_secret.is_none() {
            warn!(
                "STATS_UPDATE_SECRET is not set - POST /stats/update accepts unauthenticated \
                 requests. Configure it before exposing the service."
            );
        }

        Ok(Self {
            extension_secret,
            extension_client_id,
            alert_server_url,
            alert_timeout,
            stats_update_secret,
            port,
        })
    }

    /// Builds a configuration directly from its parts.
    ///
    /// Used by tests and embedders that do not read the process environment.
    pub fn new(extension_secret: impl Into<Vec<u8>>, alert_server_url: impl Into<String>) -> Self {
        Self {
            extension_secret: Zeroizing::new(extension_secret.into()),
            extension_client_id: None,
            alert_server_url: alert_server_url.into().trim_end_matches('/').to_string(),
            alert_timeout: Duration::from_secs(DEFAULT_ALERT_TIMEOUT_SECS),
            stats_update_secret: None,
            port: DEFAULT_PORT,
        }
    }

    /// Sets the shared secret required by `POST /stats/update`.
    #[must_use]
    pub fn with_stats_update_secret(mut self, secret: impl Into<String>) -> Self {
        self.stats_update_secret = Some(Zeroizing::new(secret.into()));
        self
    }

    /// Overrides the alert server request timeout.
    #[must_use]
    pub fn with_alert_timeout(mut self, timeout: Duration) -> Self {
        self.alert_timeout = timeout;
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("extension_secret", &"<redacted>")
            .field("extension_client_id", &self.extension_client_id)
            .field("alert_server_url", &self.alert_server_url)
            .field("alert_timeout", &self.alert_timeout)
            .field(
                "stats_update_secret",
                &self.stats_update_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("port", &self.port)
            .finish()
    }
}

/// Reads an environment variable, treating empty values as unset.
fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse and decode the EXTENSION_SECRET environment variable.
fn parse_extension_secret() -> Result<Zeroizing<Vec<u8>>, ConfigError> {
    let encoded = Zeroizing::new(
        non_empty_env("EXTENSION_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("EXTENSION_SECRET".to_string()))?,
    );

    let decoded = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|_| ConfigError::InvalidFormat {
            var: "EXTENSION_SECRET".to_string(),
            message: "expected base64-encoded secret".to_string(),
        })?;

    if decoded.is_empty() {
        return Err(ConfigError::InvalidFormat {
            var: "EXTENSION_SECRET".to_string(),
            message: "decoded secret is empty".to_string(),
        });
    }

    Ok(Zeroizing::new(decoded))
}

/// Parse the ALERT_SERVER_URL environment variable.
///
/// Returns the default URL if not set.
fn parse_alert_server_url() -> Result<String, ConfigError> {
    let url = non_empty_env("ALERT_SERVER_URL")
        .unwrap_or_else(|| DEFAULT_ALERT_SERVER_URL.to_string());
    let url = url.trim().trim_end_matches('/').to_string();

    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::InvalidFormat {
            var: "ALERT_SERVER_URL".to_string(),
            message: format!("expected an http(s) URL, got '{url}'"),
        });
    }

    Ok(url)
}

/// Parse the ALERT_TIMEOUT_SECS environment variable.
fn parse_alert_timeout() -> Result<Duration, ConfigError> {
    let secs = match non_empty_env("ALERT_TIMEOUT_SECS") {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidTimeout(e.to_string()))?,
        None => DEFAULT_ALERT_TIMEOUT_SECS,
    };

    if secs == 0 || secs > MAX_ALERT_TIMEOUT_SECS {
        return Err(ConfigError::InvalidTimeout(format!(
            "must be between 1 and {MAX_ALERT_TIMEOUT_SECS} seconds, got {secs}"
        )));
    }

    Ok(Duration::from_secs(secs))
}

/// Parse the PORT environment variable.
///
/// Returns the default port if not set.
fn parse_port() -> Result<u16, ConfigError> {
    match env::var("PORT") {
        Ok(port_str) => Ok(port_str.trim().parse()?),
        Err(env::VarError::NotPresent) => Ok(DEFAULT_PORT),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidFormat {
            var: "PORT".to_string(),
            message: "contains invalid unicode".to_string(),
        }),
    }
}
