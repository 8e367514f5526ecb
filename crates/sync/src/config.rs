//! Sync configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required for remote operations
//! - `GINVOICE_API_URL` - Base URL of the Ginvoice backend
//!
//! ## Optional
//! - `GINVOICE_API_TOKEN` - Session token to start with (otherwise the one saved by login)
//! - `GINVOICE_STATE_DIR` - Directory holding the cached snapshot and session (default: .ginvoice)
//! - `GINVOICE_STATE_KEY` - Versioned key of the cached snapshot (default: `ginvoice_v1_state`)
//! - `GINVOICE_SYNC_TIMEOUT_SECS` - Bound on each push or refresh (default: 15)
//! - `GINVOICE_LOG_FORMAT` - `text` or `json` (default: text)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::store::{DEFAULT_STATE_KEY, FileStore, SessionFile};

const DEFAULT_STATE_DIR: &str = ".ginvoice";
const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 15;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Log output format for binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected `text` or `json`, got `{other}`")),
        }
    }
}

/// Backend connection settings.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct RemoteConfig {
    /// Base URL, always ending in `/` so endpoint paths join under it
    pub base_url: Url,
    /// Bearer token, if one is already known
    pub api_token: Option<SecretString>,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl RemoteConfig {
    /// Parse a base URL, normalizing the trailing slash.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL does not parse or is
    /// not http(s).
    pub fn new(
        base_url: &str,
        api_token: Option<SecretString>,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let invalid = |msg: String| ConfigError::InvalidEnvVar("GINVOICE_API_URL".to_string(), msg);

        let mut base_url = Url::parse(base_url.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme `{}`", base_url.scheme())));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            api_token,
            request_timeout,
        })
    }
}

/// Sync core configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Backend settings, absent when `GINVOICE_API_URL` is unset
    pub remote: Option<RemoteConfig>,
    /// Directory of the cached snapshot
    pub state_dir: PathBuf,
    /// Versioned storage key
    pub state_key: String,
    /// Bound on each push or refresh
    pub sync_timeout: Duration,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: None,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            state_key: DEFAULT_STATE_KEY.to_string(),
            sync_timeout: Duration::from_secs(DEFAULT_SYNC_TIMEOUT_SECS),
            log_format: LogFormat::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let sync_timeout = match get("GINVOICE_SYNC_TIMEOUT_SECS") {
            Some(raw) => parse_timeout(&raw)?,
            None => Duration::from_secs(DEFAULT_SYNC_TIMEOUT_SECS),
        };

        let log_format = get("GINVOICE_LOG_FORMAT")
            .map(|raw| raw.parse::<LogFormat>())
            .transpose()
            .map_err(|e| ConfigError::InvalidEnvVar("GINVOICE_LOG_FORMAT".to_string(), e))?
            .unwrap_or_default();

        let remote = get("GINVOICE_API_URL")
            .map(|url| {
                RemoteConfig::new(
                    &url,
                    get("GINVOICE_API_TOKEN").map(SecretString::from),
                    sync_timeout,
                )
            })
            .transpose()?;

        Ok(Self {
            remote,
            state_dir: get("GINVOICE_STATE_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_STATE_DIR), PathBuf::from),
            state_key: get("GINVOICE_STATE_KEY").unwrap_or_else(|| DEFAULT_STATE_KEY.to_string()),
            sync_timeout,
            log_format,
            sentry_dsn: get("SENTRY_DSN"),
            sentry_environment: get("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the backend configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `GINVOICE_API_URL` was not set.
    pub fn remote(&self) -> Result<&RemoteConfig, ConfigError> {
        self.remote
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("GINVOICE_API_URL".to_string()))
    }

    /// File-backed store at the configured location.
    #[must_use]
    pub fn file_store(&self) -> FileStore {
        FileStore::new(&self.state_dir, &self.state_key)
    }

    /// Where the session token is remembered between runs.
    #[must_use]
    pub fn session_file(&self) -> SessionFile {
        SessionFile::new(self.state_dir.join(format!("{}.session", self.state_key)))
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    let invalid = |msg: String| {
        ConfigError::InvalidEnvVar("GINVOICE_SYNC_TIMEOUT_SECS".to_string(), msg)
    };
    let secs = raw.trim().parse::<u64>().map_err(|e| invalid(e.to_string()))?;
    if secs == 0 {
        return Err(invalid("must be greater than zero".to_string()));
    }
    Ok(Duration::from_secs(secs))
}
