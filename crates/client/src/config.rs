// Client configuration.
//
// File: `~/.coreport/config.toml`. Environment variables override values
// read from the file.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::transport::ReconnectPolicy;

/// Root directory for coreport client state: `~/.coreport/`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".coreport"))
}

/// Path to the config file: `~/.coreport/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

// ── Client config ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base WebSocket URL of the synchronization service
    /// (e.g. `wss://reports.example.com/ws`).
    pub sync_url: String,
    /// Base URL of the HTTP API used for uploads.
    pub api_url: String,
    /// Bearer token presented to both services.
    pub token: Option<String>,
    /// Delay before a "has unsynced changes" signal takes effect.
    pub unsynced_debounce_ms: u64,
    pub reconnect: ReconnectConfig,
    /// Remote acronym table; the bundled table is used alone when unset.
    pub acronyms_url: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            sync_url: "ws://localhost:8000/ws".into(),
            api_url: "http://localhost:8000".into(),
            token: None,
            unsynced_debounce_ms: 500,
            reconnect: ReconnectConfig::default(),
            acronyms_url: None,
        }
    }
}

impl ClientConfig {
    /// Load from `~/.coreport/config.toml` (defaults if missing or
    /// unreadable), then apply environment overrides.
    pub fn load() -> Self {
        let from_file = config_path()
            .filter(|path| path.exists())
            .and_then(|path| match Self::load_from(&path) {
                Ok(config) => Some(config),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "ignoring unreadable config file");
                    None
                }
            })
            .unwrap_or_default();
        from_file.with_env()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// Apply overrides from the process environment.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `COREPORT_SYNC_URL` | `sync_url` |
    /// | `COREPORT_API_URL` | `api_url` |
    /// | `COREPORT_TOKEN` | `token` |
    /// | `COREPORT_UNSYNCED_DEBOUNCE_MS` | `unsynced_debounce_ms` |
    /// | `COREPORT_ACRONYMS_URL` | `acronyms_url` |
    pub fn with_env(self) -> Self {
        self.with_env_fn(|key| std::env::var(key))
    }

    /// Testable variant that accepts an environment lookup function.
    fn with_env_fn<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        if let Ok(url) = env("COREPORT_SYNC_URL") {
            self.sync_url = url;
        }
        if let Ok(url) = env("COREPORT_API_URL") {
            self.api_url = url;
        }
        if let Ok(token) = env("COREPORT_TOKEN") {
            self.token = Some(token);
        }
        if let Some(ms) = env("COREPORT_UNSYNCED_DEBOUNCE_MS").ok().and_then(|v| v.parse().ok()) {
            self.unsynced_debounce_ms = ms;
        }
        if let Ok(url) = env("COREPORT_ACRONYMS_URL") {
            self.acronyms_url = Some(url);
        }
        self
    }

    /// Reject plaintext URLs for anything but loopback hosts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("sync_url", &self.sync_url, "wss", "ws")?;
        validate_url("api_url", &self.api_url, "https", "http")?;
        if let Some(url) = &self.acronyms_url {
            validate_url("acronyms_url", url, "https", "http")?;
        }
        Ok(())
    }

    pub fn unsynced_debounce(&self) -> Duration {
        Duration::from_millis(self.unsynced_debounce_ms)
    }
}

/// Reconnection backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Unlimited when unset.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self { base_delay_ms: 250, max_delay_ms: 30_000, max_attempts: None }
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts.unwrap_or(u32::MAX),
        }
    }
}

fn validate_url(
    field: &'static str,
    value: &str,
    secure: &str,
    insecure: &str,
) -> Result<(), ConfigError> {
    let parsed = Url::parse(value)
        .map_err(|error| ConfigError::InvalidUrl { field, reason: format!("`{value}`: {error}") })?;
    let scheme = parsed.scheme();
    if scheme == secure || (scheme == insecure && is_loopback_host(parsed.host_str())) {
        return Ok(());
    }
    Err(ConfigError::InvalidUrl {
        field,
        reason: format!("must use {secure} ({insecure} is allowed only for localhost testing)"),
    })
}

pub(crate) fn is_loopback_host(host: Option<&str>) -> bool {
    let Some(host) = host else {
        return false;
    };
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok_and(|addr| addr.is_loopback())
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(std::io::Error),
    #[error("config parse error: {0}")]
    Parse(toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(toml::ser::Error),
    #[error("invalid {field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },
}
