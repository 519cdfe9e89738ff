//! Settings consumed by the ingestion runtime.

use std::fmt;
use std::time::Duration;

use spool_core::PosterLanguage;
use spool_telemetry::LogFormat;
use url::Url;

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Remote engine connection.
    pub engine: EngineSettings,
    /// Poster provider connection.
    pub poster: PosterSettings,
    /// Debounce and polling timings.
    pub timing: TimingSettings,
    /// Logging output.
    pub logging: LogSettings,
}

/// Remote engine connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Base URL of the engine (or the proxy in front of it).
    pub base_url: Url,
    /// Optional HTTP basic credentials.
    pub credentials: Option<BasicCredentials>,
    /// Per-request timeout.
    pub http_timeout: Duration,
    /// Largest descriptor body accepted when fetching links.
    pub link_max_bytes: u64,
}

/// HTTP basic credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    /// User name.
    pub user: String,
    /// Password; may be empty.
    pub password: String,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Poster provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosterSettings {
    /// Base URL of the search endpoint; defaults to the engine URL.
    pub base_url: Url,
    /// Default search language.
    pub language: PosterLanguage,
}

/// Debounce and polling timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSettings {
    /// Poster search debounce window.
    pub debounce: Duration,
    /// Interval between metadata queries.
    pub poll_interval: Duration,
    /// Metadata query budget.
    pub poll_attempts: u32,
    /// Known-torrents refresh interval.
    pub known_refresh: Duration,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            debounce: crate::defaults::DEBOUNCE,
            poll_interval: crate::defaults::POLL_INTERVAL,
            poll_attempts: crate::defaults::POLL_ATTEMPTS,
            known_refresh: crate::defaults::KNOWN_REFRESH,
        }
    }
}

/// Logging output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Level or filter directive.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: spool_telemetry::DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::infer(),
        }
    }
}
