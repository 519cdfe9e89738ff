//! Loading [`IngestConfig`] from environment variables.

use spool_core::PosterLanguage;
use spool_telemetry::LogFormat;
use tracing::debug;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    BasicCredentials, EngineSettings, IngestConfig, LogSettings, PosterSettings, TimingSettings,
};
use crate::validate::{
    parse_http_url, parse_millis, parse_positive_u32, parse_positive_u64, parse_secs,
};

/// Base URL of the remote engine (required).
pub const ENV_ENGINE_URL: &str = "SPOOL_ENGINE_URL";
const ENV_ENGINE_USER: &str = "SPOOL_ENGINE_USER";
const ENV_ENGINE_PASSWORD: &str = "SPOOL_ENGINE_PASSWORD";
const ENV_POSTER_URL: &str = "SPOOL_POSTER_URL";
const ENV_POSTER_LANGUAGE: &str = "SPOOL_POSTER_LANGUAGE";
const ENV_HTTP_TIMEOUT_SECS: &str = "SPOOL_HTTP_TIMEOUT_SECS";
const ENV_DEBOUNCE_MS: &str = "SPOOL_DEBOUNCE_MS";
const ENV_POLL_INTERVAL_MS: &str = "SPOOL_POLL_INTERVAL_MS";
const ENV_POLL_ATTEMPTS: &str = "SPOOL_POLL_ATTEMPTS";
const ENV_KNOWN_REFRESH_MS: &str = "SPOOL_KNOWN_REFRESH_MS";
const ENV_LINK_MAX_BYTES: &str = "SPOOL_LINK_MAX_BYTES";
const ENV_LOG_LEVEL: &str = "SPOOL_LOG_LEVEL";
const ENV_LOG_FORMAT: &str = "SPOOL_LOG_FORMAT";

impl IngestConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] when `SPOOL_ENGINE_URL` is unset and
    /// [`ConfigError::InvalidField`] when any value fails validation.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    ///
    /// # Errors
    ///
    /// See [`IngestConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let engine_url = get(ENV_ENGINE_URL).ok_or(ConfigError::MissingEnv {
            name: ENV_ENGINE_URL,
        })?;
        let base_url = parse_http_url(ENV_ENGINE_URL, &engine_url)?;

        let credentials = match (get(ENV_ENGINE_USER), get(ENV_ENGINE_PASSWORD)) {
            (Some(user), password) => Some(BasicCredentials {
                user,
                password: password.unwrap_or_default(),
            }),
            (None, Some(_)) => {
                return Err(ConfigError::InvalidField {
                    field: ENV_ENGINE_PASSWORD,
                    value: None,
                    reason: "requires SPOOL_ENGINE_USER",
                });
            }
            (None, None) => None,
        };

        let engine = EngineSettings {
            base_url: base_url.clone(),
            credentials,
            http_timeout: optional(get(ENV_HTTP_TIMEOUT_SECS), defaults::HTTP_TIMEOUT, |raw| {
                parse_secs(ENV_HTTP_TIMEOUT_SECS, raw)
            })?,
            link_max_bytes: optional(get(ENV_LINK_MAX_BYTES), defaults::LINK_MAX_BYTES, |raw| {
                parse_positive_u64(ENV_LINK_MAX_BYTES, raw)
            })?,
        };

        let poster = PosterSettings {
            base_url: optional(get(ENV_POSTER_URL), base_url, |raw| {
                parse_http_url(ENV_POSTER_URL, raw)
            })?,
            language: optional(get(ENV_POSTER_LANGUAGE), defaults::POSTER_LANGUAGE, |raw| {
                PosterLanguage::parse(raw).map_err(|_| ConfigError::InvalidField {
                    field: ENV_POSTER_LANGUAGE,
                    value: Some(raw.to_string()),
                    reason: "must be 'en' or 'ru'",
                })
            })?,
        };

        let timing = TimingSettings {
            debounce: optional(get(ENV_DEBOUNCE_MS), defaults::DEBOUNCE, |raw| {
                parse_millis(ENV_DEBOUNCE_MS, raw)
            })?,
            poll_interval: optional(get(ENV_POLL_INTERVAL_MS), defaults::POLL_INTERVAL, |raw| {
                parse_millis(ENV_POLL_INTERVAL_MS, raw)
            })?,
            poll_attempts: optional(get(ENV_POLL_ATTEMPTS), defaults::POLL_ATTEMPTS, |raw| {
                parse_positive_u32(ENV_POLL_ATTEMPTS, raw)
            })?,
            known_refresh: optional(get(ENV_KNOWN_REFRESH_MS), defaults::KNOWN_REFRESH, |raw| {
                parse_millis(ENV_KNOWN_REFRESH_MS, raw)
            })?,
        };

        let fallback_logging = LogSettings::default();
        let logging = LogSettings {
            level: get(ENV_LOG_LEVEL).unwrap_or(fallback_logging.level),
            format: optional(get(ENV_LOG_FORMAT), fallback_logging.format, |raw| {
                LogFormat::parse(raw).map_err(|_| ConfigError::InvalidField {
                    field: ENV_LOG_FORMAT,
                    value: Some(raw.to_string()),
                    reason: "must be 'json' or 'pretty'",
                })
            })?,
        };

        debug!(
            engine = %engine.base_url,
            poster = %poster.base_url,
            authenticated = engine.credentials.is_some(),
            "configuration loaded"
        );

        Ok(Self {
            engine,
            poster,
            timing,
            logging,
        })
    }
}

fn optional<T>(
    raw: Option<String>,
    default: T,
    parse: impl FnOnce(&str) -> ConfigResult<T>,
) -> ConfigResult<T> {
    raw.map_or(Ok(default), |value| parse(&value))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> ConfigResult<IngestConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        IngestConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn engine_url_is_required() {
        assert_eq!(
            load(&[]),
            Err(ConfigError::MissingEnv {
                name: ENV_ENGINE_URL
            })
        );
        assert_eq!(
            load(&[(ENV_ENGINE_URL, "   ")]),
            Err(ConfigError::MissingEnv {
                name: ENV_ENGINE_URL
            })
        );
    }

    #[test]
    fn defaults_apply_when_optional_values_are_missing() -> anyhow::Result<()> {
        let config = load(&[(ENV_ENGINE_URL, "http://engine:8090")])?;
        assert_eq!(config.engine.base_url.as_str(), "http://engine:8090/");
        assert_eq!(config.poster.base_url, config.engine.base_url);
        assert_eq!(config.poster.language, PosterLanguage::En);
        assert!(config.engine.credentials.is_none());
        assert_eq!(config.engine.http_timeout, defaults::HTTP_TIMEOUT);
        assert_eq!(config.engine.link_max_bytes, defaults::LINK_MAX_BYTES);
        assert_eq!(config.timing, TimingSettings::default());
        assert_eq!(config.timing.debounce, Duration::from_millis(700));
        assert_eq!(config.timing.poll_attempts, 60);
        assert_eq!(config.logging, LogSettings::default());
        Ok(())
    }

    #[test]
    fn overrides_are_parsed() -> anyhow::Result<()> {
        let config = load(&[
            (ENV_ENGINE_URL, "https://proxy.local/engine"),
            (ENV_ENGINE_USER, "admin"),
            (ENV_ENGINE_PASSWORD, "secret"),
            (ENV_POSTER_URL, "https://posters.local"),
            (ENV_POSTER_LANGUAGE, "RU"),
            (ENV_HTTP_TIMEOUT_SECS, "30"),
            (ENV_DEBOUNCE_MS, "100"),
            (ENV_POLL_INTERVAL_MS, "50"),
            (ENV_POLL_ATTEMPTS, "5"),
            (ENV_KNOWN_REFRESH_MS, "2500"),
            (ENV_LINK_MAX_BYTES, "1024"),
            (ENV_LOG_LEVEL, "spool_ingest=debug"),
            (ENV_LOG_FORMAT, "json"),
        ])?;
        assert_eq!(config.engine.base_url.as_str(), "https://proxy.local/engine/");
        let credentials = config
            .engine
            .credentials
            .ok_or_else(|| anyhow::anyhow!("credentials missing"))?;
        assert_eq!(credentials.user, "admin");
        assert_eq!(credentials.password, "secret");
        assert!(!format!("{credentials:?}").contains("secret"));
        assert_eq!(config.poster.base_url.as_str(), "https://posters.local/");
        assert_eq!(config.poster.language, PosterLanguage::Ru);
        assert_eq!(config.engine.http_timeout, Duration::from_secs(30));
        assert_eq!(config.timing.debounce, Duration::from_millis(100));
        assert_eq!(config.timing.poll_interval, Duration::from_millis(50));
        assert_eq!(config.timing.poll_attempts, 5);
        assert_eq!(config.timing.known_refresh, Duration::from_millis(2500));
        assert_eq!(config.engine.link_max_bytes, 1024);
        assert_eq!(config.logging.level, "spool_ingest=debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        Ok(())
    }

    #[test]
    fn invalid_values_name_the_offending_variable() {
        let cases = [
            (ENV_ENGINE_URL, "ftp://engine"),
            (ENV_POSTER_LANGUAGE, "de"),
            (ENV_POLL_ATTEMPTS, "0"),
            (ENV_DEBOUNCE_MS, "soon"),
            (ENV_LOG_FORMAT, "xml"),
        ];
        for (name, value) in cases {
            let mut vars = vec![(ENV_ENGINE_URL, "http://engine")];
            vars.retain(|(key, _)| *key != name);
            vars.push((name, value));
            assert!(
                matches!(load(&vars), Err(ConfigError::InvalidField { field, .. }) if field == name),
                "{name}={value}"
            );
        }
    }

    #[test]
    fn password_without_user_is_rejected() {
        let result = load(&[
            (ENV_ENGINE_URL, "http://engine"),
            (ENV_ENGINE_PASSWORD, "secret"),
        ]);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidField {
                field: ENV_ENGINE_PASSWORD,
                value: None,
                ..
            })
        ));
    }
}
