//! Field parsers shared by the environment loader.

use std::time::Duration;

use url::Url;

use crate::error::{ConfigError, ConfigResult};

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_http_url(field: &'static str, raw: &str) -> ConfigResult<Url> {
    let mut url = Url::parse(raw.trim()).map_err(|_| ConfigError::InvalidField {
        field,
        value: Some(raw.to_string()),
        reason: "must be an absolute URL",
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::InvalidField {
            field,
            value: Some(raw.to_string()),
            reason: "must be an http(s) URL with a host",
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_positive_u64(field: &'static str, raw: &str) -> ConfigResult<u64> {
    let value = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidField {
        field,
        value: Some(raw.to_string()),
        reason: "must be an unsigned integer",
    })?;
    if value == 0 {
        return Err(ConfigError::InvalidField {
            field,
            value: Some(raw.to_string()),
            reason: "must be positive",
        });
    }
    Ok(value)
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_positive_u32(field: &'static str, raw: &str) -> ConfigResult<u32> {
    let value = parse_positive_u64(field, raw)?;
    u32::try_from(value).map_err(|_| ConfigError::InvalidField {
        field,
        value: Some(raw.to_string()),
        reason: "must fit within 32-bit unsigned integer range",
    })
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_millis(field: &'static str, raw: &str) -> ConfigResult<Duration> {
    parse_positive_u64(field, raw).map(Duration::from_millis)
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_secs(field: &'static str, raw: &str) -> ConfigResult<Duration> {
    parse_positive_u64(field, raw).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_gain_a_trailing_slash() -> anyhow::Result<()> {
        let url = parse_http_url("F", "http://engine:8090/api")?;
        assert_eq!(url.as_str(), "http://engine:8090/api/");
        let root = parse_http_url("F", "https://engine")?;
        assert_eq!(root.as_str(), "https://engine/");
        Ok(())
    }

    #[test]
    fn non_http_urls_are_rejected() {
        for raw in ["ftp://engine", "engine:8090", "", "file:///tmp"] {
            assert!(
                matches!(
                    parse_http_url("F", raw),
                    Err(ConfigError::InvalidField { field: "F", .. })
                ),
                "{raw}"
            );
        }
    }

    #[test]
    fn numbers_must_be_positive() -> anyhow::Result<()> {
        assert_eq!(parse_millis("F", "250")?, Duration::from_millis(250));
        assert_eq!(parse_secs("F", " 3 ")?, Duration::from_secs(3));
        assert!(parse_positive_u64("F", "0").is_err());
        assert!(parse_positive_u64("F", "-1").is_err());
        assert!(parse_positive_u32("F", "4294967296").is_err());
        Ok(())
    }
}
