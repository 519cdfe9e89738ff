//! Poster selection state and search language.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Language used when searching the poster provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PosterLanguage {
    /// English titles.
    #[default]
    En,
    /// Russian titles.
    Ru,
}

impl PosterLanguage {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ru => "ru",
        }
    }

    /// Parse `en` or `ru`, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedLanguage`] for any other value.
    pub fn parse(value: &str) -> CoreResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "ru" => Ok(Self::Ru),
            _ => Err(CoreError::UnsupportedLanguage {
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for PosterLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PosterLanguage {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Active poster plus the candidates offered by the last search.
///
/// `verified` only turns `true` after an asynchronous reachability check.
/// Once `user_overrode` is set, search results no longer replace `url`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PosterState {
    /// Active poster URL.
    pub url: Option<String>,
    /// Whether `url` passed a reachability check.
    pub verified: bool,
    /// Candidate URLs from the latest search, best first.
    pub candidates: Vec<String>,
    /// Whether the user picked or cleared the poster explicitly.
    pub user_overrode: bool,
}

impl PosterState {
    /// Active poster URL or an empty string, as sent to the engine.
    #[must_use]
    pub fn url_or_empty(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }

    /// Drop the active poster without touching candidates.
    pub fn clear_url(&mut self) {
        self.url = None;
        self.verified = false;
    }

    /// Install a new unverified poster URL; blank input clears it.
    pub fn set_url(&mut self, url: Option<String>) {
        self.url = url.filter(|value| !value.trim().is_empty());
        self.verified = false;
    }
}
