//! Documented defaults for optional settings.

use std::time::Duration;

use spool_core::PosterLanguage;

/// HTTP request timeout for engine and poster calls.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// Poster search debounce window.
pub const DEBOUNCE: Duration = Duration::from_millis(700);
/// Interval between metadata status queries.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Maximum metadata status queries before giving up.
pub const POLL_ATTEMPTS: u32 = 60;
/// Refresh interval of the known-torrents feed.
pub const KNOWN_REFRESH: Duration = Duration::from_secs(1);
/// Largest descriptor accepted from a link.
pub const LINK_MAX_BYTES: u64 = 10 * 1024 * 1024;
/// Poster search language.
pub const POSTER_LANGUAGE: PosterLanguage = PosterLanguage::En;
