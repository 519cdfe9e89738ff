//! Display title normalisation for torrent names.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::VIDEO_EXTENSIONS;

/// Tokens that mark the start of release metadata in a scene-style name.
const RELEASE_TOKENS: [&str; 23] = [
    "1080p", "2160p", "720p", "480p", "4k", "x264", "x265", "h264", "h265", "hevc", "hdr",
    "web-dl", "webrip", "bluray", "bdrip", "hdtv", "dvdrip", "remux", "aac", "ac3", "dts",
    "proper", "repack",
];

static BRACKETED: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]|\{[^}]*\}").ok());

static TRACKER_PREFIX: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:www\.)?[a-z0-9][a-z0-9-]*\.(?:info|org|com|net|ru|to|me|tv|cc|io|xyz)(?:\s*[-|:]\s*|\s+|$)",
    )
    .ok()
});

static YEAR: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^(?:19|20)\d{2}$").ok());

/// Derive a clean display title from a descriptor name or file name.
///
/// The cleanup pass is repeated until it no longer changes the text, so
/// normalising an already normalised title returns it unchanged. Every pass
/// either shortens the text or replaces a `.`/`_` separator, which bounds the
/// loop.
#[must_use]
pub fn normalize_title(raw: &str) -> String {
    let mut current = clean_once(raw);
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_once(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    text = replace_all(&BRACKETED, &text, " ");
    text = replace_all(&TRACKER_PREFIX, &text, "");
    text = strip_extensions(&text);
    let text = text.replace(['.', '_'], " ");

    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    if let Some(cut) = tokens
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, token)| is_release_token(token))
        .map(|(index, _)| index)
    {
        tokens.truncate(cut);
    }

    let mut owned: Vec<String> = tokens.iter().map(|token| (*token).to_string()).collect();
    pop_trailing_punctuation(&mut owned);
    if let [_, .., last] = owned.as_mut_slice() {
        strip_group_tag(last);
    }
    pop_trailing_punctuation(&mut owned);
    while owned.len() > 1 && owned.first().is_some_and(|token| is_punctuation(token)) {
        owned.remove(0);
    }

    owned.join(" ")
}

fn pop_trailing_punctuation(tokens: &mut Vec<String>) {
    while tokens.last().is_some_and(|token| is_punctuation(token)) {
        tokens.pop();
    }
}

fn replace_all(pattern: &Lazy<Option<Regex>>, text: &str, with: &str) -> String {
    pattern.as_ref().map_or_else(
        || text.to_string(),
        |regex| regex.replace_all(text, with).into_owned(),
    )
}

fn strip_extensions(text: &str) -> String {
    let mut current = text;
    while let Some((stem, ext)) = current.rsplit_once('.') {
        let known = ext.eq_ignore_ascii_case("torrent")
            || VIDEO_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate));
        if !known || stem.trim().is_empty() {
            break;
        }
        current = stem;
    }
    current.to_string()
}

fn is_release_token(token: &str) -> bool {
    let lowered = token
        .trim_matches(|c| matches!(c, '(' | ')' | '[' | ']' | ','))
        .to_ascii_lowercase();
    if lowered.is_empty() {
        return false;
    }
    let head = lowered.split('-').next().unwrap_or(&lowered);
    let is_year = YEAR
        .as_ref()
        .is_some_and(|regex| regex.is_match(&lowered) || regex.is_match(head));
    is_year
        || RELEASE_TOKENS.iter().any(|known| {
            lowered == *known || head == *known || lowered.starts_with(&format!("{known}-"))
        })
}

/// Drop a trailing `-GROUP` suffix written in upper case. A single-letter head
/// (`X-MEN`) is part of the title.
fn strip_group_tag(token: &mut String) {
    let Some((head, tail)) = token.split_once('-') else {
        return;
    };
    let tagged = head.chars().count() > 1
        && tail.chars().any(|c| c.is_ascii_uppercase())
        && tail
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-');
    if tagged {
        let keep = head.len();
        token.truncate(keep);
    }
}

fn is_punctuation(token: &str) -> bool {
    token.chars().all(|c| matches!(c, '-' | '|' | ':' | '/' | '+'))
}
