//! Duplicate detection against the known-torrents snapshot.

use crate::model::{InfoHash, KnownTorrents};
use crate::source::SourceKind;

/// How a resolved source relates to the torrents already committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateVerdict {
    /// Hash unknown, or not resolved yet.
    Fresh,
    /// Non-magnet source whose hash is already committed; commit is disabled.
    Blocked,
    /// Magnet whose hash is already committed; skip `add` and resume file selection.
    ResumeSelection,
}

/// Whether `hash` is present in the latest snapshot.
#[must_use]
pub fn is_duplicate(hash: &InfoHash, known: &KnownTorrents) -> bool {
    known.contains(hash)
}

/// Classify a resolved source against the latest snapshot.
#[must_use]
pub fn classify_duplicate(
    kind: SourceKind,
    hash: Option<&InfoHash>,
    known: &KnownTorrents,
) -> DuplicateVerdict {
    match hash {
        Some(hash) if is_duplicate(hash, known) => match kind {
            SourceKind::Magnet => DuplicateVerdict::ResumeSelection,
            SourceKind::File | SourceKind::Link => DuplicateVerdict::Blocked,
        },
        _ => DuplicateVerdict::Fresh,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn verdict_depends_on_source_kind() -> anyhow::Result<()> {
        let hash = InfoHash::parse("c9e15763f722f23e98a29decdfae341b98d53056")?;
        let known = KnownTorrents::new([hash], Utc::now());

        assert_eq!(
            classify_duplicate(SourceKind::Link, Some(&hash), &known),
            DuplicateVerdict::Blocked
        );
        assert_eq!(
            classify_duplicate(SourceKind::File, Some(&hash), &known),
            DuplicateVerdict::Blocked
        );
        assert_eq!(
            classify_duplicate(SourceKind::Magnet, Some(&hash), &known),
            DuplicateVerdict::ResumeSelection
        );
        assert_eq!(
            classify_duplicate(SourceKind::Link, None, &known),
            DuplicateVerdict::Fresh
        );
        assert_eq!(
            classify_duplicate(SourceKind::Link, Some(&hash), &KnownTorrents::empty()),
            DuplicateVerdict::Fresh
        );
        Ok(())
    }
}
