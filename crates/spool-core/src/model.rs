//! Core torrent domain types shared across the workspace.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use data_encoding::BASE32;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, CoreResult};

/// Container extensions recognised as streamable video.
pub const VIDEO_EXTENSIONS: [&str; 8] = ["mkv", "mp4", "avi", "mov", "wmv", "flv", "webm", "m4v"];

/// Version 1 torrent info-hash, rendered as 40 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Wrap a raw SHA-1 digest.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse a 40-character hex or 32-character base32 hash (any case).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHashLength`] or
    /// [`CoreError::InvalidHashEncoding`] when the text is not a valid hash.
    pub fn parse(value: &str) -> CoreResult<Self> {
        let trimmed = value.trim();
        let decoded = match trimmed.len() {
            40 => hex::decode(trimmed).ok(),
            32 => BASE32
                .decode(trimmed.to_ascii_uppercase().as_bytes())
                .ok(),
            length => {
                return Err(CoreError::InvalidHashLength {
                    value: trimmed.to_string(),
                    length,
                });
            }
        };
        let bytes = decoded
            .and_then(|bytes| <[u8; 20]>::try_from(bytes).ok())
            .ok_or_else(|| CoreError::InvalidHashEncoding {
                value: trimmed.to_string(),
            })?;
        Ok(Self(bytes))
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase hex rendering used on the wire.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl FromStr for InfoHash {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for InfoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for InfoHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Single file inside a torrent manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Identifier, unique within one manifest.
    pub id: u32,
    /// `/`-separated path inside the torrent.
    pub path: String,
    /// Size in bytes.
    #[serde(default)]
    pub length: u64,
}

impl FileEntry {
    /// Convenience constructor.
    #[must_use]
    pub fn new(id: u32, path: impl Into<String>, length: u64) -> Self {
        Self {
            id,
            path: path.into(),
            length,
        }
    }

    /// Final path segment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Directory part of the path; empty for files at the torrent root.
    #[must_use]
    pub fn directory(&self) -> &str {
        self.path.rsplit_once('/').map_or("", |(dir, _)| dir)
    }
}

/// Whether `path` ends in a recognised video container extension.
#[must_use]
pub fn is_video_path(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.').is_some_and(|(_, ext)| {
        VIDEO_EXTENSIONS
            .iter()
            .any(|candidate| ext.eq_ignore_ascii_case(candidate))
    })
}

/// Keep only the entries whose path is a video container, preserving order.
#[must_use]
pub fn filter_video_files(files: impl IntoIterator<Item = FileEntry>) -> Vec<FileEntry> {
    files
        .into_iter()
        .filter(|file| is_video_path(&file.path))
        .collect()
}

/// Identity derived from a [`crate::TorrentSource`].
///
/// `manifest_known` is `false` exactly when the source is a magnet whose
/// metadata has not been fetched yet; in that case `files` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedIdentity {
    /// Info-hash; absent when resolution failed or has not completed.
    pub hash: Option<InfoHash>,
    /// Whether `files` reflects the real manifest.
    pub manifest_known: bool,
    /// Video files of the manifest in descriptor order.
    pub files: Vec<FileEntry>,
    /// Display name embedded in the source, if any.
    pub original_name: Option<String>,
}

impl ResolvedIdentity {
    /// Identity of a source that is not (yet) usable.
    #[must_use]
    pub fn unresolved() -> Self {
        Self::default()
    }

    /// Identity of a full descriptor; non-video entries are dropped.
    #[must_use]
    pub fn from_descriptor(hash: InfoHash, name: Option<String>, files: Vec<FileEntry>) -> Self {
        Self {
            hash: Some(hash),
            manifest_known: true,
            files: filter_video_files(files),
            original_name: name.filter(|name| !name.trim().is_empty()),
        }
    }

    /// Identity of a magnet; the manifest arrives later from the engine.
    #[must_use]
    pub fn from_magnet(hash: InfoHash, display_name: Option<String>) -> Self {
        Self {
            hash: Some(hash),
            manifest_known: false,
            files: Vec::new(),
            original_name: display_name.filter(|name| !name.trim().is_empty()),
        }
    }

    /// Whether a hash is available for downstream consumers.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.hash.is_some()
    }
}

/// Snapshot of the torrents already committed to the engine.
#[derive(Debug, Clone)]
pub struct KnownTorrents {
    hashes: Arc<HashSet<InfoHash>>,
    fetched_at: Option<DateTime<Utc>>,
}

impl Default for KnownTorrents {
    fn default() -> Self {
        Self::empty()
    }
}

impl KnownTorrents {
    /// Snapshot with no known torrents and no fetch time.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            hashes: Arc::new(HashSet::new()),
            fetched_at: None,
        }
    }

    /// Snapshot taken at `fetched_at`.
    #[must_use]
    pub fn new(hashes: impl IntoIterator<Item = InfoHash>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            hashes: Arc::new(hashes.into_iter().collect()),
            fetched_at: Some(fetched_at),
        }
    }

    /// Whether `hash` is present in the snapshot.
    #[must_use]
    pub fn contains(&self, hash: &InfoHash) -> bool {
        self.hashes.contains(hash)
    }

    /// Number of known torrents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// When the snapshot was taken, if it came from the engine.
    #[must_use]
    pub const fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }
}
