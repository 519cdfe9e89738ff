//! Wire DTOs exchanged with the remote engine.

use serde::{Deserialize, Serialize};
use spool_core::{FileEntry, InfoHash, filter_video_files};

use crate::error::{EngineError, EngineResult};

/// Body posted to `{base}/torrents`; the variant selects the `action` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum EngineRequest {
    /// Register a torrent from a link or magnet.
    Add(AddTorrentRequest),
    /// Update metadata or file selection of a registered torrent.
    Set(SetTorrentRequest),
    /// Fetch the status of one torrent.
    Get {
        /// Torrent hash.
        hash: InfoHash,
    },
    /// Remove a torrent.
    Rem {
        /// Torrent hash.
        hash: InfoHash,
    },
    /// List every registered torrent.
    List,
}

/// Payload of the `add` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddTorrentRequest {
    /// Magnet URI or descriptor URL.
    pub link: String,
    /// Display title; may be empty.
    pub title: String,
    /// Poster URL; may be empty.
    pub poster: String,
    /// Opaque client data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Persist the torrent in the engine database.
    pub save_to_db: bool,
    /// Library category.
    pub category: String,
    /// Custom `.strm` output directory.
    pub strm_dir: String,
    /// Narrowed file selection; omitted means every file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_files: Option<Vec<u32>>,
}

/// Payload of the `set` action. Omitted fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetTorrentRequest {
    /// Torrent hash.
    pub hash: InfoHash,
    /// Display title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Poster URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    /// Library category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Custom `.strm` output directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strm_dir: Option<String>,
    /// Narrowed file selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_files: Option<Vec<u32>>,
}

impl SetTorrentRequest {
    /// Request that changes nothing but the file selection.
    #[must_use]
    pub const fn selection(hash: InfoHash, selected_files: Option<Vec<u32>>) -> Self {
        Self {
            hash,
            title: None,
            poster: None,
            category: None,
            strm_dir: None,
            selected_files,
        }
    }
}

/// Multipart upload of a `.torrent` descriptor.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Descriptor file name.
    pub file_name: String,
    /// Descriptor bytes.
    pub bytes: Vec<u8>,
    /// Display title.
    pub title: String,
    /// Library category.
    pub category: String,
    /// Poster URL.
    pub poster: String,
    /// Custom `.strm` output directory.
    pub strm_dir: String,
    /// Narrowed file selection.
    pub selected_files: Option<Vec<u32>>,
}

impl UploadRequest {
    /// Text fields of the multipart form, in submission order. Empty values
    /// are not sent; the selection is rendered as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Encode`] if the selection cannot be serialised.
    pub fn text_fields(&self) -> EngineResult<Vec<(&'static str, String)>> {
        let mut fields = vec![("save", "true".to_string())];
        for (name, value) in [
            ("title", &self.title),
            ("category", &self.category),
            ("poster", &self.poster),
            ("strm_dir", &self.strm_dir),
        ] {
            if !value.is_empty() {
                fields.push((name, value.clone()));
            }
        }
        if let Some(ids) = &self.selected_files {
            let rendered = serde_json::to_string(ids).map_err(|source| EngineError::Encode {
                operation: "torrents.upload",
                source,
            })?;
            fields.push(("selected_files", rendered));
        }
        Ok(fields)
    }
}

impl std::fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRequest")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .field("title", &self.title)
            .field("category", &self.category)
            .field("poster", &self.poster)
            .field("strm_dir", &self.strm_dir)
            .field("selected_files", &self.selected_files)
            .finish()
    }
}

/// Torrent status returned by `add`, `get`, `list` and uploads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorrentStatus {
    /// Hash as reported by the engine.
    pub hash: Option<String>,
    /// Display title.
    pub title: Option<String>,
    /// Torrent name from the metadata.
    pub name: Option<String>,
    /// Poster URL.
    pub poster: Option<String>,
    /// Library category.
    pub category: Option<String>,
    /// Manifest; absent or `null` until metadata is known.
    pub file_stats: Option<Vec<FileEntry>>,
}

impl TorrentStatus {
    /// Parsed hash, if the engine reported a valid one.
    #[must_use]
    pub fn info_hash(&self) -> Option<InfoHash> {
        self.hash
            .as_deref()
            .and_then(|raw| InfoHash::parse(raw).ok())
    }

    /// Video entries of the manifest, in engine order.
    #[must_use]
    pub fn video_files(&self) -> Vec<FileEntry> {
        filter_video_files(self.file_stats.iter().flatten().cloned())
    }
}
