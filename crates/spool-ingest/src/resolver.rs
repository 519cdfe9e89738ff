//! Source resolution: info-hash, manifest and display name.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_bencode::value::Value;
use sha1::{Digest, Sha1};
use spool_core::{FileEntry, InfoHash, ResolvedIdentity, TorrentSource};
use spool_engine::DescriptorFetcher;
use tracing::debug;
use url::Url;

use crate::error::{ResolveError, ResolveResult};

type Dict = HashMap<Vec<u8>, Value>;

/// Turns a [`TorrentSource`] into a [`ResolvedIdentity`].
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Resolve `source`. Callers treat any error as "hash absent".
    async fn resolve(&self, source: &TorrentSource) -> ResolveResult<ResolvedIdentity>;
}

/// Resolver parsing descriptors locally and downloading linked ones.
#[derive(Clone)]
pub struct DescriptorResolver {
    fetcher: Arc<dyn DescriptorFetcher>,
}

impl DescriptorResolver {
    /// Resolver downloading link sources through `fetcher`.
    #[must_use]
    pub const fn new(fetcher: Arc<dyn DescriptorFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl SourceResolver for DescriptorResolver {
    async fn resolve(&self, source: &TorrentSource) -> ResolveResult<ResolvedIdentity> {
        if !source.is_correct() {
            return Err(ResolveError::InvalidSource);
        }
        let identity = match source {
            TorrentSource::File { bytes, .. } => parse_descriptor(bytes)?,
            TorrentSource::Link { url } => {
                let bytes = self
                    .fetcher
                    .fetch(url.trim())
                    .await
                    .map_err(|source| ResolveError::Fetch { source })?;
                parse_descriptor(&bytes)?
            }
            TorrentSource::Magnet { uri } => parse_magnet(uri)?,
        };
        debug!(
            kind = ?source.kind(),
            hash = ?identity.hash,
            files = identity.files.len(),
            "source resolved"
        );
        Ok(identity)
    }
}

/// Parse a bencoded `.torrent` descriptor.
///
/// The hash is the SHA-1 of the bencoded `info` dictionary. Single-file
/// descriptors yield one entry named after the torrent; multi-file descriptors
/// yield `name/part/.../file` entries with their index as id. Non-video entries
/// are dropped.
///
/// # Errors
///
/// Returns [`ResolveError::Bencode`] for undecodable input and
/// [`ResolveError::Descriptor`] when `info`, `name` or file fields are missing.
pub fn parse_descriptor(bytes: &[u8]) -> ResolveResult<ResolvedIdentity> {
    let root: Value =
        serde_bencode::from_bytes(bytes).map_err(|source| ResolveError::Bencode { source })?;
    let Value::Dict(root) = root else {
        return Err(ResolveError::Descriptor { field: "root" });
    };
    let info_value = root
        .get(b"info".as_slice())
        .ok_or(ResolveError::Descriptor { field: "info" })?;
    let hash = info_hash(info_value)?;
    let Value::Dict(info) = info_value else {
        return Err(ResolveError::Descriptor { field: "info" });
    };

    let name = text_field(info, "name.utf-8")
        .or_else(|| text_field(info, "name"))
        .ok_or(ResolveError::Descriptor { field: "name" })?;
    let files = match info.get(b"files".as_slice()) {
        Some(Value::List(entries)) => multi_file_manifest(&name, entries)?,
        Some(_) => return Err(ResolveError::Descriptor { field: "files" }),
        None => vec![FileEntry::new(0, name.clone(), int_field(info, "length").unwrap_or(0))],
    };
    Ok(ResolvedIdentity::from_descriptor(hash, Some(name), files))
}

fn info_hash(info: &Value) -> ResolveResult<InfoHash> {
    let encoded = serde_bencode::to_bytes(info).map_err(|source| ResolveError::Bencode { source })?;
    let mut hasher = Sha1::new();
    hasher.update(&encoded);
    let mut digest = [0_u8; 20];
    digest.copy_from_slice(&hasher.finalize());
    Ok(InfoHash::from_bytes(digest))
}

fn multi_file_manifest(name: &str, entries: &[Value]) -> ResolveResult<Vec<FileEntry>> {
    let mut files = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let Value::Dict(entry) = entry else {
            return Err(ResolveError::Descriptor { field: "files" });
        };
        let parts = path_parts(entry, "path.utf-8")
            .or_else(|| path_parts(entry, "path"))
            .ok_or(ResolveError::Descriptor { field: "path" })?;
        let id = u32::try_from(index).map_err(|_| ResolveError::Descriptor { field: "files" })?;
        let path = std::iter::once(name.to_string())
            .chain(parts)
            .collect::<Vec<_>>()
            .join("/");
        files.push(FileEntry::new(id, path, int_field(entry, "length").unwrap_or(0)));
    }
    Ok(files)
}

fn text_field(dict: &Dict, key: &str) -> Option<String> {
    match dict.get(key.as_bytes()) {
        Some(Value::Bytes(bytes)) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

fn int_field(dict: &Dict, key: &str) -> Option<u64> {
    match dict.get(key.as_bytes()) {
        Some(Value::Int(value)) => u64::try_from(*value).ok(),
        _ => None,
    }
}

fn path_parts(dict: &Dict, key: &str) -> Option<Vec<String>> {
    let Some(Value::List(parts)) = dict.get(key.as_bytes()) else {
        return None;
    };
    parts
        .iter()
        .map(|part| match part {
            Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()
        .filter(|parts| !parts.is_empty())
}

/// Parse a magnet URI: `xt=urn:btih:<hash>` (hex or base32) and optional `dn`.
///
/// # Errors
///
/// Returns [`ResolveError::Magnet`] when the URI has no btih topic and
/// [`ResolveError::Hash`] when the topic is not a valid hash.
pub fn parse_magnet(uri: &str) -> ResolveResult<ResolvedIdentity> {
    let malformed = || ResolveError::Magnet {
        value: uri.to_string(),
    };
    let parsed = Url::parse(uri.trim()).map_err(|_| malformed())?;
    if !parsed.scheme().eq_ignore_ascii_case("magnet") {
        return Err(malformed());
    }

    let mut hash = None;
    let mut display_name = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "xt" if hash.is_none() => {
                if let Some(topic) = strip_prefix_ignore_case(&value, "urn:btih:") {
                    hash = Some(
                        InfoHash::parse(topic).map_err(|source| ResolveError::Hash { source })?,
                    );
                }
            }
            "dn" if display_name.is_none() => display_name = Some(value.into_owned()),
            _ => {}
        }
    }
    let hash = hash.ok_or_else(malformed)?;
    Ok(ResolvedIdentity::from_magnet(hash, display_name))
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}
