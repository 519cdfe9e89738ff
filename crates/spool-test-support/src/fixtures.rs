//! Descriptor and magnet builders.

use data_encoding::BASE32;
use serde::Serialize;
use sha1::{Digest, Sha1};
use spool_core::InfoHash;

/// Hash used by tests that only need a well-formed value.
pub const SAMPLE_HASH: &str = "c9e15763f722f23e98a29decdfae341b98d53056";

/// Parsed [`SAMPLE_HASH`].
#[must_use]
pub fn sample_hash() -> InfoHash {
    InfoHash::parse(SAMPLE_HASH).unwrap_or_else(|_| InfoHash::from_bytes([0; 20]))
}

/// Bencoded descriptor together with its expected info-hash.
#[derive(Debug, Clone)]
pub struct DescriptorFixture {
    /// Raw `.torrent` bytes.
    pub bytes: Vec<u8>,
    /// SHA-1 of the bencoded `info` dictionary.
    pub hash: InfoHash,
}

#[derive(Serialize)]
struct Metainfo<'a> {
    announce: &'a str,
    info: Info<'a>,
}

#[derive(Serialize)]
struct Info<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    files: Option<Vec<FileInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    length: Option<u64>,
    name: &'a str,
    #[serde(rename = "piece length")]
    piece_length: u64,
    pieces: String,
}

#[derive(Serialize)]
struct FileInfo {
    length: u64,
    path: Vec<String>,
}

/// Single-file descriptor named `name`.
///
/// # Errors
///
/// Returns the bencode serialisation error, which only happens on encoder bugs.
pub fn single_file_descriptor(
    name: &str,
    length: u64,
) -> Result<DescriptorFixture, serde_bencode::Error> {
    build(Info {
        files: None,
        length: Some(length),
        name,
        piece_length: 262_144,
        pieces: "p".repeat(20),
    })
}

/// Multi-file descriptor rooted at `name`; file paths use `/` separators.
///
/// # Errors
///
/// Returns the bencode serialisation error, which only happens on encoder bugs.
pub fn multi_file_descriptor(
    name: &str,
    files: &[(&str, u64)],
) -> Result<DescriptorFixture, serde_bencode::Error> {
    let files = files
        .iter()
        .map(|(path, length)| FileInfo {
            length: *length,
            path: path.split('/').map(str::to_string).collect(),
        })
        .collect();
    build(Info {
        files: Some(files),
        length: None,
        name,
        piece_length: 262_144,
        pieces: "p".repeat(20),
    })
}

fn build(info: Info<'_>) -> Result<DescriptorFixture, serde_bencode::Error> {
    let info_bytes = serde_bencode::to_bytes(&info)?;
    let mut hasher = Sha1::new();
    hasher.update(&info_bytes);
    let mut digest = [0_u8; 20];
    digest.copy_from_slice(&hasher.finalize());
    let bytes = serde_bencode::to_bytes(&Metainfo {
        announce: "udp://tracker.example:1337/announce",
        info,
    })?;
    Ok(DescriptorFixture {
        bytes,
        hash: InfoHash::from_bytes(digest),
    })
}

/// Magnet URI carrying `hash` as hex, with an optional display name.
#[must_use]
pub fn magnet_uri(hash: &InfoHash, name: Option<&str>) -> String {
    let mut uri = format!("magnet:?xt=urn:btih:{hash}");
    if let Some(name) = name {
        uri.push_str("&dn=");
        uri.push_str(&name.replace(' ', "+"));
    }
    uri
}

/// Magnet URI carrying `hash` in base32.
#[must_use]
pub fn base32_magnet_uri(hash: &InfoHash) -> String {
    format!("magnet:?xt=urn:btih:{}", BASE32.encode(hash.as_bytes()))
}
