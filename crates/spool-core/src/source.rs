//! User-supplied torrent sources and the syntactic checks gating commits.

use std::fmt;

const MAGNET_PREFIX: &str = "magnet:?";

/// Torrent reference chosen by the user.
///
/// A source is immutable once chosen; replacing it resets every value derived
/// from it.
#[derive(Clone, PartialEq, Eq)]
pub enum TorrentSource {
    /// Uploaded `.torrent` descriptor.
    File {
        /// File name as picked by the user.
        name: String,
        /// Raw descriptor bytes.
        bytes: Vec<u8>,
    },
    /// HTTP(S) URL pointing at a `.torrent` descriptor.
    Link {
        /// Descriptor URL.
        url: String,
    },
    /// Magnet URI carrying only the info-hash.
    Magnet {
        /// Magnet URI.
        uri: String,
    },
}

/// Discriminant of a [`TorrentSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Uploaded descriptor.
    File,
    /// HTTP(S) descriptor link.
    Link,
    /// Magnet URI.
    Magnet,
}

impl TorrentSource {
    /// Convenience constructor for uploaded descriptors.
    #[must_use]
    pub fn file(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::File {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Convenience constructor for descriptor links.
    #[must_use]
    pub fn link(url: impl Into<String>) -> Self {
        Self::Link { url: url.into() }
    }

    /// Convenience constructor for magnet URIs.
    #[must_use]
    pub fn magnet(uri: impl Into<String>) -> Self {
        Self::Magnet { uri: uri.into() }
    }

    /// Classify free-form text typed into the source field.
    ///
    /// Anything starting with `magnet:` is a magnet; everything else is treated
    /// as a link and left to [`TorrentSource::is_correct`] to reject.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if has_prefix_ignore_case(trimmed, "magnet:") {
            Self::magnet(trimmed)
        } else {
            Self::link(trimmed)
        }
    }

    /// Kind of this source.
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        match self {
            Self::File { .. } => SourceKind::File,
            Self::Link { .. } => SourceKind::Link,
            Self::Magnet { .. } => SourceKind::Magnet,
        }
    }

    /// Whether this source is a magnet URI.
    #[must_use]
    pub const fn is_magnet(&self) -> bool {
        matches!(self, Self::Magnet { .. })
    }

    /// Syntactic validity check gating every commit.
    ///
    /// Valid sources are a non-empty magnet URI, a non-empty HTTP(S) URL or a
    /// non-empty selected-file placeholder.
    #[must_use]
    pub fn is_correct(&self) -> bool {
        match self {
            Self::File { name, bytes } => !name.trim().is_empty() && !bytes.is_empty(),
            Self::Link { url } => is_http_url(url),
            Self::Magnet { uri } => {
                let uri = uri.trim();
                has_prefix_ignore_case(uri, MAGNET_PREFIX) && uri.len() > MAGNET_PREFIX.len()
            }
        }
    }

    /// Text shown for the source in logs and summaries.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::File { name, .. } => name,
            Self::Link { url } => url,
            Self::Magnet { uri } => uri,
        }
    }
}

impl fmt::Debug for TorrentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { name, bytes } => f
                .debug_struct("File")
                .field("name", name)
                .field("bytes", &bytes.len())
                .finish(),
            Self::Link { url } => f.debug_struct("Link").field("url", url).finish(),
            Self::Magnet { uri } => f.debug_struct("Magnet").field("uri", uri).finish(),
        }
    }
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    ["http://", "https://"].iter().any(|scheme| {
        has_prefix_ignore_case(value, scheme)
            && value[scheme.len()..]
                .split(['/', '?', '#'])
                .next()
                .is_some_and(|host| !host.is_empty())
    })
}

fn has_prefix_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
