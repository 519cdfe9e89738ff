#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Domain types and pure state models for torrent ingestion.
//!
//! Layout: `source.rs` (user sources and syntactic checks), `model.rs` (hashes,
//! manifests, resolved identities, known-torrent snapshots), `title.rs` (display
//! title normalisation), `selection.rs` (file selection model), `poster.rs`
//! (poster state), `duplicate.rs` (duplicate guard), `generation.rs` (staleness
//! tokens), `error.rs` (error types).

pub mod duplicate;
pub mod error;
pub mod generation;
pub mod model;
pub mod poster;
pub mod selection;
pub mod source;
pub mod title;

pub use duplicate::{DuplicateVerdict, classify_duplicate, is_duplicate};
pub use error::{CoreError, CoreResult};
pub use generation::{Generation, GenerationCounter};
pub use model::{
    FileEntry, InfoHash, KnownTorrents, ResolvedIdentity, VIDEO_EXTENSIONS, filter_video_files,
    is_video_path,
};
pub use poster::{PosterLanguage, PosterState};
pub use selection::{CheckState, DirectoryGroup, FileSelection};
pub use source::{SourceKind, TorrentSource};
pub use title::normalize_title;
