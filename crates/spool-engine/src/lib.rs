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

//! Remote engine, poster provider and descriptor download clients.
//!
//! Layout: `model.rs` (wire DTOs), `api.rs` (engine trait), `client.rs`
//! (reqwest engine client), `poster.rs` (poster provider), `descriptor.rs`
//! (descriptor downloads), `feed.rs` (known-torrents feed), `error.rs`.

pub mod api;
pub mod client;
pub mod descriptor;
pub mod error;
pub mod feed;
pub mod model;
pub mod poster;

pub use api::EngineApi;
pub use client::{EngineClient, EngineCredentials, build_http_client};
pub use descriptor::{DescriptorFetcher, HttpDescriptorFetcher};
pub use error::{EngineError, EngineResult};
pub use feed::KnownTorrentsFeed;
pub use model::{AddTorrentRequest, EngineRequest, SetTorrentRequest, TorrentStatus, UploadRequest};
pub use poster::{PosterProvider, TMDB_IMAGE_BASE, TmdbPosterClient};
