//! Engine trait implemented by the HTTP client and test doubles.

use async_trait::async_trait;
use spool_core::InfoHash;

use crate::error::EngineResult;
use crate::model::{AddTorrentRequest, SetTorrentRequest, TorrentStatus, UploadRequest};

/// Operations offered by the remote torrent engine.
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// Register a torrent from a link or magnet.
    async fn add(&self, request: AddTorrentRequest) -> EngineResult<TorrentStatus>;

    /// Upload a `.torrent` descriptor.
    async fn upload(&self, request: UploadRequest) -> EngineResult<TorrentStatus>;

    /// Update metadata or file selection of a registered torrent.
    async fn set(&self, request: SetTorrentRequest) -> EngineResult<()>;

    /// Fetch the status of one torrent.
    async fn get(&self, hash: InfoHash) -> EngineResult<TorrentStatus>;

    /// List every registered torrent.
    async fn list(&self) -> EngineResult<Vec<TorrentStatus>>;

    /// Remove a torrent.
    async fn remove(&self, hash: InfoHash) -> EngineResult<()>;
}
