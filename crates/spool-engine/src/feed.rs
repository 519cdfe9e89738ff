//! Periodically refreshed snapshot of the torrents known to the engine.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use spool_core::KnownTorrents;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::EngineApi;
use crate::error::EngineResult;
use crate::model::TorrentStatus;

/// Background task publishing [`KnownTorrents`] snapshots on a watch channel.
///
/// A failed refresh keeps the previous snapshot. Dropping the feed stops the task.
#[derive(Debug)]
pub struct KnownTorrentsFeed {
    receiver: watch::Receiver<KnownTorrents>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl KnownTorrentsFeed {
    /// Start polling `engine` every `interval`, beginning immediately.
    #[must_use]
    pub fn spawn(engine: Arc<dyn EngineApi>, interval: Duration) -> Self {
        let (sender, receiver) = watch::channel(KnownTorrents::empty());
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match Self::refresh_once(engine.as_ref()).await {
                    Ok(snapshot) => {
                        debug!(known = snapshot.len(), "known torrents refreshed");
                        sender.send_replace(snapshot);
                    }
                    Err(err) => warn!(error = %err, "known torrents refresh failed"),
                }
            }
        });
        Self {
            receiver,
            cancel,
            task,
        }
    }

    /// Fetch one snapshot from the engine.
    ///
    /// # Errors
    ///
    /// Propagates the engine `list` failure.
    pub async fn refresh_once(engine: &dyn EngineApi) -> EngineResult<KnownTorrents> {
        let statuses = engine.list().await?;
        Ok(KnownTorrents::new(
            statuses.iter().filter_map(TorrentStatus::info_hash),
            Utc::now(),
        ))
    }

    /// Receiver observing every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<KnownTorrents> {
        self.receiver.clone()
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> KnownTorrents {
        self.receiver.borrow().clone()
    }

    /// Stop the refresh task.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for KnownTorrentsFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use spool_core::InfoHash;

    use super::*;
    use crate::error::EngineError;
    use crate::model::{AddTorrentRequest, SetTorrentRequest, UploadRequest};

    const HEX: &str = "c9e15763f722f23e98a29decdfae341b98d53056";

    #[derive(Default)]
    struct ListOnly {
        responses: Mutex<VecDeque<EngineResult<Vec<TorrentStatus>>>>,
        calls: AtomicUsize,
    }

    fn unsupported() -> EngineError {
        EngineError::Status {
            operation: "unsupported",
            url: String::new(),
            status: 501,
        }
    }

    #[async_trait]
    impl EngineApi for ListOnly {
        async fn add(&self, _request: AddTorrentRequest) -> EngineResult<TorrentStatus> {
            Err(unsupported())
        }
        async fn upload(&self, _request: UploadRequest) -> EngineResult<TorrentStatus> {
            Err(unsupported())
        }
        async fn set(&self, _request: SetTorrentRequest) -> EngineResult<()> {
            Err(unsupported())
        }
        async fn get(&self, _hash: InfoHash) -> EngineResult<TorrentStatus> {
            Err(unsupported())
        }
        async fn list(&self) -> EngineResult<Vec<TorrentStatus>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
        async fn remove(&self, _hash: InfoHash) -> EngineResult<()> {
            Err(unsupported())
        }
    }

    fn status(hash: &str) -> TorrentStatus {
        TorrentStatus {
            hash: Some(hash.to_string()),
            ..TorrentStatus::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_previous_snapshot() {
        let engine = Arc::new(ListOnly::default());
        {
            let mut queue = engine.responses.lock().expect("lock");
            queue.push_back(Ok(vec![status(HEX)]));
            queue.push_back(Err(unsupported()));
        }
        let hash = InfoHash::parse(HEX).expect("hash");
        let feed = KnownTorrentsFeed::spawn(engine.clone(), Duration::from_secs(1));
        let mut updates = feed.subscribe();

        updates.changed().await.expect("first snapshot");
        assert!(feed.snapshot().contains(&hash));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        assert!(feed.snapshot().contains(&hash));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
        assert!(feed.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_polling() {
        let engine = Arc::new(ListOnly::default());
        let feed = KnownTorrentsFeed::spawn(engine.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(100)).await;
        feed.shutdown();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }
}
