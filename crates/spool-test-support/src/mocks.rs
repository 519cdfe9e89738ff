//! Scriptable in-memory doubles for the engine, poster provider and
//! descriptor fetcher.
//!
//! Every double records the calls it receives. Failures are scripted as HTTP
//! status codes and surface as [`EngineError::Status`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use spool_core::{FileEntry, InfoHash, PosterLanguage};
use spool_engine::{
    AddTorrentRequest, DescriptorFetcher, EngineApi, EngineError, EngineResult, PosterProvider,
    SetTorrentRequest, TorrentStatus, UploadRequest,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn scripted_failure(operation: &'static str, status: u16) -> EngineError {
    EngineError::Status {
        operation,
        url: "scripted://".to_string(),
        status,
    }
}

async fn simulate_latency(latency: Option<Duration>) {
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }
}

/// Call observed by [`ScriptedEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `add` action.
    Add(AddTorrentRequest),
    /// Multipart upload.
    Upload(UploadRequest),
    /// `set` action.
    Set(SetTorrentRequest),
    /// `get` action.
    Get(InfoHash),
    /// `list` action.
    List,
    /// `rem` action.
    Remove(InfoHash),
}

#[derive(Default)]
struct EngineScript {
    calls: Vec<EngineCall>,
    add: VecDeque<Result<TorrentStatus, u16>>,
    upload: VecDeque<Result<TorrentStatus, u16>>,
    set: VecDeque<Result<(), u16>>,
    get: VecDeque<Result<TorrentStatus, u16>>,
    known: Vec<TorrentStatus>,
    latency: Option<Duration>,
}

/// Engine double answering from per-action queues.
///
/// When a queue is empty, `add`/`upload`/`get` answer with an empty status
/// and `set`/`rem` succeed.
#[derive(Default)]
pub struct ScriptedEngine {
    script: Mutex<EngineScript>,
}

impl ScriptedEngine {
    /// Engine with empty scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` (virtual time under a paused clock).
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.script).latency = Some(latency);
    }

    /// Answer the next `add` with a status carrying `hash`.
    pub fn push_add_hash(&self, hash: InfoHash) {
        lock(&self.script).add.push_back(Ok(status_with_hash(hash)));
    }

    /// Fail the next `add` with `status`.
    pub fn fail_next_add(&self, status: u16) {
        lock(&self.script).add.push_back(Err(status));
    }

    /// Answer the next upload with a status carrying `hash`.
    pub fn push_upload_hash(&self, hash: InfoHash) {
        lock(&self.script).upload.push_back(Ok(status_with_hash(hash)));
    }

    /// Fail the next upload with `status`.
    pub fn fail_next_upload(&self, status: u16) {
        lock(&self.script).upload.push_back(Err(status));
    }

    /// Fail the next `set` with `status`.
    pub fn fail_next_set(&self, status: u16) {
        lock(&self.script).set.push_back(Err(status));
    }

    /// Answer the next `get` with `files` as the manifest.
    pub fn push_get_files(&self, files: Vec<FileEntry>) {
        lock(&self.script).get.push_back(Ok(TorrentStatus {
            file_stats: Some(files),
            ..TorrentStatus::default()
        }));
    }

    /// Answer the next `count` `get` calls with an unknown manifest.
    pub fn push_empty_gets(&self, count: usize) {
        let mut script = lock(&self.script);
        for _ in 0..count {
            script.get.push_back(Ok(TorrentStatus::default()));
        }
    }

    /// Fail the next `get` with `status`.
    pub fn fail_next_get(&self, status: u16) {
        lock(&self.script).get.push_back(Err(status));
    }

    /// Torrents reported by `list`.
    pub fn set_known(&self, hashes: impl IntoIterator<Item = InfoHash>) {
        lock(&self.script).known = hashes.into_iter().map(status_with_hash).collect();
    }

    /// Every call observed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        lock(&self.script).calls.clone()
    }

    /// Observed `add` requests.
    #[must_use]
    pub fn add_calls(&self) -> Vec<AddTorrentRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Add(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Observed `set` requests.
    #[must_use]
    pub fn set_calls(&self) -> Vec<SetTorrentRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Set(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Observed uploads.
    #[must_use]
    pub fn upload_calls(&self) -> Vec<UploadRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Upload(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Number of `get` calls observed.
    #[must_use]
    pub fn get_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, EngineCall::Get(_)))
            .count()
    }

    fn record(&self, call: EngineCall) -> Option<Duration> {
        let mut script = lock(&self.script);
        script.calls.push(call);
        script.latency
    }
}

fn status_with_hash(hash: InfoHash) -> TorrentStatus {
    TorrentStatus {
        hash: Some(hash.to_string()),
        ..TorrentStatus::default()
    }
}

#[async_trait]
impl EngineApi for ScriptedEngine {
    async fn add(&self, request: AddTorrentRequest) -> EngineResult<TorrentStatus> {
        simulate_latency(self.record(EngineCall::Add(request))).await;
        let next = lock(&self.script).add.pop_front();
        next.unwrap_or_else(|| Ok(TorrentStatus::default()))
            .map_err(|status| scripted_failure("torrents.add", status))
    }

    async fn upload(&self, request: UploadRequest) -> EngineResult<TorrentStatus> {
        simulate_latency(self.record(EngineCall::Upload(request))).await;
        let next = lock(&self.script).upload.pop_front();
        next.unwrap_or_else(|| Ok(TorrentStatus::default()))
            .map_err(|status| scripted_failure("torrents.upload", status))
    }

    async fn set(&self, request: SetTorrentRequest) -> EngineResult<()> {
        simulate_latency(self.record(EngineCall::Set(request))).await;
        let next = lock(&self.script).set.pop_front();
        next.unwrap_or(Ok(()))
            .map_err(|status| scripted_failure("torrents.set", status))
    }

    async fn get(&self, hash: InfoHash) -> EngineResult<TorrentStatus> {
        simulate_latency(self.record(EngineCall::Get(hash))).await;
        let next = lock(&self.script).get.pop_front();
        next.unwrap_or_else(|| Ok(TorrentStatus::default()))
            .map_err(|status| scripted_failure("torrents.get", status))
    }

    async fn list(&self) -> EngineResult<Vec<TorrentStatus>> {
        simulate_latency(self.record(EngineCall::List)).await;
        Ok(lock(&self.script).known.clone())
    }

    async fn remove(&self, hash: InfoHash) -> EngineResult<()> {
        simulate_latency(self.record(EngineCall::Remove(hash))).await;
        Ok(())
    }
}

#[derive(Default)]
struct PosterScript {
    results: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    reachable: HashSet<String>,
    searches: Vec<(String, PosterLanguage)>,
    checks: Vec<String>,
    latency: Option<Duration>,
}

/// Poster provider double keyed by exact title.
///
/// Unknown titles yield no candidates; URLs are unreachable unless marked.
#[derive(Default)]
pub struct ScriptedPosters {
    script: Mutex<PosterScript>,
}

impl ScriptedPosters {
    /// Provider with no scripted results.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay searches and checks by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.script).latency = Some(latency);
    }

    /// Answer searches for `title` with `urls`.
    pub fn with_results(&self, title: &str, urls: &[&str]) {
        lock(&self.script).results.insert(
            title.to_string(),
            urls.iter().map(|url| (*url).to_string()).collect(),
        );
    }

    /// Fail searches for `title`.
    pub fn fail_search(&self, title: &str) {
        lock(&self.script).failing.insert(title.to_string());
    }

    /// Report `url` as a reachable image.
    pub fn mark_reachable(&self, url: &str) {
        lock(&self.script).reachable.insert(url.to_string());
    }

    /// Searches observed so far, in order.
    #[must_use]
    pub fn searches(&self) -> Vec<(String, PosterLanguage)> {
        lock(&self.script).searches.clone()
    }

    /// Titles searched so far, in order.
    #[must_use]
    pub fn searched_titles(&self) -> Vec<String> {
        self.searches().into_iter().map(|(title, _)| title).collect()
    }

    /// Reachability checks observed so far.
    #[must_use]
    pub fn checks(&self) -> Vec<String> {
        lock(&self.script).checks.clone()
    }
}

#[async_trait]
impl PosterProvider for ScriptedPosters {
    async fn search(&self, title: &str, language: PosterLanguage) -> EngineResult<Vec<String>> {
        let latency = {
            let mut script = lock(&self.script);
            script.searches.push((title.to_string(), language));
            script.latency
        };
        simulate_latency(latency).await;
        let script = lock(&self.script);
        if script.failing.contains(title) {
            return Err(scripted_failure("posters.search", 503));
        }
        Ok(script.results.get(title).cloned().unwrap_or_default())
    }

    async fn is_reachable(&self, url: &str) -> bool {
        let latency = {
            let mut script = lock(&self.script);
            script.checks.push(url.to_string());
            script.latency
        };
        simulate_latency(latency).await;
        lock(&self.script).reachable.contains(url)
    }
}

/// Descriptor fetcher double serving bodies from a map.
#[derive(Default)]
pub struct ScriptedFetcher {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    fetched: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    /// Fetcher with no bodies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `url`.
    pub fn serve(&self, url: &str, bytes: Vec<u8>) {
        lock(&self.bodies).insert(url.to_string(), bytes);
    }

    /// URLs fetched so far.
    #[must_use]
    pub fn fetched(&self) -> Vec<String> {
        lock(&self.fetched).clone()
    }
}

#[async_trait]
impl DescriptorFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> EngineResult<Vec<u8>> {
        lock(&self.fetched).push(url.to_string());
        lock(&self.bodies)
            .get(url)
            .cloned()
            .ok_or_else(|| scripted_failure("descriptor.fetch", 404))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_hash;

    #[tokio::test]
    async fn engine_replays_scripts_in_order() -> anyhow::Result<()> {
        let engine = ScriptedEngine::new();
        engine.push_empty_gets(1);
        engine.push_get_files(vec![FileEntry::new(0, "a.mkv", 1)]);
        engine.fail_next_get(500);

        let hash = sample_hash();
        assert!(engine.get(hash).await?.video_files().is_empty());
        assert_eq!(engine.get(hash).await?.video_files().len(), 1);
        assert!(engine.get(hash).await.is_err());
        assert!(engine.get(hash).await?.file_stats.is_none());
        assert_eq!(engine.get_count(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn posters_answer_by_title() -> anyhow::Result<()> {
        let posters = ScriptedPosters::new();
        posters.with_results("Movie", &["https://img/1.jpg"]);
        posters.mark_reachable("https://img/1.jpg");
        posters.fail_search("Broken");

        assert_eq!(
            posters.search("Movie", PosterLanguage::En).await?,
            vec!["https://img/1.jpg".to_string()]
        );
        assert!(posters.search("Other", PosterLanguage::Ru).await?.is_empty());
        assert!(posters.search("Broken", PosterLanguage::En).await.is_err());
        assert!(posters.is_reachable("https://img/1.jpg").await);
        assert!(!posters.is_reachable("https://img/2.jpg").await);
        assert_eq!(posters.searched_titles(), vec!["Movie", "Other", "Broken"]);
        Ok(())
    }

    #[tokio::test]
    async fn fetcher_reports_missing_urls() {
        let fetcher = ScriptedFetcher::new();
        fetcher.serve("https://t/a.torrent", vec![1]);
        assert!(fetcher.fetch("https://t/a.torrent").await.is_ok());
        assert!(fetcher.fetch("https://t/b.torrent").await.is_err());
        assert_eq!(fetcher.fetched().len(), 2);
    }
}
