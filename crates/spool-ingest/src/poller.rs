//! Metadata polling for magnets whose manifest is not known yet.

use std::sync::Arc;
use std::time::Duration;

use spool_config::TimingSettings;
use spool_core::{FileEntry, InfoHash};
use spool_engine::{EngineApi, EngineError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Interval and budget of a polling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Pause between two queries.
    pub interval: Duration,
    /// Maximum number of queries.
    pub attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from(&TimingSettings::default())
    }
}

impl From<&TimingSettings> for PollSettings {
    fn from(timing: &TimingSettings) -> Self {
        Self {
            interval: timing.poll_interval,
            attempts: timing.poll_attempts,
        }
    }
}

/// Lifecycle of a [`MetadataPoller`].
#[derive(Debug, Clone)]
pub enum PollState {
    /// Not started.
    Idle,
    /// Query `attempt` (1-based) is being issued or awaited.
    Polling {
        /// Current attempt.
        attempt: u32,
    },
    /// Video files appeared.
    Resolved {
        /// Video entries of the manifest.
        files: Vec<FileEntry>,
    },
    /// Budget exhausted without video files.
    TimedOut {
        /// Queries issued.
        attempts: u32,
    },
    /// A query failed; no further attempts were made.
    Failed {
        /// Engine error of the failing query.
        error: Arc<EngineError>,
    },
    /// Owner closed before a terminal state was reached.
    Cancelled,
}

impl PollState {
    /// Whether no further query will be issued.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Idle | Self::Polling { .. })
    }
}

/// Queries the engine until the torrent reports video files.
pub struct MetadataPoller {
    engine: Arc<dyn EngineApi>,
    settings: PollSettings,
    state: PollState,
}

impl MetadataPoller {
    /// Idle poller.
    #[must_use]
    pub const fn new(engine: Arc<dyn EngineApi>, settings: PollSettings) -> Self {
        Self {
            engine,
            settings,
            state: PollState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &PollState {
        &self.state
    }

    /// Poll `hash` until a terminal state and return it.
    ///
    /// The torrent must already be registered with the engine. No query is
    /// issued after the 60th (or configured) attempt, after a failure, or once
    /// `cancel` fires.
    pub async fn run(&mut self, hash: InfoHash, cancel: &CancellationToken) -> PollState {
        debug!(hash = %hash, attempts = self.settings.attempts, "metadata polling started");
        self.state = self.poll(hash, cancel).await;
        match &self.state {
            PollState::Resolved { files } => {
                info!(hash = %hash, files = files.len(), "torrent metadata resolved");
            }
            PollState::TimedOut { attempts } => {
                warn!(hash = %hash, attempts, "torrent metadata timed out");
            }
            PollState::Failed { error } => {
                warn!(hash = %hash, error = %error, "torrent metadata query failed");
            }
            PollState::Cancelled => debug!(hash = %hash, "metadata polling cancelled"),
            PollState::Idle | PollState::Polling { .. } => {}
        }
        self.state.clone()
    }

    async fn poll(&mut self, hash: InfoHash, cancel: &CancellationToken) -> PollState {
        let attempts = self.settings.attempts;
        for attempt in 1..=attempts {
            self.state = PollState::Polling { attempt };
            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return PollState::Cancelled,
                response = self.engine.get(hash) => response,
            };
            match response {
                Ok(status) => {
                    let files = status.video_files();
                    if !files.is_empty() {
                        return PollState::Resolved { files };
                    }
                    debug!(hash = %hash, attempt, "metadata not available yet");
                }
                Err(error) => {
                    return PollState::Failed {
                        error: Arc::new(error),
                    };
                }
            }
            if attempt == attempts {
                break;
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => return PollState::Cancelled,
                () = tokio::time::sleep(self.settings.interval) => {}
            }
        }
        PollState::TimedOut { attempts }
    }
}

#[cfg(test)]
mod tests {
    use spool_test_support::{ScriptedEngine, sample_hash};
    use tokio::time::Instant;

    use super::*;

    fn poller(engine: &Arc<ScriptedEngine>) -> MetadataPoller {
        MetadataPoller::new(engine.clone(), PollSettings::default())
    }

    fn movie() -> Vec<FileEntry> {
        vec![
            FileEntry::new(0, "Movie/movie.mkv", 123),
            FileEntry::new(1, "Movie/movie.nfo", 1),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_on_the_last_allowed_attempt() {
        let engine = Arc::new(ScriptedEngine::new());
        engine.push_empty_gets(59);
        engine.push_get_files(movie());
        let mut poller = poller(&engine);

        let state = poller.run(sample_hash(), &CancellationToken::new()).await;
        match state {
            PollState::Resolved { files } => {
                assert_eq!(files, vec![FileEntry::new(0, "Movie/movie.mkv", 123)]);
            }
            other => panic!("unexpected state: {other:?}"),
        }
        assert_eq!(engine.get_count(), 60);
        assert!(poller.state().is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_exactly_sixty_queries() {
        let engine = Arc::new(ScriptedEngine::new());
        let mut poller = poller(&engine);
        let started = Instant::now();

        let state = poller.run(sample_hash(), &CancellationToken::new()).await;
        assert!(matches!(state, PollState::TimedOut { attempts: 60 }));
        assert_eq!(engine.get_count(), 60);
        assert_eq!(started.elapsed(), Duration::from_millis(500 * 59));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(engine.get_count(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_fails_without_retry() {
        let engine = Arc::new(ScriptedEngine::new());
        engine.push_empty_gets(2);
        engine.fail_next_get(502);
        let mut poller = poller(&engine);

        let state = poller.run(sample_hash(), &CancellationToken::new()).await;
        assert!(matches!(state, PollState::Failed { .. }));
        assert_eq!(engine.get_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_further_queries() {
        let engine = Arc::new(ScriptedEngine::new());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1200)).await;
            trigger.cancel();
        });

        let state = poller(&engine).run(sample_hash(), &cancel).await;
        assert!(matches!(state, PollState::Cancelled));
        assert_eq!(engine.get_count(), 3);
    }
}
