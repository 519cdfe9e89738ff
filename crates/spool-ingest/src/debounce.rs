//! Debounced poster search.
//!
//! Each request advances a generation and replaces whatever was pending, so a
//! burst of title edits inside the window produces a single provider call with
//! the last title. Results are posted to the owner's inbox tagged with the
//! generation that issued them.

use std::sync::Arc;
use std::time::Duration;

use spool_core::{Generation, GenerationCounter, PosterLanguage};
use spool_engine::PosterProvider;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

/// Result of one poster search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosterSearchOutcome {
    /// Generation that issued the search.
    pub generation: Generation,
    /// Searched title.
    pub title: String,
    /// Search language.
    pub language: PosterLanguage,
    /// Candidate URLs, best first; empty when the provider failed.
    pub candidates: Vec<String>,
    /// Adopt the first candidate even when the user overrode the poster.
    pub refresh_main: bool,
}

/// Coalesces poster searches and posts their outcomes as `M`.
pub struct PosterSearchDebouncer<M> {
    provider: Arc<dyn PosterProvider>,
    sender: UnboundedSender<M>,
    window: Duration,
    generations: GenerationCounter,
    pending: Option<JoinHandle<()>>,
}

impl<M> PosterSearchDebouncer<M>
where
    M: From<PosterSearchOutcome> + Send + 'static,
{
    /// Debouncer posting outcomes to `sender` after `window` of quiet.
    #[must_use]
    pub const fn new(
        provider: Arc<dyn PosterProvider>,
        sender: UnboundedSender<M>,
        window: Duration,
    ) -> Self {
        Self {
            provider,
            sender,
            window,
            generations: GenerationCounter::new(),
            pending: None,
        }
    }

    /// Search for `title` once no newer request arrived for a full window.
    pub fn schedule(&mut self, title: &str, language: PosterLanguage) -> Generation {
        self.spawn(title, language, Some(self.window), false)
    }

    /// Search for `title` immediately, superseding anything pending.
    pub fn fire_now(
        &mut self,
        title: &str,
        language: PosterLanguage,
        refresh_main: bool,
    ) -> Generation {
        self.spawn(title, language, None, refresh_main)
    }

    /// Drop the pending search, if any; its outcome will be stale.
    pub fn cancel(&mut self) {
        self.generations.advance();
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }

    /// Whether `generation` belongs to the latest request.
    #[must_use]
    pub const fn is_current(&self, generation: Generation) -> bool {
        self.generations.is_current(generation)
    }

    /// Mark the latest request as delivered.
    pub fn complete(&mut self, generation: Generation) {
        if self.is_current(generation) {
            self.pending = None;
        }
    }

    /// Whether a search is waiting for its window or its provider call.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.pending.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn spawn(
        &mut self,
        title: &str,
        language: PosterLanguage,
        delay: Option<Duration>,
        refresh_main: bool,
    ) -> Generation {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        let generation = self.generations.advance();
        let provider = Arc::clone(&self.provider);
        let sender = self.sender.clone();
        let title = title.trim().to_string();
        self.pending = Some(tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let candidates = match provider.search(&title, language).await {
                Ok(candidates) => candidates,
                Err(err) => {
                    debug!(title = %title, error = %err, "poster provider unavailable");
                    Vec::new()
                }
            };
            let outcome = PosterSearchOutcome {
                generation,
                title,
                language,
                candidates,
                refresh_main,
            };
            // Receiver gone means the session was dropped.
            let _ = sender.send(M::from(outcome));
        }));
        generation
    }
}

impl<M> Drop for PosterSearchDebouncer<M> {
    fn drop(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}
