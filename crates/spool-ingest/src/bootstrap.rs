//! Wiring of the production collaborators behind [`IngestSession`]s.

use std::sync::Arc;

use spool_config::{BasicCredentials, IngestConfig};
use spool_core::KnownTorrents;
use spool_engine::{
    EngineApi, EngineClient, EngineCredentials, HttpDescriptorFetcher, KnownTorrentsFeed,
    PosterProvider, TmdbPosterClient, build_http_client,
};
use spool_telemetry::{LoggingConfig, build_sha, init_logging};
use tracing::info;

use crate::error::{IngestError, IngestResult};
use crate::resolver::{DescriptorResolver, SourceResolver};
use crate::session::{ExistingTorrent, IngestSession, SessionDeps};

/// Long-lived runtime: HTTP clients, resolver and the known-torrents feed.
pub struct IngestRuntime {
    config: IngestConfig,
    engine: Arc<dyn EngineApi>,
    posters: Arc<dyn PosterProvider>,
    resolver: Arc<dyn SourceResolver>,
    feed: KnownTorrentsFeed,
}

impl IngestRuntime {
    /// Load configuration from the environment, install logging and build the
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`], [`IngestError::Telemetry`] or
    /// [`IngestError::Engine`] when the corresponding layer cannot start.
    pub fn from_env() -> IngestResult<Self> {
        let config = IngestConfig::from_env().map_err(|source| IngestError::Config { source })?;
        init_logging(&LoggingConfig {
            level: &config.logging.level,
            format: config.logging.format,
            build_sha: build_sha(),
        })
        .map_err(|source| IngestError::Telemetry {
            source: Arc::new(source),
        })?;
        Self::from_config(config)
    }

    /// Build the runtime from an already loaded configuration. Must be called
    /// inside a Tokio runtime; the known-torrents feed starts immediately.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Engine`] when the HTTP client or an endpoint URL
    /// cannot be built.
    pub fn from_config(config: IngestConfig) -> IngestResult<Self> {
        let client = build_http_client(config.engine.http_timeout)
            .map_err(|err| IngestError::engine("http_client.build", err))?;
        let credentials = config
            .engine
            .credentials
            .as_ref()
            .map(|BasicCredentials { user, password }| EngineCredentials {
                user: user.clone(),
                password: password.clone(),
            });
        let engine: Arc<dyn EngineApi> = Arc::new(
            EngineClient::new(client.clone(), &config.engine.base_url, credentials)
                .map_err(|err| IngestError::engine("engine_client.new", err))?,
        );
        let posters: Arc<dyn PosterProvider> = Arc::new(
            TmdbPosterClient::new(client.clone(), &config.poster.base_url)
                .map_err(|err| IngestError::engine("poster_client.new", err))?,
        );
        let fetcher = HttpDescriptorFetcher::new(client, config.engine.link_max_bytes);
        let resolver: Arc<dyn SourceResolver> =
            Arc::new(DescriptorResolver::new(Arc::new(fetcher)));
        let feed = KnownTorrentsFeed::spawn(Arc::clone(&engine), config.timing.known_refresh);

        info!(
            engine = %config.engine.base_url,
            posters = %config.poster.base_url,
            language = %config.poster.language,
            "ingest runtime ready"
        );
        Ok(Self {
            config,
            engine,
            posters,
            resolver,
            feed,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Engine client shared by all sessions.
    #[must_use]
    pub fn engine(&self) -> Arc<dyn EngineApi> {
        Arc::clone(&self.engine)
    }

    /// Latest known-torrents snapshot.
    #[must_use]
    pub fn known(&self) -> KnownTorrents {
        self.feed.snapshot()
    }

    /// Collaborators for a new session.
    #[must_use]
    pub fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            engine: Arc::clone(&self.engine),
            posters: Arc::clone(&self.posters),
            resolver: Arc::clone(&self.resolver),
            known: self.feed.subscribe(),
            timing: self.config.timing,
            language: self.config.poster.language,
        }
    }

    /// Open an add dialog.
    #[must_use]
    pub fn open_add(&self) -> IngestSession {
        IngestSession::open_add(self.session_deps())
    }

    /// Open an edit dialog for `existing`.
    #[must_use]
    pub fn open_edit(&self, existing: ExistingTorrent) -> IngestSession {
        IngestSession::open_edit(self.session_deps(), existing)
    }

    /// Stop the known-torrents feed.
    pub fn shutdown(&self) {
        self.feed.shutdown();
        info!("ingest runtime stopped");
    }
}

impl Drop for IngestRuntime {
    fn drop(&mut self) {
        self.feed.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use spool_core::PosterLanguage;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> IngestConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        IngestConfig::from_lookup(|name| vars.get(name).cloned()).expect("valid config")
    }

    #[tokio::test]
    async fn runtime_hands_configured_timings_to_sessions() {
        let runtime = IngestRuntime::from_config(config(&[
            ("SPOOL_ENGINE_URL", "http://127.0.0.1:9/"),
            ("SPOOL_POSTER_LANGUAGE", "ru"),
            ("SPOOL_POLL_ATTEMPTS", "5"),
        ]))
        .expect("runtime");

        let deps = runtime.session_deps();
        assert_eq!(deps.timing.poll_attempts, 5);
        assert_eq!(deps.language, PosterLanguage::Ru);

        let session = runtime.open_add();
        assert_eq!(session.language(), PosterLanguage::Ru);
        runtime.shutdown();
    }
}
