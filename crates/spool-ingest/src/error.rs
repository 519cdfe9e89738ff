//! # Design
//!
//! - Resolution failures stay inside the resolver boundary and degrade to an
//!   unresolved identity; they never reach the commit path.
//! - Session errors are cheap to clone so the same value can be returned to the
//!   caller and kept as the session's `last_error`.

use std::sync::Arc;

use spool_core::{CoreError, InfoHash};
use spool_engine::EngineError;
use thiserror::Error;

use crate::commit::CommitBlocker;

/// Result alias for source resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Result alias for session and runtime operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Failures while deriving an identity from a source.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Source failed the syntactic check.
    #[error("source is not valid")]
    InvalidSource,
    /// Descriptor bytes are not valid bencode.
    #[error("descriptor is not valid bencode")]
    Bencode {
        /// Decoder error.
        #[source]
        source: serde_bencode::Error,
    },
    /// Descriptor lacks a required field or has it with the wrong type.
    #[error("descriptor field is missing or malformed")]
    Descriptor {
        /// Offending field.
        field: &'static str,
    },
    /// Magnet URI could not be parsed.
    #[error("magnet uri is malformed")]
    Magnet {
        /// Raw URI.
        value: String,
    },
    /// Hash embedded in the source is invalid.
    #[error("info hash is invalid")]
    Hash {
        /// Parse error.
        #[source]
        source: CoreError,
    },
    /// Descriptor download failed.
    #[error("descriptor download failed")]
    Fetch {
        /// Transport error.
        #[source]
        source: EngineError,
    },
}

/// Failures surfaced by an ingestion session or the runtime around it.
#[derive(Debug, Clone, Error)]
pub enum IngestError {
    /// Commit was requested while blocked.
    #[error("commit is not allowed in the current state")]
    Blocked {
        /// Reason commit is disabled.
        blocker: CommitBlocker,
    },
    /// Engine call failed.
    #[error("engine operation failed")]
    Engine {
        /// Operation identifier.
        operation: &'static str,
        /// Transport or protocol error.
        #[source]
        source: Arc<EngineError>,
    },
    /// Magnet metadata did not appear within the polling budget.
    #[error("torrent metadata did not arrive in time")]
    MetadataTimeout {
        /// Polled torrent.
        hash: InfoHash,
        /// Queries issued.
        attempts: u32,
    },
    /// Session was closed while the operation was running.
    #[error("session is closed")]
    Closed,
    /// Runtime configuration could not be loaded.
    #[error("configuration is invalid")]
    Config {
        /// Configuration error.
        #[source]
        source: spool_config::ConfigError,
    },
    /// Logging could not be installed.
    #[error("logging initialisation failed")]
    Telemetry {
        /// Telemetry error.
        #[source]
        source: Arc<spool_telemetry::TelemetryError>,
    },
}

impl IngestError {
    pub(crate) fn engine(operation: &'static str, source: EngineError) -> Self {
        Self::Engine {
            operation,
            source: Arc::new(source),
        }
    }

    /// Whether the error came from the engine transport.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Engine { .. })
    }
}
