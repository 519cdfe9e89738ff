//! Commit phases, gating and outcomes.

use std::fmt;

use spool_core::InfoHash;
use tokio_util::sync::CancellationToken;

/// Where the session stands in its commit flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPhase {
    /// Form is editable.
    Editing,
    /// Primary engine call (`add`, upload or edit `set`) in flight.
    Submitting,
    /// Waiting for magnet metadata.
    AwaitingMetadata,
    /// Manifest arrived; the user picks files before finalizing.
    SelectingFiles {
        /// Registered torrent.
        hash: InfoHash,
    },
    /// Finalizing `set` in flight.
    Finalizing,
    /// Flow committed.
    Done {
        /// Committed torrent.
        hash: InfoHash,
    },
    /// Session closed by the user or by a metadata failure.
    Closed,
}

impl CommitPhase {
    /// Whether the session reached a terminal phase.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Done { .. } | Self::Closed)
    }

    /// Whether an engine call is outstanding.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(
            self,
            Self::Submitting | Self::AwaitingMetadata | Self::Finalizing
        )
    }

    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Editing => "editing",
            Self::Submitting => "submitting",
            Self::AwaitingMetadata => "awaiting_metadata",
            Self::SelectingFiles { .. } => "selecting_files",
            Self::Finalizing => "finalizing",
            Self::Done { .. } => "done",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for CommitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reason the commit action is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitBlocker {
    /// No source, or the source failed the syntactic check.
    SourceInvalid,
    /// Hash absent or resolution pending.
    NotReady,
    /// Non-magnet source already known to the engine.
    DuplicateHash,
    /// Manifest is non-empty but nothing is selected.
    EmptySelection,
    /// An engine call is outstanding.
    Busy,
    /// Session is done or closed.
    Finished,
}

/// Caption of the commit action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitLabel {
    /// Register a new torrent.
    Add,
    /// Save an edited torrent.
    Save,
    /// Load the manifest of a magnet the engine already knows.
    LoadFiles,
    /// Finalize the file selection of a magnet.
    CreateStrmFiles,
}

/// Result of a successful [`crate::IngestSession::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The terminal commit call succeeded.
    Committed {
        /// Committed torrent.
        hash: InfoHash,
    },
    /// Magnet metadata arrived; commit again to finalize the selection.
    AwaitingSelection {
        /// Registered torrent.
        hash: InfoHash,
    },
}

/// Cloneable handle closing a session from outside its control flow, e.g.
/// while a commit is being awaited.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    token: CancellationToken,
}

impl CloseHandle {
    pub(crate) const fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Request the session to close. Outstanding engine calls and polling are
    /// abandoned; no state changes after the session observes the request.
    pub fn close(&self) {
        self.token.cancel();
    }

    /// Whether close was requested.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}
