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

//! Torrent ingestion sessions: source resolution, poster search, metadata
//! polling and the add/edit commit flows.
//!
//! Layout: `session.rs` (the session state machine), `resolver.rs` (source to
//! identity), `debounce.rs` (poster search coalescing), `poller.rs` (magnet
//! metadata polling), `commit.rs` (phases and gating), `bootstrap.rs`
//! (runtime wiring), `error.rs`.

pub mod bootstrap;
pub mod commit;
pub mod debounce;
pub mod error;
pub mod poller;
pub mod resolver;
pub mod session;

pub use bootstrap::IngestRuntime;
pub use commit::{CloseHandle, CommitBlocker, CommitLabel, CommitOutcome, CommitPhase};
pub use debounce::{PosterSearchDebouncer, PosterSearchOutcome};
pub use error::{IngestError, IngestResult, ResolveError, ResolveResult};
pub use poller::{MetadataPoller, PollSettings, PollState};
pub use resolver::{DescriptorResolver, SourceResolver, parse_descriptor, parse_magnet};
pub use session::{ExistingTorrent, IngestSession, SessionDeps, SessionMode};
