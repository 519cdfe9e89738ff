//! One add or edit dialog: the commit orchestrator.
//!
//! # Design
//! - The session owns all of its state. Spawned tasks (resolution, poster
//!   search, image checks) only compute and post generation-tagged events to
//!   the session inbox; [`IngestSession::pump`], [`IngestSession::drain`] and
//!   [`IngestSession::settle`] apply them on the session's own control flow.
//! - Events whose generation was superseded are discarded on arrival.
//! - Closing cancels the shared token, aborts tasks and freezes the state.

use std::future::Future;
use std::sync::Arc;

use spool_config::TimingSettings;
use spool_core::{
    DuplicateVerdict, FileEntry, FileSelection, Generation, GenerationCounter, InfoHash,
    KnownTorrents, PosterLanguage, PosterState, ResolvedIdentity, TorrentSource,
    classify_duplicate, normalize_title,
};
use spool_engine::{
    AddTorrentRequest, EngineApi, EngineError, PosterProvider, SetTorrentRequest, TorrentStatus,
    UploadRequest,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, info_span, warn};
use uuid::Uuid;

use crate::commit::{CloseHandle, CommitBlocker, CommitLabel, CommitOutcome, CommitPhase};
use crate::debounce::{PosterSearchDebouncer, PosterSearchOutcome};
use crate::error::{IngestError, IngestResult};
use crate::poller::{MetadataPoller, PollSettings, PollState};
use crate::resolver::SourceResolver;

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct SessionDeps {
    /// Remote engine.
    pub engine: Arc<dyn EngineApi>,
    /// Poster search provider.
    pub posters: Arc<dyn PosterProvider>,
    /// Source resolver.
    pub resolver: Arc<dyn SourceResolver>,
    /// Latest known-torrents snapshot.
    pub known: watch::Receiver<KnownTorrents>,
    /// Debounce and polling timings.
    pub timing: TimingSettings,
    /// Initial poster search language.
    pub language: PosterLanguage,
}

/// Torrent being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingTorrent {
    /// Engine hash.
    pub hash: InfoHash,
    /// Current display title.
    pub title: String,
    /// Original torrent name.
    pub name: String,
    /// Current poster URL; may be empty.
    pub poster: String,
    /// Current category.
    pub category: String,
    /// Current `.strm` directory.
    pub strm_dir: String,
    /// Manifest as reported by the engine.
    pub files: Vec<FileEntry>,
}

impl ExistingTorrent {
    /// Build from an engine status; `None` when the status has no valid hash.
    #[must_use]
    pub fn from_status(status: &TorrentStatus) -> Option<Self> {
        Some(Self {
            hash: status.info_hash()?,
            title: status.title.clone().unwrap_or_default(),
            name: status.name.clone().unwrap_or_default(),
            poster: status.poster.clone().unwrap_or_default(),
            category: status.category.clone().unwrap_or_default(),
            strm_dir: String::new(),
            files: status.file_stats.clone().unwrap_or_default(),
        })
    }
}

/// Whether the session adds a new torrent or edits a registered one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Add a torrent from a user source.
    Add,
    /// Edit a registered torrent.
    Edit {
        /// Edited torrent.
        hash: InfoHash,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckPurpose {
    Adopt { refresh_main: bool },
    Verify { clear_if_unreachable: bool },
}

#[derive(Debug)]
enum SessionEvent {
    Resolved {
        generation: Generation,
        identity: ResolvedIdentity,
    },
    Posters(PosterSearchOutcome),
    PosterChecked {
        generation: Generation,
        url: String,
        reachable: bool,
        purpose: CheckPurpose,
    },
}

impl From<PosterSearchOutcome> for SessionEvent {
    fn from(outcome: PosterSearchOutcome) -> Self {
        Self::Posters(outcome)
    }
}

/// State machine of one ingestion dialog.
pub struct IngestSession {
    id: Uuid,
    span: Span,
    mode: SessionMode,
    engine: Arc<dyn EngineApi>,
    posters: Arc<dyn PosterProvider>,
    resolver: Arc<dyn SourceResolver>,
    known: watch::Receiver<KnownTorrents>,
    poll: PollSettings,
    language: PosterLanguage,

    source: Option<TorrentSource>,
    identity: ResolvedIdentity,
    sources: GenerationCounter,
    resolve_task: Option<JoinHandle<()>>,
    original_name: Option<String>,
    parsed_title: String,
    title: String,
    category: String,
    strm_dir: String,
    poster: PosterState,
    checks: GenerationCounter,
    check_task: Option<JoinHandle<()>>,
    selection: FileSelection,
    selection_hash: Option<InfoHash>,
    phase: CommitPhase,
    last_error: Option<IngestError>,

    debouncer: PosterSearchDebouncer<SessionEvent>,
    sender: UnboundedSender<SessionEvent>,
    inbox: UnboundedReceiver<SessionEvent>,
    cancel: CancellationToken,
}

impl IngestSession {
    /// Open an empty add dialog.
    #[must_use]
    pub fn open_add(deps: SessionDeps) -> Self {
        let session = Self::new(deps, SessionMode::Add);
        session.span.in_scope(|| info!("add session opened"));
        session
    }

    /// Open an edit dialog for `existing`.
    ///
    /// The poster counts as user-chosen, so searches only refresh the
    /// candidate list. A non-empty poster is checked once and dropped if it
    /// is not reachable.
    #[must_use]
    pub fn open_edit(deps: SessionDeps, existing: ExistingTorrent) -> Self {
        let ExistingTorrent {
            hash,
            title,
            name,
            poster,
            category,
            strm_dir,
            files,
        } = existing;
        let mut session = Self::new(deps, SessionMode::Edit { hash });
        let _entered = session.span.clone().entered();

        session.identity = ResolvedIdentity::from_descriptor(hash, Some(name), files);
        session.original_name = session.identity.original_name.clone();
        session.parsed_title = session
            .original_name
            .as_deref()
            .map(normalize_title)
            .unwrap_or_default();
        session.selection = FileSelection::new(session.identity.files.clone());
        session.selection_hash = Some(hash);
        session.title = title;
        session.category = category;
        session.strm_dir = strm_dir;
        session.poster.set_url(Some(poster));
        session.poster.user_overrode = true;
        if let Some(url) = session.poster.url.clone() {
            session.spawn_check(
                url,
                CheckPurpose::Verify {
                    clear_if_unreachable: true,
                },
            );
        }
        info!(hash = %hash, files = session.selection.total(), "edit session opened");
        session
    }

    fn new(deps: SessionDeps, mode: SessionMode) -> Self {
        let id = Uuid::new_v4();
        let span = match mode {
            SessionMode::Add => info_span!("ingest_session", session_id = %id, mode = "add"),
            SessionMode::Edit { hash } => {
                info_span!("ingest_session", session_id = %id, mode = "edit", hash = %hash)
            }
        };
        let (sender, inbox) = mpsc::unbounded_channel();
        Self {
            id,
            span,
            mode,
            debouncer: PosterSearchDebouncer::new(
                Arc::clone(&deps.posters),
                sender.clone(),
                deps.timing.debounce,
            ),
            engine: deps.engine,
            posters: deps.posters,
            resolver: deps.resolver,
            known: deps.known,
            poll: PollSettings::from(&deps.timing),
            language: deps.language,
            source: None,
            identity: ResolvedIdentity::unresolved(),
            sources: GenerationCounter::new(),
            resolve_task: None,
            original_name: None,
            parsed_title: String::new(),
            title: String::new(),
            category: String::new(),
            strm_dir: String::new(),
            poster: PosterState::default(),
            checks: GenerationCounter::new(),
            check_task: None,
            selection: FileSelection::new(Vec::new()),
            selection_hash: None,
            phase: CommitPhase::Editing,
            last_error: None,
            sender,
            inbox,
            cancel: CancellationToken::new(),
        }
    }

    // --- accessors ---

    /// Identifier carried by the session's tracing span.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Add or edit.
    #[must_use]
    pub const fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Current commit phase.
    #[must_use]
    pub fn phase(&self) -> CommitPhase {
        if self.cancel.is_cancelled() && !self.phase.is_finished() {
            CommitPhase::Closed
        } else {
            self.phase
        }
    }

    /// Error of the last failed commit, if any.
    #[must_use]
    pub const fn last_error(&self) -> Option<&IngestError> {
        self.last_error.as_ref()
    }

    /// Chosen source.
    #[must_use]
    pub const fn source(&self) -> Option<&TorrentSource> {
        self.source.as_ref()
    }

    /// Identity of the current source.
    #[must_use]
    pub const fn identity(&self) -> &ResolvedIdentity {
        &self.identity
    }

    /// Whether a resolution for the current source is outstanding.
    #[must_use]
    pub const fn is_resolving(&self) -> bool {
        self.resolve_task.is_some()
    }

    /// Name embedded in the source (descriptor name, magnet `dn` or file name).
    #[must_use]
    pub fn original_name(&self) -> Option<&str> {
        self.original_name.as_deref()
    }

    /// Title derived from [`Self::original_name`].
    #[must_use]
    pub fn parsed_title(&self) -> &str {
        &self.parsed_title
    }

    /// User-entered title; may be empty.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Title used for poster searches: the entered title, else the parsed one.
    #[must_use]
    pub fn effective_title(&self) -> &str {
        let entered = self.title.trim();
        if entered.is_empty() {
            &self.parsed_title
        } else {
            entered
        }
    }

    /// Category.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Custom `.strm` directory.
    #[must_use]
    pub fn strm_dir(&self) -> &str {
        &self.strm_dir
    }

    /// Poster search language.
    #[must_use]
    pub const fn language(&self) -> PosterLanguage {
        self.language
    }

    /// Poster state.
    #[must_use]
    pub const fn poster(&self) -> &PosterState {
        &self.poster
    }

    /// File selection over the current manifest.
    #[must_use]
    pub const fn selection(&self) -> &FileSelection {
        &self.selection
    }

    /// Relation of the current source to the known torrents.
    #[must_use]
    pub fn duplicate_verdict(&self) -> DuplicateVerdict {
        match (self.mode, &self.source) {
            (SessionMode::Add, Some(source)) => classify_duplicate(
                source.kind(),
                self.identity.hash.as_ref(),
                &self.known.borrow(),
            ),
            _ => DuplicateVerdict::Fresh,
        }
    }

    /// Handle closing the session from another task.
    #[must_use]
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle::new(self.cancel.clone())
    }

    // --- form operations ---

    /// Replace the source, resetting everything derived from the previous one.
    ///
    /// `None` clears the source. Setting the current source again is a no-op.
    /// The file selection survives when the new source resolves to the same
    /// torrent. Ignored in edit mode.
    pub fn set_source(&mut self, source: Option<TorrentSource>) {
        let _entered = self.span.clone().entered();
        if !self.accepts_edits() {
            return;
        }
        if let SessionMode::Edit { .. } = self.mode {
            debug!("source change ignored in edit mode");
            return;
        }
        if self.source.as_ref() == source.as_ref() {
            debug!("source unchanged");
            return;
        }

        let generation = self.sources.advance();
        if let Some(task) = self.resolve_task.take() {
            task.abort();
        }
        self.debouncer.cancel();
        self.title.clear();
        self.original_name = None;
        self.parsed_title.clear();
        self.poster.user_overrode = false;
        self.identity = ResolvedIdentity::unresolved();

        let Some(source) = source else {
            info!("source cleared");
            self.source = None;
            self.adopt_manifest(None, Vec::new());
            self.poster.candidates.clear();
            self.remove_poster();
            return;
        };
        info!(kind = ?source.kind(), source = %source.label(), "source changed");
        self.source = Some(source.clone());
        if !source.is_correct() {
            debug!("source failed the syntactic check");
            self.apply_resolution(generation, ResolvedIdentity::unresolved());
            return;
        }

        let resolver = Arc::clone(&self.resolver);
        let sender = self.sender.clone();
        self.resolve_task = Some(tokio::spawn(async move {
            let identity = match resolver.resolve(&source).await {
                Ok(identity) => identity,
                Err(err) => {
                    debug!(error = %err, "source resolution failed");
                    ResolvedIdentity::unresolved()
                }
            };
            let _ = sender.send(SessionEvent::Resolved {
                generation,
                identity,
            });
        }));
    }

    /// Update the entered title.
    ///
    /// A non-empty title is searched after the debounce window. Clearing it
    /// cancels the pending search and falls back to the parsed title, or
    /// removes the poster when there is none.
    pub fn set_title(&mut self, title: impl Into<String>) {
        let _entered = self.span.clone().entered();
        if !self.accepts_edits() {
            return;
        }
        self.title = title.into();
        if self.title.trim().is_empty() {
            self.debouncer.cancel();
            self.search_now(false);
        } else {
            self.debouncer.schedule(&self.title, self.language);
        }
    }

    /// Drop the entered title and search for the parsed one right away.
    pub fn reset_title_to_source(&mut self) {
        let _entered = self.span.clone().entered();
        if !self.accepts_edits() {
            return;
        }
        self.title.clear();
        self.poster.user_overrode = false;
        self.search_now(false);
    }

    /// Change the search language; re-runs the search and refreshes the poster.
    pub fn set_language(&mut self, language: PosterLanguage) {
        let _entered = self.span.clone().entered();
        if !self.accepts_edits() {
            return;
        }
        self.language = language;
        let title = self.effective_title().to_string();
        if !title.is_empty() {
            self.debouncer.fire_now(&title, language, true);
        }
    }

    /// Adopt one of the offered candidates.
    pub fn pick_candidate(&mut self, url: &str) {
        self.set_poster_url(url);
    }

    /// Adopt a user-supplied poster URL; blank input clears the poster.
    pub fn set_poster_url(&mut self, url: impl Into<String>) {
        let _entered = self.span.clone().entered();
        if !self.accepts_edits() {
            return;
        }
        self.poster.user_overrode = true;
        self.cancel_check();
        self.poster.set_url(Some(url.into()));
        if let Some(url) = self.poster.url.clone() {
            self.spawn_check(
                url,
                CheckPurpose::Verify {
                    clear_if_unreachable: false,
                },
            );
        }
    }

    /// Remove the poster and stop automatic adoption.
    pub fn clear_poster(&mut self) {
        let _entered = self.span.clone().entered();
        if !self.accepts_edits() {
            return;
        }
        self.poster.user_overrode = true;
        self.remove_poster();
    }

    /// Update the category.
    pub fn set_category(&mut self, category: impl Into<String>) {
        if self.accepts_edits() {
            self.category = category.into();
        }
    }

    /// Update the custom `.strm` directory.
    pub fn set_strm_dir(&mut self, strm_dir: impl Into<String>) {
        if self.accepts_edits() {
            self.strm_dir = strm_dir.into();
        }
    }

    /// Flip one file.
    pub fn toggle_file(&mut self, id: u32) {
        if self.accepts_selection() {
            self.selection.toggle_file(id);
        }
    }

    /// Select or deselect every file under `path`.
    pub fn toggle_directory(&mut self, path: &str, selected: bool) {
        if self.accepts_selection() {
            self.selection.toggle_directory(path, selected);
        }
    }

    /// Select or deselect every file.
    pub fn toggle_all(&mut self, selected: bool) {
        if self.accepts_selection() {
            self.selection.toggle_all(selected);
        }
    }

    /// Expand or collapse a directory group.
    pub fn toggle_expansion(&mut self, path: &str) {
        if self.accepts_selection() {
            self.selection.toggle_expansion(path);
        }
    }

    // --- commit ---

    /// Reason commit is disabled, or `None` when it is allowed.
    #[must_use]
    pub fn commit_blocker(&self) -> Option<CommitBlocker> {
        let phase = self.phase();
        if phase.is_finished() {
            return Some(CommitBlocker::Finished);
        }
        if phase.is_busy() {
            return Some(CommitBlocker::Busy);
        }
        if let CommitPhase::SelectingFiles { .. } = phase {
            return (self.selection.selected_count() == 0).then_some(CommitBlocker::EmptySelection);
        }
        if self.mode == SessionMode::Add {
            let Some(source) = &self.source else {
                return Some(CommitBlocker::SourceInvalid);
            };
            if !source.is_correct() {
                return Some(CommitBlocker::SourceInvalid);
            }
            if self.is_resolving() || self.identity.hash.is_none() {
                return Some(CommitBlocker::NotReady);
            }
            if self.duplicate_verdict() == DuplicateVerdict::Blocked {
                return Some(CommitBlocker::DuplicateHash);
            }
        }
        (self.selection.total() > 0 && self.selection.selected_count() == 0)
            .then_some(CommitBlocker::EmptySelection)
    }

    /// Caption of the commit action.
    #[must_use]
    pub fn commit_label(&self) -> CommitLabel {
        match (self.mode, self.phase) {
            (SessionMode::Edit { .. }, _) => CommitLabel::Save,
            (_, CommitPhase::SelectingFiles { .. }) => CommitLabel::CreateStrmFiles,
            _ if self.duplicate_verdict() == DuplicateVerdict::ResumeSelection => {
                CommitLabel::LoadFiles
            }
            _ => CommitLabel::Add,
        }
    }

    /// Run the commit flow for the current state.
    ///
    /// Edits, uploads and links finish with one engine call. Magnets are
    /// registered (unless already known), polled for metadata and return
    /// [`CommitOutcome::AwaitingSelection`]; committing again finalizes the
    /// selection.
    ///
    /// # Errors
    ///
    /// - [`IngestError::Blocked`] when [`Self::commit_blocker`] is set.
    /// - [`IngestError::Engine`] when an engine call fails; the session returns
    ///   to editing (or file selection) with the form preserved.
    /// - [`IngestError::MetadataTimeout`] or a failed metadata query; the
    ///   session closes.
    /// - [`IngestError::Closed`] when the session closes mid-flight.
    pub async fn commit(&mut self) -> IngestResult<CommitOutcome> {
        let span = self.span.clone();
        self.run_commit().instrument(span).await
    }

    async fn run_commit(&mut self) -> IngestResult<CommitOutcome> {
        self.observe_close();
        if let Some(blocker) = self.commit_blocker() {
            debug!(?blocker, "commit blocked");
            return Err(IngestError::Blocked { blocker });
        }
        self.last_error = None;

        if let CommitPhase::SelectingFiles { hash } = self.phase {
            return self.finalize(hash).await;
        }
        if let SessionMode::Edit { hash } = self.mode {
            return self.save_edit(hash).await;
        }
        let (Some(source), Some(hash)) = (self.source.clone(), self.identity.hash) else {
            return Err(IngestError::Blocked {
                blocker: CommitBlocker::NotReady,
            });
        };
        match source {
            TorrentSource::File { name, bytes } => self.upload(hash, name, bytes).await,
            TorrentSource::Link { url } => self.add_link(hash, &url).await,
            TorrentSource::Magnet { uri } => self.add_magnet(hash, &uri).await,
        }
    }

    async fn save_edit(&mut self, hash: InfoHash) -> IngestResult<CommitOutcome> {
        let operation = "torrents.set";
        let title = match self.title.trim() {
            "" => self.original_name.clone().unwrap_or_default(),
            entered => entered.to_string(),
        };
        let request = SetTorrentRequest {
            hash,
            title: Some(title),
            poster: Some(self.poster.url_or_empty().to_string()),
            category: Some(self.category.clone()),
            strm_dir: Some(self.strm_dir.clone()),
            selected_files: self.selection.explicit_selection(),
        };
        self.enter(CommitPhase::Submitting);
        let engine = Arc::clone(&self.engine);
        match until_closed(&self.cancel, engine.set(request)).await {
            None => Err(self.closed_mid_flight()),
            Some(Err(err)) => Err(self.fail(operation, err, CommitPhase::Editing)),
            Some(Ok(())) => Ok(self.complete(hash)),
        }
    }

    async fn upload(
        &mut self,
        resolved: InfoHash,
        file_name: String,
        bytes: Vec<u8>,
    ) -> IngestResult<CommitOutcome> {
        let operation = "torrents.upload";
        let request = UploadRequest {
            file_name,
            bytes,
            title: self.title.trim().to_string(),
            category: self.category.clone(),
            poster: self.poster.url_or_empty().to_string(),
            strm_dir: self.strm_dir.clone(),
            selected_files: self.selection.explicit_selection(),
        };
        self.enter(CommitPhase::Submitting);
        let engine = Arc::clone(&self.engine);
        match until_closed(&self.cancel, engine.upload(request)).await {
            None => Err(self.closed_mid_flight()),
            Some(Err(err)) => Err(self.fail(operation, err, CommitPhase::Editing)),
            Some(Ok(status)) => Ok(self.complete(status.info_hash().unwrap_or(resolved))),
        }
    }

    async fn add_link(&mut self, resolved: InfoHash, url: &str) -> IngestResult<CommitOutcome> {
        let operation = "torrents.add";
        let request = self.add_request(url.trim().to_string(), self.selection.explicit_selection());
        self.enter(CommitPhase::Submitting);
        let engine = Arc::clone(&self.engine);
        match until_closed(&self.cancel, engine.add(request)).await {
            None => Err(self.closed_mid_flight()),
            Some(Err(err)) => Err(self.fail(operation, err, CommitPhase::Editing)),
            Some(Ok(status)) => Ok(self.complete(status.info_hash().unwrap_or(resolved))),
        }
    }

    async fn add_magnet(&mut self, resolved: InfoHash, uri: &str) -> IngestResult<CommitOutcome> {
        let registered = if self.duplicate_verdict() == DuplicateVerdict::ResumeSelection {
            info!(hash = %resolved, "magnet already registered, loading its files");
            resolved
        } else {
            let operation = "torrents.add";
            let request = self.add_request(uri.trim().to_string(), None);
            self.enter(CommitPhase::Submitting);
            let engine = Arc::clone(&self.engine);
            match until_closed(&self.cancel, engine.add(request)).await {
                None => return Err(self.closed_mid_flight()),
                Some(Err(err)) => return Err(self.fail(operation, err, CommitPhase::Editing)),
                Some(Ok(status)) => status.info_hash().unwrap_or(resolved),
            }
        };
        self.await_metadata(registered).await
    }

    async fn await_metadata(&mut self, hash: InfoHash) -> IngestResult<CommitOutcome> {
        self.enter(CommitPhase::AwaitingMetadata);
        let mut poller = MetadataPoller::new(Arc::clone(&self.engine), self.poll);
        match poller.run(hash, &self.cancel).await {
            PollState::Resolved { files } => {
                self.identity.hash = Some(hash);
                self.identity.manifest_known = true;
                self.identity.files = files.clone();
                self.adopt_manifest(Some(hash), files);
                self.enter(CommitPhase::SelectingFiles { hash });
                Ok(CommitOutcome::AwaitingSelection { hash })
            }
            PollState::TimedOut { attempts } => {
                Err(self.abort_flow(IngestError::MetadataTimeout { hash, attempts }))
            }
            PollState::Failed { error } => Err(self.abort_flow(IngestError::Engine {
                operation: "torrents.get",
                source: error,
            })),
            PollState::Cancelled | PollState::Idle | PollState::Polling { .. } => {
                Err(self.closed_mid_flight())
            }
        }
    }

    async fn finalize(&mut self, hash: InfoHash) -> IngestResult<CommitOutcome> {
        let operation = "torrents.set";
        let request = SetTorrentRequest::selection(hash, self.selection.explicit_selection());
        self.enter(CommitPhase::Finalizing);
        let engine = Arc::clone(&self.engine);
        match until_closed(&self.cancel, engine.set(request)).await {
            None => Err(self.closed_mid_flight()),
            Some(Err(err)) => Err(self.fail(operation, err, CommitPhase::SelectingFiles { hash })),
            Some(Ok(())) => Ok(self.complete(hash)),
        }
    }

    fn add_request(&self, link: String, selected_files: Option<Vec<u32>>) -> AddTorrentRequest {
        AddTorrentRequest {
            link,
            title: self.title.trim().to_string(),
            poster: self.poster.url_or_empty().to_string(),
            data: None,
            save_to_db: true,
            category: self.category.clone(),
            strm_dir: self.strm_dir.clone(),
            selected_files,
        }
    }

    fn complete(&mut self, hash: InfoHash) -> CommitOutcome {
        info!(hash = %hash, "torrent committed");
        self.enter(CommitPhase::Done { hash });
        self.stop_background();
        CommitOutcome::Committed { hash }
    }

    fn fail(&mut self, operation: &'static str, err: EngineError, back_to: CommitPhase) -> IngestError {
        warn!(operation, error = %err, "commit failed");
        let error = IngestError::engine(operation, err);
        self.last_error = Some(error.clone());
        self.enter(back_to);
        error
    }

    fn abort_flow(&mut self, error: IngestError) -> IngestError {
        self.last_error = Some(error.clone());
        self.enter(CommitPhase::Closed);
        self.stop_background();
        error
    }

    fn closed_mid_flight(&mut self) -> IngestError {
        self.close();
        IngestError::Closed
    }

    // --- lifecycle ---

    /// Close the session. Pending searches, checks, resolutions and polling
    /// stop and no later event changes the state.
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.observe_close();
    }

    /// Apply every event already in the inbox; returns how many were applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.inbox.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Wait for the next event and apply it. Returns `false` without waiting
    /// when no background work is outstanding.
    pub async fn pump(&mut self) -> bool {
        if self.drain() > 0 {
            return true;
        }
        if !self.has_pending_work() {
            return false;
        }
        let event = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            event = self.inbox.recv() => event,
        };
        let Some(event) = event else {
            self.observe_close();
            return false;
        };
        self.apply(event);
        true
    }

    /// Apply events until no background work is outstanding.
    pub async fn settle(&mut self) {
        loop {
            if self.has_pending_work() {
                if !self.pump().await {
                    return;
                }
            } else if self.drain() == 0 {
                return;
            }
        }
    }

    fn has_pending_work(&self) -> bool {
        let running = |task: &Option<JoinHandle<()>>| task.as_ref().is_some_and(|t| !t.is_finished());
        !self.cancel.is_cancelled()
            && (running(&self.resolve_task) || running(&self.check_task) || self.debouncer.in_flight())
    }

    fn observe_close(&mut self) {
        if self.cancel.is_cancelled() && !self.phase.is_finished() {
            self.enter(CommitPhase::Closed);
            self.stop_background();
        }
    }

    fn stop_background(&mut self) {
        self.cancel.cancel();
        self.debouncer.cancel();
        self.cancel_check();
        self.sources.advance();
        if let Some(task) = self.resolve_task.take() {
            task.abort();
        }
    }

    fn enter(&mut self, phase: CommitPhase) {
        if self.phase != phase {
            info!(from = %self.phase, to = %phase, "session phase changed");
            self.phase = phase;
        }
    }

    fn accepts_edits(&mut self) -> bool {
        self.observe_close();
        self.phase == CommitPhase::Editing
    }

    fn accepts_selection(&mut self) -> bool {
        self.observe_close();
        matches!(
            self.phase,
            CommitPhase::Editing | CommitPhase::SelectingFiles { .. }
        )
    }

    // --- event application ---

    fn apply(&mut self, event: SessionEvent) {
        self.observe_close();
        if self.phase.is_finished() {
            return;
        }
        let _entered = self.span.clone().entered();
        match event {
            SessionEvent::Resolved {
                generation,
                identity,
            } => self.apply_resolution(generation, identity),
            SessionEvent::Posters(outcome) => self.apply_posters(outcome),
            SessionEvent::PosterChecked {
                generation,
                url,
                reachable,
                purpose,
            } => self.apply_check(generation, url, reachable, purpose),
        }
    }

    fn apply_resolution(&mut self, generation: Generation, identity: ResolvedIdentity) {
        if !self.sources.is_current(generation) {
            debug!(generation = generation.value(), "stale resolution discarded");
            return;
        }
        self.resolve_task = None;
        let fallback = match &self.source {
            Some(TorrentSource::File { name, .. }) => Some(name.clone()),
            _ => None,
        };
        self.original_name = identity
            .original_name
            .clone()
            .or(fallback)
            .filter(|name| !name.trim().is_empty());
        self.parsed_title = self
            .original_name
            .as_deref()
            .map(normalize_title)
            .unwrap_or_default();
        self.adopt_manifest(identity.hash, identity.files.clone());
        match identity.hash {
            Some(hash) => info!(
                hash = %hash,
                manifest_known = identity.manifest_known,
                files = identity.files.len(),
                "source identity resolved"
            ),
            None => info!("source could not be resolved"),
        }
        self.identity = identity;
        self.search_now(false);
    }

    fn apply_posters(&mut self, outcome: PosterSearchOutcome) {
        if !self.debouncer.is_current(outcome.generation) {
            debug!(title = %outcome.title, "stale poster search discarded");
            return;
        }
        self.debouncer.complete(outcome.generation);
        debug!(
            title = %outcome.title,
            candidates = outcome.candidates.len(),
            "poster candidates received"
        );
        if outcome.candidates.is_empty() {
            self.poster.candidates.clear();
            if !self.poster.user_overrode {
                self.remove_poster();
            }
            return;
        }
        self.poster.candidates = outcome.candidates;
        if self.poster.user_overrode && !outcome.refresh_main {
            return;
        }
        if let Some(first) = self.poster.candidates.first().cloned() {
            self.spawn_check(
                first,
                CheckPurpose::Adopt {
                    refresh_main: outcome.refresh_main,
                },
            );
        }
    }

    fn apply_check(
        &mut self,
        generation: Generation,
        url: String,
        reachable: bool,
        purpose: CheckPurpose,
    ) {
        if !self.checks.is_current(generation) {
            return;
        }
        self.check_task = None;
        debug!(url = %url, reachable, "poster checked");
        match purpose {
            CheckPurpose::Adopt { refresh_main } => {
                if self.poster.user_overrode && !refresh_main {
                    return;
                }
                if reachable {
                    self.poster.url = Some(url);
                    self.poster.verified = true;
                } else {
                    self.poster.clear_url();
                }
            }
            CheckPurpose::Verify {
                clear_if_unreachable,
            } => {
                if self.poster.url.as_deref() != Some(url.as_str()) {
                    return;
                }
                if reachable {
                    self.poster.verified = true;
                } else if clear_if_unreachable {
                    self.poster.clear_url();
                } else {
                    self.poster.verified = false;
                }
            }
        }
    }

    /// Search the effective title right away, or drop the poster when there
    /// is nothing to search for.
    fn search_now(&mut self, refresh_main: bool) {
        let title = self.effective_title().to_string();
        if title.is_empty() {
            self.debouncer.cancel();
            if !self.poster.user_overrode {
                self.remove_poster();
            }
        } else {
            self.debouncer.fire_now(&title, self.language, refresh_main);
        }
    }

    /// Install `files` as the selection universe unless it is the manifest
    /// already on display for the same torrent.
    fn adopt_manifest(&mut self, hash: Option<InfoHash>, files: Vec<FileEntry>) {
        if hash.is_some() && hash == self.selection_hash && self.selection.same_manifest(&files) {
            debug!("manifest unchanged, keeping file selection");
            return;
        }
        self.selection_hash = hash;
        self.selection.reset(files);
    }

    fn remove_poster(&mut self) {
        self.cancel_check();
        self.poster.clear_url();
    }

    fn spawn_check(&mut self, url: String, purpose: CheckPurpose) {
        self.cancel_check();
        let generation = self.checks.current();
        let posters = Arc::clone(&self.posters);
        let sender = self.sender.clone();
        self.check_task = Some(tokio::spawn(async move {
            let reachable = posters.is_reachable(&url).await;
            let _ = sender.send(SessionEvent::PosterChecked {
                generation,
                url,
                reachable,
                purpose,
            });
        }));
    }

    fn cancel_check(&mut self) {
        self.checks.advance();
        if let Some(task) = self.check_task.take() {
            task.abort();
        }
    }
}

impl Drop for IngestSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.resolve_task.take() {
            task.abort();
        }
        if let Some(task) = self.check_task.take() {
            task.abort();
        }
    }
}

async fn until_closed<F: Future + Send>(cancel: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        output = future => Some(output),
    }
}
