use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use spool_config::TimingSettings;
use spool_core::{FileEntry, InfoHash, KnownTorrents, PosterLanguage, TorrentSource};
use spool_engine::SetTorrentRequest;
use spool_ingest::{
    CommitBlocker, CommitLabel, CommitOutcome, CommitPhase, DescriptorResolver, ExistingTorrent,
    IngestError, IngestSession, SessionDeps,
};
use spool_test_support::{
    EngineCall, ScriptedEngine, ScriptedFetcher, ScriptedPosters, magnet_uri,
    multi_file_descriptor, sample_hash, single_file_descriptor,
};
use tokio::sync::watch;

struct Fixture {
    engine: Arc<ScriptedEngine>,
    posters: Arc<ScriptedPosters>,
    fetcher: Arc<ScriptedFetcher>,
    known: watch::Sender<KnownTorrents>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            engine: Arc::new(ScriptedEngine::new()),
            posters: Arc::new(ScriptedPosters::new()),
            fetcher: Arc::new(ScriptedFetcher::new()),
            known: watch::Sender::new(KnownTorrents::empty()),
        }
    }

    fn know(&self, hashes: &[InfoHash]) {
        self.known
            .send_replace(KnownTorrents::new(hashes.iter().copied(), Utc::now()));
    }

    fn deps(&self) -> SessionDeps {
        SessionDeps {
            engine: self.engine.clone(),
            posters: self.posters.clone(),
            resolver: Arc::new(DescriptorResolver::new(self.fetcher.clone())),
            known: self.known.subscribe(),
            timing: TimingSettings::default(),
            language: PosterLanguage::En,
        }
    }

    fn open_add(&self) -> IngestSession {
        IngestSession::open_add(self.deps())
    }
}

fn movie_manifest() -> Vec<FileEntry> {
    vec![FileEntry::new(0, "Movie/movie.mkv", 123)]
}

#[tokio::test(start_paused = true)]
async fn title_burst_produces_one_search() {
    let fixture = Fixture::new();
    fixture
        .posters
        .with_results("The Matrix", &["https://img/matrix.jpg"]);
    fixture.posters.mark_reachable("https://img/matrix.jpg");
    let mut session = fixture.open_add();

    for title in ["T", "The", "The Ma", "The Matrix"] {
        session.set_title(title);
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    session.settle().await;

    assert_eq!(fixture.posters.searched_titles(), vec!["The Matrix"]);
    assert_eq!(
        session.poster().url.as_deref(),
        Some("https://img/matrix.jpg")
    );
    assert!(session.poster().verified);
}

#[tokio::test(start_paused = true)]
async fn magnet_is_added_polled_and_finalized_with_full_selection() -> anyhow::Result<()> {
    let fixture = Fixture::new();
    let hash = sample_hash();
    fixture.engine.push_add_hash(hash);
    fixture.engine.push_empty_gets(3);
    fixture.engine.push_get_files(movie_manifest());
    let uri = magnet_uri(&hash, Some("Movie"));

    let mut session = fixture.open_add();
    session.set_source(Some(TorrentSource::magnet(uri.clone())));
    session.settle().await;
    assert_eq!(session.commit_blocker(), None);
    assert!(!session.identity().manifest_known);

    let outcome = session.commit().await?;
    assert_eq!(outcome, CommitOutcome::AwaitingSelection { hash });
    assert_eq!(session.phase(), CommitPhase::SelectingFiles { hash });
    assert_eq!(session.commit_label(), CommitLabel::CreateStrmFiles);
    assert_eq!(fixture.engine.get_count(), 4);
    assert_eq!(
        session.selection().selected_ids().iter().copied().collect::<Vec<_>>(),
        vec![0]
    );

    let outcome = session.commit().await?;
    assert_eq!(outcome, CommitOutcome::Committed { hash });
    assert_eq!(session.phase(), CommitPhase::Done { hash });

    let adds = fixture.engine.add_calls();
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].link, uri);
    assert!(adds[0].save_to_db);
    assert_eq!(adds[0].selected_files, None);
    assert_eq!(
        fixture.engine.set_calls(),
        vec![SetTorrentRequest::selection(hash, None)]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn narrowed_magnet_selection_is_sent_on_finalize() -> anyhow::Result<()> {
    let fixture = Fixture::new();
    let hash = sample_hash();
    fixture.engine.push_add_hash(hash);
    fixture.engine.push_get_files(vec![
        FileEntry::new(0, "Show/e01.mkv", 10),
        FileEntry::new(1, "Show/e02.mkv", 10),
        FileEntry::new(2, "Show/info.nfo", 1),
    ]);
    let mut session = fixture.open_add();
    session.set_source(Some(TorrentSource::magnet(magnet_uri(&hash, None))));
    session.settle().await;
    session.commit().await?;
    assert_eq!(session.selection().total(), 2);

    session.toggle_all(false);
    assert_eq!(session.commit_blocker(), Some(CommitBlocker::EmptySelection));
    session.toggle_file(1);
    fixture.engine.fail_next_set(502);
    let err = session.commit().await.expect_err("finalize fails once");
    assert!(matches!(err, IngestError::Engine { operation: "torrents.set", .. }));
    assert_eq!(session.phase(), CommitPhase::SelectingFiles { hash });

    session.commit().await?;
    let sets = fixture.engine.set_calls();
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[1], SetTorrentRequest::selection(hash, Some(vec![1])));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn known_magnet_skips_add_and_loads_files() -> anyhow::Result<()> {
    let fixture = Fixture::new();
    let hash = sample_hash();
    fixture.know(&[hash]);
    fixture.engine.push_get_files(movie_manifest());

    let mut session = fixture.open_add();
    session.set_source(Some(TorrentSource::magnet(magnet_uri(&hash, None))));
    session.settle().await;
    assert_eq!(session.commit_label(), CommitLabel::LoadFiles);

    let outcome = session.commit().await?;
    assert_eq!(outcome, CommitOutcome::AwaitingSelection { hash });
    assert_eq!(fixture.engine.calls(), vec![EngineCall::Get(hash)]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn known_descriptor_is_blocked() -> anyhow::Result<()> {
    let fixture = Fixture::new();
    let descriptor = single_file_descriptor("Movie.2019.mkv", 7)?;
    fixture.know(&[descriptor.hash]);

    let mut session = fixture.open_add();
    session.set_source(Some(TorrentSource::file("movie.torrent", descriptor.bytes)));
    session.settle().await;

    assert_eq!(session.commit_blocker(), Some(CommitBlocker::DuplicateHash));
    let err = session.commit().await.expect_err("duplicate");
    assert!(matches!(
        err,
        IngestError::Blocked {
            blocker: CommitBlocker::DuplicateHash
        }
    ));
    assert!(fixture.engine.calls().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn metadata_timeout_closes_the_session() {
    let fixture = Fixture::new();
    let hash = sample_hash();
    fixture.engine.push_add_hash(hash);

    let mut session = fixture.open_add();
    session.set_source(Some(TorrentSource::magnet(magnet_uri(&hash, None))));
    session.settle().await;

    let err = session.commit().await.expect_err("timeout");
    assert!(matches!(
        err,
        IngestError::MetadataTimeout { attempts: 60, .. }
    ));
    assert_eq!(fixture.engine.get_count(), 60);
    assert_eq!(session.phase(), CommitPhase::Closed);
    assert_eq!(session.commit_blocker(), Some(CommitBlocker::Finished));
}

#[tokio::test(start_paused = true)]
async fn closing_during_polling_stops_queries() {
    let fixture = Fixture::new();
    let hash = sample_hash();
    fixture.engine.push_add_hash(hash);
    let mut session = fixture.open_add();
    session.set_source(Some(TorrentSource::magnet(magnet_uri(&hash, None))));
    session.settle().await;

    let handle = session.close_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1200)).await;
        handle.close();
    });
    let err = session.commit().await.expect_err("closed");
    assert!(matches!(err, IngestError::Closed));
    assert_eq!(session.phase(), CommitPhase::Closed);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fixture.engine.get_count(), 3);
    assert!(fixture.engine.set_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_add_keeps_the_form_for_a_retry() -> anyhow::Result<()> {
    let fixture = Fixture::new();
    let descriptor = single_file_descriptor("Heat.1995.mkv", 9)?;
    fixture
        .fetcher
        .serve("https://tracker.example/heat.torrent", descriptor.bytes);
    fixture.engine.fail_next_add(500);

    let mut session = fixture.open_add();
    session.set_source(Some(TorrentSource::link(
        "https://tracker.example/heat.torrent",
    )));
    session.settle().await;
    session.set_title("Heat");
    session.set_category("movie");
    session.settle().await;

    let err = session.commit().await.expect_err("add fails");
    assert!(err.is_transport());
    assert_eq!(session.phase(), CommitPhase::Editing);
    assert!(session.last_error().is_some());
    assert_eq!(session.title(), "Heat");
    assert_eq!(session.category(), "movie");

    let outcome = session.commit().await?;
    assert_eq!(outcome, CommitOutcome::Committed { hash: descriptor.hash });
    assert!(session.last_error().is_none());
    let adds = fixture.engine.add_calls();
    assert_eq!(adds.len(), 2);
    assert_eq!(adds[1].title, "Heat");
    assert_eq!(adds[1].category, "movie");
    assert_eq!(adds[1].selected_files, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn upload_and_link_carry_a_narrowed_selection() -> anyhow::Result<()> {
    let fixture = Fixture::new();
    let pack = multi_file_descriptor(
        "Pack",
        &[("a.mkv", 1), ("b.mkv", 2), ("notes.txt", 3)],
    )?;
    fixture
        .fetcher
        .serve("https://tracker.example/pack.torrent", pack.bytes.clone());

    let mut upload = fixture.open_add();
    upload.set_source(Some(TorrentSource::file("pack.torrent", pack.bytes)));
    upload.settle().await;
    assert_eq!(upload.selection().total(), 2);
    upload.toggle_file(1);
    upload.set_strm_dir("/library/pack");
    let outcome = upload.commit().await?;
    assert_eq!(outcome, CommitOutcome::Committed { hash: pack.hash });

    let uploads = fixture.engine.upload_calls();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].file_name, "pack.torrent");
    assert_eq!(uploads[0].selected_files, Some(vec![0]));
    assert_eq!(uploads[0].strm_dir, "/library/pack");
    assert_eq!(uploads[0].title, "");

    let mut link = fixture.open_add();
    link.set_source(Some(TorrentSource::link(
        " https://tracker.example/pack.torrent ",
    )));
    link.settle().await;
    link.toggle_directory("Pack", false);
    link.toggle_file(1);
    link.commit().await?;

    let adds = fixture.engine.add_calls();
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].link, "https://tracker.example/pack.torrent");
    assert_eq!(adds[0].selected_files, Some(vec![1]));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn edit_saves_every_field_and_keeps_unchanged_values() -> anyhow::Result<()> {
    let fixture = Fixture::new();
    fixture.posters.mark_reachable("https://img/p.jpg");
    let hash = sample_hash();
    let existing = ExistingTorrent {
        hash,
        title: "Movie".into(),
        name: "Movie.2020.1080p.mkv".into(),
        poster: "https://img/p.jpg".into(),
        category: "movie".into(),
        strm_dir: String::new(),
        files: movie_manifest(),
    };
    let mut session = IngestSession::open_edit(fixture.deps(), existing);
    session.settle().await;
    assert!(session.poster().verified);

    session.set_category("tv");
    let outcome = session.commit().await?;
    assert_eq!(outcome, CommitOutcome::Committed { hash });
    assert_eq!(
        fixture.engine.set_calls(),
        vec![SetTorrentRequest {
            hash,
            title: Some("Movie".into()),
            poster: Some("https://img/p.jpg".into()),
            category: Some("tv".into()),
            strm_dir: Some(String::new()),
            selected_files: None,
        }]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn edit_with_blank_title_falls_back_to_the_torrent_name() -> anyhow::Result<()> {
    let fixture = Fixture::new();
    let hash = sample_hash();
    let existing = ExistingTorrent {
        hash,
        title: String::new(),
        name: "Movie.2020.1080p.mkv".into(),
        poster: String::new(),
        category: String::new(),
        strm_dir: "/custom".into(),
        files: movie_manifest(),
    };
    let mut session = IngestSession::open_edit(fixture.deps(), existing);
    session.settle().await;
    assert_eq!(session.parsed_title(), "Movie");

    session.commit().await?;
    let sets = fixture.engine.set_calls();
    assert_eq!(sets[0].title.as_deref(), Some("Movie.2020.1080p.mkv"));
    assert_eq!(sets[0].poster.as_deref(), Some(""));
    assert_eq!(sets[0].strm_dir.as_deref(), Some("/custom"));
    Ok(())
}
