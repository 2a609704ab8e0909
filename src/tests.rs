/*!
 * Session-level tests for ctxcraft
 */

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::debounce::DEFAULT_DEBOUNCE;
use crate::error::CraftError;
use crate::host::{FsHost, MemoryFs};
use crate::refresh::{RefreshOutcome, StatusSink};
use crate::selection::MemoryPersistence;
use crate::session::{SeedReport, Session};
use crate::tokenizer::Tokenizer;
use crate::types::{CheckState, DirEntry, FileStat, FsEvent};

/// Counts whitespace-separated words
struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// Counts directory listings, each taking `delay`
struct SlowListingFs {
    inner: Arc<MemoryFs>,
    delay: Duration,
    listings: AtomicUsize,
}

impl SlowListingFs {
    fn new(inner: Arc<MemoryFs>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            listings: AtomicUsize::new(0),
        }
    }

    fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FsHost for SlowListingFs {
    async fn read_directory(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.read_directory(path).await
    }

    async fn stat(&self, path: &Path) -> io::Result<FileStat> {
        self.inner.stat(path).await
    }

    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read_file(path).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        self.inner.remove(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.inner.rename(from, to).await
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<String>>,
}

impl StatusSink for RecordingSink {
    fn set_calculating(&self) {
        self.events.lock().push("calculating".to_string());
    }

    fn update_counts(&self, files: usize, tokens: usize) {
        self.events.lock().push(format!("{} {}", files, tokens));
    }

    fn set_no_workspace(&self) {
        self.events.lock().push("no workspace".to_string());
    }
}

fn create_test_fs() -> Arc<MemoryFs> {
    let fs = Arc::new(MemoryFs::new());
    fs.add_file("/p/.gitignore", "ignored.txt\nsubdir/\n");
    fs.add_file("/p/folderA/f1", "one two");
    fs.add_file("/p/folderA/f2", "three");
    fs.add_file("/p/F/C", "c c c");
    fs.add_file("/p/F/D", "d");
    fs.add_file("/p/F/G/E", "e e");
    fs.add_file("/p/keep.rs", "fn keep() {}");
    fs.add_file("/p/ignored.txt", "secret words here");
    fs.add_file("/p/subdir/inner.rs", "hidden");
    fs
}

fn config(roots: &[&str]) -> Config {
    Config {
        roots: roots.iter().map(PathBuf::from).collect(),
        ..Config::default()
    }
}

fn session_with(fs: Arc<MemoryFs>, persistence: Arc<MemoryPersistence>, cfg: Config) -> Session {
    Session::builder(cfg)
        .host(fs)
        .persistence(persistence)
        .tokenizer(Arc::new(WordTokenizer))
        .build()
        .unwrap()
}

fn paths(items: &[&str]) -> Vec<PathBuf> {
    items.iter().map(PathBuf::from).collect()
}

#[tokio::test]
async fn test_check_folder_then_file_keeps_siblings() {
    let session = session_with(
        create_test_fs(),
        Arc::new(MemoryPersistence::default()),
        config(&["/p"]),
    );

    assert!(session.toggle(Path::new("/p/folderA"), true).await.unwrap());
    assert!(session.toggle(Path::new("/p/folderA/f1"), true).await.unwrap());
    assert_eq!(
        session.selected_paths().await,
        paths(&["/p/folderA/f1", "/p/folderA/f2"])
    );
    assert_eq!(
        session.check_state(Path::new("/p/folderA")).await,
        CheckState::Checked
    );
}

#[tokio::test]
async fn test_uncheck_child_of_checked_folder() {
    let session = session_with(
        create_test_fs(),
        Arc::new(MemoryPersistence::default()),
        config(&["/p"]),
    );

    session.toggle(Path::new("/p/F"), true).await.unwrap();
    session.toggle(Path::new("/p/F/C"), false).await.unwrap();

    assert_eq!(
        session.selected_paths().await,
        paths(&["/p/F/D", "/p/F/G"])
    );
    assert_eq!(
        session.check_state(Path::new("/p/F")).await,
        CheckState::Partial
    );
    assert_eq!(
        session.check_state(Path::new("/p/F/G/E")).await,
        CheckState::Checked
    );
    assert_eq!(
        session.check_state(Path::new("/p/F/C")).await,
        CheckState::Unchecked
    );
}

#[tokio::test]
async fn test_selection_stays_minimal() {
    let session = session_with(
        create_test_fs(),
        Arc::new(MemoryPersistence::default()),
        config(&["/p"]),
    );

    let steps = [
        ("/p/F/G/E", true),
        ("/p/F", true),
        ("/p/F/G", false),
        ("/p/folderA/f2", true),
        ("/p", true),
        ("/p/F/D", false),
        ("/p/folderA", false),
    ];
    for (path, checked) in steps {
        session.toggle(Path::new(path), checked).await.unwrap();
        let selected = session.selected_paths().await;
        for a in &selected {
            for b in &selected {
                assert!(
                    a == b || !b.starts_with(a),
                    "{} implies {} after toggling {}",
                    a.display(),
                    b.display(),
                    path
                );
            }
        }
    }
}

#[tokio::test]
async fn test_relative_or_outside_paths_are_rejected() {
    let session = session_with(
        create_test_fs(),
        Arc::new(MemoryPersistence::default()),
        config(&["/p"]),
    );

    assert!(matches!(
        session.toggle(Path::new("p/keep.rs"), true).await,
        Err(CraftError::InvalidArgument(_))
    ));
    assert!(matches!(
        session.toggle(Path::new("/q/other.rs"), true).await,
        Err(CraftError::InvalidArgument(_))
    ));
    assert!(session.selected_paths().await.is_empty());
}

#[tokio::test]
async fn test_resolve_respects_ignore_rules() {
    let session = session_with(
        create_test_fs(),
        Arc::new(MemoryPersistence::default()),
        config(&["/p"]),
    );
    session.toggle(Path::new("/p"), true).await.unwrap();

    let mut files = session.resolve(&CancellationToken::new()).await;
    files.sort();
    assert_eq!(
        files,
        paths(&[
            "/p/.gitignore",
            "/p/F/C",
            "/p/F/D",
            "/p/F/G/E",
            "/p/folderA/f1",
            "/p/folderA/f2",
            "/p/keep.rs",
        ])
    );
}

#[tokio::test]
async fn test_refresh_reports_counts() {
    let session = session_with(
        create_test_fs(),
        Arc::new(MemoryPersistence::default()),
        config(&["/p"]),
    );
    session.toggle(Path::new("/p/F"), true).await.unwrap();
    session.toggle(Path::new("/p/keep.rs"), true).await.unwrap();

    // C (3) + D (1) + E (2) + keep.rs (3)
    assert_eq!(
        session.refresh().await,
        RefreshOutcome::Applied {
            files: 4,
            tokens: 9
        }
    );

    let report = session.report(&CancellationToken::new()).await;
    assert_eq!(report.files, 4);
    assert_eq!(report.tokens, 9);
    assert_eq!(report.selections, 2);
    assert!(report.cache.hits > 0);
    assert!(report.file_tokens.iter().any(|f| f.path == "F/G/E" && f.tokens == 2));
}

#[tokio::test]
async fn test_no_workspace_refresh() {
    let session = session_with(
        create_test_fs(),
        Arc::new(MemoryPersistence::default()),
        config(&[]),
    );
    assert_eq!(session.refresh().await, RefreshOutcome::NoWorkspace);
}

#[tokio::test]
async fn test_export_document() {
    let session = session_with(
        create_test_fs(),
        Arc::new(MemoryPersistence::default()),
        config(&["/p"]),
    );
    session.toggle(Path::new("/p/folderA"), true).await.unwrap();

    let export = session.export(&CancellationToken::new()).await.unwrap();
    assert_eq!(export.files, 2);
    assert_eq!(export.tokens, 3);
    assert_eq!(
        export.xml,
        [
            "<code_files>",
            "  <file name=\"f1\" path=\"folderA/f1\"><![CDATA[one two]]></file>",
            "  <file name=\"f2\" path=\"folderA/f2\"><![CDATA[three]]></file>",
            "</code_files>",
        ]
        .join("\n")
    );
}

#[tokio::test]
async fn test_export_resolves_once_and_matches_report() {
    let host = Arc::new(SlowListingFs::new(create_test_fs(), Duration::ZERO));
    let session = Session::builder(config(&["/p"]))
        .host(host.clone())
        .persistence(Arc::new(MemoryPersistence::default()))
        .tokenizer(Arc::new(WordTokenizer))
        .build()
        .unwrap();
    session.toggle(Path::new("/p/F"), true).await.unwrap();
    let cancel = CancellationToken::new();

    let before = host.listings();
    let files = session.resolve(&cancel).await;
    let per_resolve = host.listings() - before;
    assert!(per_resolve > 0);

    let before = host.listings();
    let export = session.export(&cancel).await.unwrap();
    assert_eq!(host.listings() - before, per_resolve);

    assert_eq!(export.files, files.len());
    assert_eq!(export.report.files, export.files);
    assert_eq!(export.report.tokens, export.tokens);
    assert_eq!(export.tokens, 6);
    assert_eq!(export.report.file_tokens.len(), 3);
    assert!(export.xml.contains("path=\"F/G/E\""));
}

#[tokio::test(start_paused = true)]
async fn test_debounced_refresh_supersedes_run_in_flight() {
    let host = Arc::new(SlowListingFs::new(create_test_fs(), Duration::from_secs(1)));
    let sink = Arc::new(RecordingSink::default());
    let session = Arc::new(
        Session::builder(config(&["/p"]))
            .host(host)
            .persistence(Arc::new(MemoryPersistence::default()))
            .tokenizer(Arc::new(WordTokenizer))
            .sink(sink.clone())
            .build()
            .unwrap(),
    );
    session.toggle(Path::new("/p/folderA"), true).await.unwrap();
    let debouncer = session.debounced_refresh();

    // First run starts and is stuck listing when the second burst fires
    debouncer.trigger();
    tokio::time::sleep(DEFAULT_DEBOUNCE + Duration::from_millis(50)).await;
    debouncer.trigger();
    tokio::time::sleep(DEFAULT_DEBOUNCE + Duration::from_millis(50)).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let events = sink.events.lock().clone();
    assert_eq!(
        events.iter().filter(|e| e.as_str() == "calculating").count(),
        2
    );
    let counts: Vec<String> = events
        .into_iter()
        .filter(|e| e != "calculating")
        .collect();
    assert_eq!(counts, vec!["2 3".to_string()]);
}

#[tokio::test]
async fn test_loaded_selection_is_normalized_and_pruned() {
    let persistence = Arc::new(MemoryPersistence::with_paths([
        "/p/F",
        "/p/F/C",
        "/elsewhere/x.rs",
    ]));
    let session = session_with(create_test_fs(), persistence.clone(), config(&["/p"]));

    assert_eq!(session.selected_paths().await, paths(&["/p/F"]));
    assert_eq!(persistence.stored(), paths(&["/p/F"]));
    assert_eq!(persistence.save_count(), 1);

    session.toggle(Path::new("/p/keep.rs"), true).await.unwrap();
    assert_eq!(persistence.stored(), paths(&["/p/F", "/p/keep.rs"]));
    assert_eq!(persistence.save_count(), 2);

    // No-op toggles do not write
    session.toggle(Path::new("/p/keep.rs"), true).await.unwrap();
    assert_eq!(persistence.save_count(), 2);
}

#[tokio::test]
async fn test_rename_and_delete_follow_the_filesystem() {
    let fs = create_test_fs();
    let persistence = Arc::new(MemoryPersistence::default());
    let session = session_with(fs.clone(), persistence.clone(), config(&["/p"]));
    session.toggle(Path::new("/p/F/C"), true).await.unwrap();
    session.toggle(Path::new("/p/keep.rs"), true).await.unwrap();

    session
        .rename_path(Path::new("/p/F"), Path::new("/p/H"))
        .await
        .unwrap();
    assert!(fs.exists("/p/H/C"));
    assert_eq!(
        session.selected_paths().await,
        paths(&["/p/H/C", "/p/keep.rs"])
    );

    session.delete_path(Path::new("/p/H")).await.unwrap();
    assert!(!fs.exists("/p/H"));
    assert_eq!(session.selected_paths().await, paths(&["/p/keep.rs"]));
    assert_eq!(persistence.stored(), paths(&["/p/keep.rs"]));
}

#[tokio::test]
async fn test_failed_operations_leave_selection_unchanged() {
    let session = session_with(
        create_test_fs(),
        Arc::new(MemoryPersistence::default()),
        config(&["/p"]),
    );
    session.toggle(Path::new("/p/keep.rs"), true).await.unwrap();

    let err = session.delete_path(Path::new("/p/missing.rs")).await;
    assert!(matches!(err, Err(CraftError::Operation(_))));

    let err = session
        .rename_path(Path::new("/p/keep.rs"), Path::new("/p/folderA/f1"))
        .await;
    assert!(matches!(err, Err(CraftError::Operation(_))));

    assert!(session.delete_path(Path::new("/p")).await.is_err());
    assert_eq!(session.selected_paths().await, paths(&["/p/keep.rs"]));
}

#[tokio::test]
async fn test_delete_event_forgets_selection() {
    let fs = create_test_fs();
    let session = session_with(
        fs.clone(),
        Arc::new(MemoryPersistence::default()),
        config(&["/p"]),
    );
    session.toggle(Path::new("/p/folderA/f1"), true).await.unwrap();
    session.toggle(Path::new("/p/keep.rs"), true).await.unwrap();

    assert!(session
        .handle_fs_event(&FsEvent::Deleted(PathBuf::from("/p/folderA")))
        .await
        .unwrap());
    assert_eq!(session.selected_paths().await, paths(&["/p/keep.rs"]));

    // Events inside build output directories are dropped
    assert!(!session
        .handle_fs_event(&FsEvent::Changed(PathBuf::from("/p/node_modules/x.js")))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_changed_event_recounts_file() {
    let fs = create_test_fs();
    let session = session_with(
        fs.clone(),
        Arc::new(MemoryPersistence::default()),
        config(&["/p"]),
    );
    session.toggle(Path::new("/p/keep.rs"), true).await.unwrap();
    let cancel = CancellationToken::new();
    let files = session.resolve(&cancel).await;
    assert_eq!(session.count(&files, &cancel).await, 3);

    fs.add_file("/p/keep.rs", "fn keep() { more }");
    session
        .handle_fs_event(&FsEvent::Changed(PathBuf::from("/p/keep.rs")))
        .await
        .unwrap();
    assert_eq!(session.count(&files, &cancel).await, 5);
}

#[tokio::test]
async fn test_seed_replaces_selection() {
    let session = session_with(
        create_test_fs(),
        Arc::new(MemoryPersistence::default()),
        config(&["/p"]),
    );
    session.toggle(Path::new("/p/folderA"), true).await.unwrap();

    let report = session
        .seed(&paths(&["/p/keep.rs", "/p/F/D", "/p/gone.rs", "/q/out.rs"]))
        .await
        .unwrap();
    assert_eq!(
        report,
        SeedReport {
            added: 2,
            missing: 1,
            outside: 1
        }
    );
    assert_eq!(
        session.selected_paths().await,
        paths(&["/p/F/D", "/p/keep.rs"])
    );
}

#[tokio::test]
async fn test_removed_root_prunes_selection() {
    let fs = create_test_fs();
    fs.add_file("/q/other.rs", "other");
    let session = session_with(
        fs,
        Arc::new(MemoryPersistence::default()),
        config(&["/p", "/q"]),
    );
    session.toggle(Path::new("/q/other.rs"), true).await.unwrap();
    session.toggle(Path::new("/p/keep.rs"), true).await.unwrap();

    assert!(session.set_roots(vec![PathBuf::from("/p")]).await.unwrap());
    assert_eq!(session.selected_paths().await, paths(&["/p/keep.rs"]));
    assert!(!session.set_roots(vec![PathBuf::from("/p")]).await.unwrap());
}

#[tokio::test]
async fn test_children_carry_check_state() {
    let session = session_with(
        create_test_fs(),
        Arc::new(MemoryPersistence::default()),
        config(&["/p"]),
    );
    session.toggle(Path::new("/p/F/G/E"), true).await.unwrap();

    let items = session.children(Path::new("/p/F")).await;
    let states: Vec<(PathBuf, CheckState)> =
        items.into_iter().map(|i| (i.path, i.state)).collect();
    assert_eq!(
        states,
        vec![
            (PathBuf::from("/p/F/G"), CheckState::Checked),
            (PathBuf::from("/p/F/C"), CheckState::Unchecked),
            (PathBuf::from("/p/F/D"), CheckState::Unchecked),
        ]
    );
    assert_eq!(
        session.check_state(Path::new("/p/F")).await,
        CheckState::Partial
    );
}
