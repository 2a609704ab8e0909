/*!
 * Integration tests for the selection pipeline on the real filesystem
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use filetime::{set_file_mtime, FileTime};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use ctxcraft::config::Config;
use ctxcraft::selection::{JsonStateFile, STATE_KEY_SELECTED};
use ctxcraft::session::Session;
use ctxcraft::tokenizer::Tokenizer;
use ctxcraft::types::FsEvent;

struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

fn open_session(root: &Path, state_file: &Path) -> Session {
    let config = Config {
        roots: vec![root.to_path_buf()],
        state_file: state_file.to_path_buf(),
        ..Config::default()
    };
    Session::builder(config)
        .persistence(Arc::new(JsonStateFile::new(state_file)))
        .tokenizer(Arc::new(WordTokenizer))
        .build()
        .unwrap()
}

fn sorted(mut files: Vec<PathBuf>) -> Vec<PathBuf> {
    files.sort();
    files
}

#[tokio::test]
async fn test_ignore_file_edit_is_picked_up() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path().join("project");
    fs::create_dir_all(root.join("logs")).unwrap();
    fs::write(root.join(".gitignore"), "*.log\n").unwrap();
    fs::write(root.join("main.rs"), "fn main() {}").unwrap();
    fs::write(root.join("logs/run.log"), "started").unwrap();
    set_file_mtime(root.join(".gitignore"), FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

    let session = open_session(&root, &temp_dir.path().join("state.json"));
    session.toggle(&root, true).await.unwrap();
    let cancel = CancellationToken::new();

    assert_eq!(
        sorted(session.resolve(&cancel).await),
        vec![root.join(".gitignore"), root.join("main.rs")]
    );

    fs::write(root.join(".gitignore"), "*.rs\n").unwrap();
    set_file_mtime(root.join(".gitignore"), FileTime::from_unix_time(1_600_000_100, 0)).unwrap();

    assert_eq!(
        sorted(session.resolve(&cancel).await),
        vec![root.join(".gitignore"), root.join("logs/run.log")]
    );
}

#[tokio::test]
async fn test_selection_survives_restart() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path().join("project");
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/lib.rs"), "pub fn lib() {}").unwrap();
    fs::write(root.join("README.md"), "# readme").unwrap();
    let state_file = temp_dir.path().join("state/selection.json");

    {
        let session = open_session(&root, &state_file);
        session.toggle(&root.join("src"), true).await.unwrap();
    }

    let stored: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&state_file).unwrap()).unwrap();
    assert_eq!(
        stored[STATE_KEY_SELECTED],
        serde_json::json!([root.join("src").to_string_lossy()])
    );

    let session = open_session(&root, &state_file);
    assert_eq!(session.selected_paths().await, vec![root.join("src")]);
}

#[tokio::test]
async fn test_export_on_disk() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path().join("project");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("a.txt"), "alpha beta").unwrap();
    fs::write(root.join("blob.bin"), [0u8, 1, 2, 3]).unwrap();

    let session = open_session(&root, &temp_dir.path().join("state.json"));
    session.toggle(&root, true).await.unwrap();

    let export = session.export(&CancellationToken::new()).await.unwrap();
    assert_eq!(export.files, 2);
    assert_eq!(export.tokens, 2);
    assert_eq!(
        export.xml,
        [
            "<code_files>",
            "  <file name=\"a.txt\" path=\"a.txt\"><![CDATA[alpha beta]]></file>",
            "  <file name=\"blob.bin\" path=\"blob.bin\" binary=\"true\"/>",
            "</code_files>",
        ]
        .join("\n")
    );
}

#[tokio::test]
async fn test_rename_and_delete_on_disk() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path().join("project");
    fs::create_dir_all(root.join("old")).unwrap();
    fs::write(root.join("old/a.rs"), "a").unwrap();
    fs::write(root.join("keep.rs"), "keep").unwrap();

    let session = open_session(&root, &temp_dir.path().join("state.json"));
    session.toggle(&root.join("old/a.rs"), true).await.unwrap();

    session
        .rename_path(&root.join("old"), &root.join("new"))
        .await
        .unwrap();
    assert!(root.join("new/a.rs").exists());
    assert_eq!(session.selected_paths().await, vec![root.join("new/a.rs")]);

    // Renaming onto an existing path fails and changes nothing
    assert!(session
        .rename_path(&root.join("new/a.rs"), &root.join("keep.rs"))
        .await
        .is_err());
    assert_eq!(session.selected_paths().await, vec![root.join("new/a.rs")]);

    session.delete_path(&root.join("new")).await.unwrap();
    assert!(!root.join("new").exists());
    assert!(session.selected_paths().await.is_empty());
}

#[tokio::test]
async fn test_external_delete_event() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path().join("project");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("gone.rs"), "gone").unwrap();

    let session = open_session(&root, &temp_dir.path().join("state.json"));
    session.toggle(&root.join("gone.rs"), true).await.unwrap();

    fs::remove_file(root.join("gone.rs")).unwrap();
    session
        .handle_fs_event(&FsEvent::Deleted(root.join("gone.rs")))
        .await
        .unwrap();
    assert!(session.selected_paths().await.is_empty());
}
