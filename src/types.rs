/*!
 * Core types shared across the selection engine
 */

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use strum::Display;

/// Kind of a filesystem entry as far as the tree is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory containing other entries
    Directory,
    /// Anything else, or not known yet (symlinks before they are stat'ed)
    Unknown,
}

/// Result of a `stat` call on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Entry kind (symlinks are followed)
    pub kind: EntryKind,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub mtime: SystemTime,
}

/// One entry returned by a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (single path component)
    pub name: String,
    /// Entry kind as reported by the listing
    pub kind: EntryKind,
}

/// Checkbox state of a path, derived on read from the explicit selection set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CheckState {
    /// Explicitly checked, implied by a checked ancestor, or all children checked
    Checked,
    /// Some but not all descendants checked
    Partial,
    /// Nothing at or below this path is checked
    Unchecked,
}

/// Filesystem change notification from the host watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    /// A path was created
    Created(PathBuf),
    /// A path was deleted
    Deleted(PathBuf),
    /// A file's content changed
    Changed(PathBuf),
}

impl FsEvent {
    /// Path the event refers to
    pub fn path(&self) -> &Path {
        match self {
            FsEvent::Created(p) | FsEvent::Deleted(p) | FsEvent::Changed(p) => p,
        }
    }
}

/// A workspace root: the top of one selectable tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRoot {
    /// Display name (the directory name unless configured otherwise)
    pub name: String,
    /// Absolute, normalized root path
    pub path: PathBuf,
}

impl WorkspaceRoot {
    /// Create a root named after its last path component
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self { name, path }
    }
}
