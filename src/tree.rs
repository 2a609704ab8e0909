/*!
 * Lazily materialized directory tree
 *
 * The hierarchy is never held in memory wholesale. Every child lookup goes
 * through the host, and the only thing remembered between calls is the kind
 * of each path seen so far.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::host::FsHost;
use crate::types::{EntryKind, FsEvent};

/// Path to kind mapping filled during listings and traversals
#[derive(Debug, Default)]
pub struct KindCache {
    kinds: RwLock<HashMap<PathBuf, EntryKind>>,
}

impl KindCache {
    /// Create an empty kind cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached kind of a path, if known
    pub fn get(&self, path: &Path) -> Option<EntryKind> {
        self.kinds.read().get(path).copied()
    }

    /// Record the kind of a path; `Unknown` is never cached
    pub fn record(&self, path: &Path, kind: EntryKind) {
        if kind != EntryKind::Unknown {
            self.kinds.write().insert(path.to_path_buf(), kind);
        }
    }

    /// Drop the entries a watcher event makes stale.
    ///
    /// Creates and deletes change the parent's listing, so the parent goes too.
    pub fn invalidate(&self, event: &FsEvent) {
        let path = event.path();
        let mut kinds = self.kinds.write();
        kinds.remove(path);
        match event {
            FsEvent::Created(_) | FsEvent::Deleted(_) => {
                if let Some(parent) = path.parent() {
                    kinds.remove(parent);
                }
            }
            FsEvent::Changed(_) => {}
        }
    }

    /// Forget everything at or below `path`
    pub fn forget_subtree(&self, path: &Path) {
        self.kinds.write().retain(|p, _| !p.starts_with(path));
    }

    /// Number of cached kinds
    pub fn len(&self) -> usize {
        self.kinds.read().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.kinds.read().is_empty()
    }
}

/// Child lookups used by the selection logic
#[async_trait]
pub trait TreeSource: Send + Sync {
    /// Direct children of `dir`, directories first then by path.
    /// Files and unreadable directories have no children.
    async fn children(&self, dir: &Path) -> Vec<PathBuf>;

    /// Kind of `path`
    async fn kind(&self, path: &Path) -> EntryKind;
}

/// Tree view over a filesystem host
#[derive(Clone)]
pub struct Tree {
    host: Arc<dyn FsHost>,
    kinds: Arc<KindCache>,
}

impl Tree {
    /// Create a tree over `host`, recording kinds into `kinds`
    pub fn new(host: Arc<dyn FsHost>, kinds: Arc<KindCache>) -> Self {
        Self { host, kinds }
    }

    /// Direct children with their kinds, sorted directories first then by path
    pub async fn entries(&self, dir: &Path) -> Vec<(PathBuf, EntryKind)> {
        let listing = match self.host.read_directory(dir).await {
            Ok(listing) => listing,
            Err(e) => {
                debug!("Cannot list {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut entries = Vec::with_capacity(listing.len());
        for entry in listing {
            let path = dir.join(&entry.name);
            let kind = match entry.kind {
                EntryKind::Unknown => self.kind(&path).await,
                kind => {
                    self.kinds.record(&path, kind);
                    kind
                }
            };
            entries.push((path, kind));
        }

        entries.sort_by(|(a_path, a_kind), (b_path, b_kind)| {
            let a_dir = *a_kind == EntryKind::Directory;
            let b_dir = *b_kind == EntryKind::Directory;
            b_dir.cmp(&a_dir).then_with(|| a_path.cmp(b_path))
        });
        entries
    }
}

#[async_trait]
impl TreeSource for Tree {
    async fn children(&self, dir: &Path) -> Vec<PathBuf> {
        if self.kind(dir).await != EntryKind::Directory {
            return Vec::new();
        }
        self.entries(dir)
            .await
            .into_iter()
            .map(|(path, _)| path)
            .collect()
    }

    async fn kind(&self, path: &Path) -> EntryKind {
        if let Some(kind) = self.kinds.get(path) {
            return kind;
        }
        match self.host.stat(path).await {
            Ok(stat) => {
                self.kinds.record(path, stat.kind);
                stat.kind
            }
            Err(_) => EntryKind::Unknown,
        }
    }
}
