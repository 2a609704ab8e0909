//! In-memory host
//!
//! Used by the test suites and by embedders that feed the engine from a
//! virtual tree. Every read is counted so callers can assert that a cached
//! path skipped the filesystem.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::FsHost;
use crate::types::{DirEntry, EntryKind, FileStat};

#[derive(Debug, Clone)]
enum MemNode {
    Dir { mtime: SystemTime },
    File { bytes: Vec<u8>, mtime: SystemTime },
}

/// In-memory filesystem host
#[derive(Debug, Default)]
pub struct MemoryFs {
    nodes: RwLock<BTreeMap<PathBuf, MemNode>>,
    clock: AtomicU64,
    reads: AtomicUsize,
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} not found", path.display()),
    )
}

impl MemoryFs {
    /// Create an empty in-memory filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Every mutation gets a strictly later mtime
    fn tick(&self) -> SystemTime {
        let n = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        UNIX_EPOCH + Duration::from_secs(1_700_000_000 + n)
    }

    fn ensure_parents(&self, nodes: &mut BTreeMap<PathBuf, MemNode>, path: &Path) {
        let mut missing = Vec::new();
        let mut cursor = path.parent();
        while let Some(dir) = cursor {
            if nodes.contains_key(dir) {
                break;
            }
            missing.push(dir.to_path_buf());
            cursor = dir.parent();
        }
        for dir in missing {
            let mtime = self.tick();
            nodes.insert(dir, MemNode::Dir { mtime });
        }
    }

    /// Create a directory (and its parents)
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut nodes = self.nodes.write();
        self.ensure_parents(&mut nodes, path);
        let mtime = self.tick();
        nodes.insert(path.to_path_buf(), MemNode::Dir { mtime });
    }

    /// Create or overwrite a file (and create its parents)
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut nodes = self.nodes.write();
        self.ensure_parents(&mut nodes, path);
        let mtime = self.tick();
        nodes.insert(
            path.to_path_buf(),
            MemNode::File {
                bytes: content.into(),
                mtime,
            },
        );
    }

    /// Whether a path exists
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.nodes.read().contains_key(path.as_ref())
    }

    /// Number of `read_file`/`read_head` calls served so far
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FsHost for MemoryFs {
    async fn read_directory(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let nodes = self.nodes.read();
        match nodes.get(path) {
            Some(MemNode::Dir { .. }) => {}
            Some(MemNode::File { .. }) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} is not a directory", path.display()),
                ))
            }
            None => return Err(not_found(path)),
        }
        let entries = nodes
            .range(path.to_path_buf()..)
            .skip(1)
            .take_while(|(p, _)| p.starts_with(path))
            .filter(|(p, _)| p.parent() == Some(path))
            .map(|(p, node)| DirEntry {
                name: p
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                kind: match node {
                    MemNode::Dir { .. } => EntryKind::Directory,
                    MemNode::File { .. } => EntryKind::File,
                },
            })
            .collect();
        Ok(entries)
    }

    async fn stat(&self, path: &Path) -> io::Result<FileStat> {
        match self.nodes.read().get(path) {
            Some(MemNode::Dir { mtime }) => Ok(FileStat {
                kind: EntryKind::Directory,
                size: 0,
                mtime: *mtime,
            }),
            Some(MemNode::File { bytes, mtime }) => Ok(FileStat {
                kind: EntryKind::File,
                size: bytes.len() as u64,
                mtime: *mtime,
            }),
            None => Err(not_found(path)),
        }
    }

    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.nodes.read().get(path) {
            Some(MemNode::File { bytes, .. }) => Ok(bytes.clone()),
            Some(MemNode::Dir { .. }) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        let mut nodes = self.nodes.write();
        if !nodes.contains_key(path) {
            return Err(not_found(path));
        }
        nodes.retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut nodes = self.nodes.write();
        if !nodes.contains_key(from) {
            return Err(not_found(from));
        }
        if nodes.contains_key(to) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", to.display()),
            ));
        }
        let moved: Vec<PathBuf> = nodes
            .keys()
            .filter(|p| p.starts_with(from))
            .cloned()
            .collect();
        for old in moved {
            if let (Some(node), Ok(rest)) = (nodes.remove(&old), old.strip_prefix(from)) {
                let new_path = if rest.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(rest)
                };
                nodes.insert(new_path, node);
            }
        }
        self.ensure_parents(&mut nodes, to);
        Ok(())
    }
}
