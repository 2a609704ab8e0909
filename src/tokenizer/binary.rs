//! Binary file detection

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::host::FsHost;

/// Bytes inspected from the start of a file
pub const BINARY_SNIFF_BYTES: usize = 512;

/// Whether `head` looks binary (contains a NUL byte)
pub fn looks_binary(head: &[u8]) -> bool {
    head.iter().take(BINARY_SNIFF_BYTES).any(|b| *b == 0)
}

/// Binary classification cached per path and mtime
#[derive(Debug)]
pub struct BinaryClassifier {
    entries: Mutex<IndexMap<PathBuf, (bool, SystemTime)>>,
    capacity: usize,
}

impl BinaryClassifier {
    /// Create a classifier remembering at most `capacity` paths
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Classify `path`, whose current mtime is `mtime`. Unreadable files
    /// count as binary.
    pub async fn is_binary(&self, host: &dyn FsHost, path: &Path, mtime: SystemTime) -> bool {
        let cached = self.entries.lock().get(path).copied();
        if let Some((binary, seen)) = cached {
            if seen == mtime {
                return binary;
            }
        }

        let binary = match host.read_head(path, BINARY_SNIFF_BYTES).await {
            Ok(head) => looks_binary(&head),
            Err(e) => {
                debug!("Cannot sniff {}: {}", path.display(), e);
                true
            }
        };

        let mut entries = self.entries.lock();
        entries.shift_remove(path);
        entries.insert(path.to_path_buf(), (binary, mtime));
        while entries.len() > self.capacity {
            entries.shift_remove_index(0);
        }
        binary
    }

    /// Drop the entry for `path`
    pub fn invalidate(&self, path: &Path) {
        self.entries.lock().shift_remove(path);
    }

    /// Number of classified paths
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing has been classified
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
