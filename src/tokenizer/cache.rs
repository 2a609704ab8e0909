//! Token count cache
//!
//! Entries are keyed by path and only valid while the file's mtime and size
//! match the ones recorded at counting time. Past capacity the oldest
//! inserted entry is evicted first.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use indexmap::IndexMap;
use parking_lot::Mutex;

/// Default number of cached entries
pub const DEFAULT_CACHE_CAPACITY: usize = 5000;

/// Cache entry with token count and the stat it was computed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TokenCacheEntry {
    tokens: usize,
    mtime: SystemTime,
    size: u64,
}

/// Statistics for token cache
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: usize,
    /// Number of cache misses
    pub misses: usize,
    /// Entries currently held
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded token count cache
#[derive(Debug)]
pub struct TokenCache {
    entries: Mutex<IndexMap<PathBuf, TokenCacheEntry>>,
    capacity: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl TokenCache {
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Cached count for `path` if it was computed for this exact mtime and size
    pub fn get(&self, path: &Path, mtime: SystemTime, size: u64) -> Option<usize> {
        let result = self
            .entries
            .lock()
            .get(path)
            .filter(|e| e.mtime == mtime && e.size == size)
            .map(|e| e.tokens);

        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Store a count, evicting the oldest entries past capacity
    pub fn insert(&self, path: &Path, tokens: usize, mtime: SystemTime, size: u64) {
        let mut entries = self.entries.lock();
        // Re-inserting moves the entry to the young end
        entries.shift_remove(path);
        entries.insert(
            path.to_path_buf(),
            TokenCacheEntry {
                tokens,
                mtime,
                size,
            },
        );
        while entries.len() > self.capacity {
            entries.shift_remove_index(0);
        }
    }

    /// Drop the entry for `path`
    pub fn invalidate(&self, path: &Path) {
        self.entries.lock().shift_remove(path);
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
