//! Selection store
//!
//! The explicit set holds only checked paths and only the minimal frontier
//! of them: at rest no entry is an ancestor of another. Everything else
//! (implied-checked descendants, partial folders) is derived on read.

mod persist;
mod resolver;
mod toggle;

pub use persist::{JsonStateFile, MemoryPersistence, SelectionPersistence, STATE_KEY_SELECTED};
pub use resolver::{root_of, Resolver};
pub use toggle::{check_state, folder_coverage, toggle, Coverage};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::types::WorkspaceRoot;
use crate::utils::is_strict_descendant;

/// Explicitly checked paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionStore {
    explicit: BTreeSet<PathBuf>,
    revision: u64,
}

impl SelectionStore {
    /// Create an empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a selection from arbitrary paths, reduced to the minimal frontier
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut store = Self::new();
        store.replace(paths);
        store
    }

    /// Monotonic counter bumped by every mutation that changes the set
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self, changed: bool) -> bool {
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Whether `path` is explicitly checked
    pub fn contains(&self, path: &Path) -> bool {
        self.explicit.contains(path)
    }

    /// Add an explicit entry. Callers keep the set minimal.
    pub fn insert(&mut self, path: impl Into<PathBuf>) -> bool {
        let changed = self.explicit.insert(path.into());
        self.touch(changed)
    }

    /// Remove an explicit entry
    pub fn remove(&mut self, path: &Path) -> bool {
        let changed = self.explicit.remove(path);
        self.touch(changed)
    }

    /// Explicit or implied by an explicit ancestor
    pub fn is_effectively_checked(&self, path: &Path) -> bool {
        path.ancestors().any(|p| self.explicit.contains(p))
    }

    /// Explicit entries that are strict ancestors of `path`, nearest first
    pub fn explicit_ancestors(&self, path: &Path) -> Vec<PathBuf> {
        path.ancestors()
            .skip(1)
            .filter(|p| self.explicit.contains(*p))
            .map(Path::to_path_buf)
            .collect()
    }

    /// Explicit entries that are strict descendants of `path`
    pub fn explicit_descendants(&self, path: &Path) -> Vec<PathBuf> {
        self.explicit
            .range(path.to_path_buf()..)
            .take_while(|p| p.starts_with(path))
            .filter(|p| p.as_path() != path)
            .cloned()
            .collect()
    }

    /// Whether any strict descendant of `path` is explicit
    pub fn has_explicit_descendant(&self, path: &Path) -> bool {
        self.explicit
            .range(path.to_path_buf()..)
            .take_while(|p| p.starts_with(path))
            .any(|p| p.as_path() != path)
    }

    /// Remove every explicit strict descendant of `path`
    pub fn remove_descendants(&mut self, path: &Path) -> bool {
        let doomed = self.explicit_descendants(path);
        for p in &doomed {
            self.explicit.remove(p);
        }
        self.touch(!doomed.is_empty())
    }

    /// Remove `path` and everything below it (the path was deleted)
    pub fn forget(&mut self, path: &Path) -> bool {
        let removed = self.explicit.remove(path);
        let below = self.remove_descendants(path);
        self.touch(removed) || below
    }

    /// Remap `old` and its descendants under `new` (the path was renamed)
    pub fn rename(&mut self, old: &Path, new: &Path) -> bool {
        let moved: Vec<PathBuf> = self
            .explicit
            .range(old.to_path_buf()..)
            .take_while(|p| p.starts_with(old))
            .cloned()
            .collect();
        if moved.is_empty() {
            return false;
        }
        for p in moved {
            self.explicit.remove(&p);
            let remapped = match p.strip_prefix(old) {
                Ok(rest) if !rest.as_os_str().is_empty() => new.join(rest),
                _ => new.to_path_buf(),
            };
            self.explicit.insert(remapped);
        }
        self.normalize();
        self.touch(true)
    }

    /// Drop entries outside every root. Returns whether anything changed.
    pub fn prune_outside_roots(&mut self, roots: &[WorkspaceRoot]) -> bool {
        let before = self.explicit.len();
        self.explicit
            .retain(|p| roots.iter().any(|r| p.starts_with(&r.path)));
        let changed = self.explicit.len() != before;
        self.touch(changed)
    }

    /// Replace the whole set, reducing it to the minimal frontier
    pub fn replace<I, P>(&mut self, paths: I) -> bool
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut next = Self {
            explicit: paths.into_iter().map(Into::into).collect(),
            revision: self.revision,
        };
        next.normalize();
        let changed = next.explicit != self.explicit;
        self.explicit = next.explicit;
        self.touch(changed)
    }

    /// Remove every entry
    pub fn clear(&mut self) -> bool {
        let changed = !self.explicit.is_empty();
        self.explicit.clear();
        self.touch(changed)
    }

    /// Drop entries implied by an explicit ancestor
    fn normalize(&mut self) {
        let mut kept: Vec<PathBuf> = Vec::with_capacity(self.explicit.len());
        for p in &self.explicit {
            // Sorted order puts an ancestor right before its descendants
            if kept.last().map_or(true, |last| !p.starts_with(last)) {
                kept.push(p.clone());
            }
        }
        self.explicit = kept.into_iter().collect();
    }

    /// Whether no entry is an ancestor of another
    pub fn is_minimal(&self) -> bool {
        self.explicit
            .iter()
            .all(|p| !self.explicit.iter().any(|q| is_strict_descendant(p, q)))
    }

    /// Explicit entries in path order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.explicit.iter().cloned().collect()
    }

    /// Iterate over explicit entries in path order
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.explicit.iter()
    }

    /// Number of explicit entries
    pub fn len(&self) -> usize {
        self.explicit.len()
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.explicit.is_empty()
    }
}
