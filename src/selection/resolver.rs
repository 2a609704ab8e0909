//! Selection resolver
//!
//! Expands the explicit selection into the ordered, de-duplicated list of
//! files it covers. Selections are grouped by workspace root so each root
//! gets its own ignore rules and its own file cap.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use indexmap::IndexSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collector::{Collector, TraversalCounter};
use crate::ignore_rules::IgnoreProvider;
use crate::types::WorkspaceRoot;

/// Deepest root containing `path`
pub fn root_of<'a>(roots: &'a [WorkspaceRoot], path: &Path) -> Option<&'a WorkspaceRoot> {
    roots
        .iter()
        .filter(|r| path.starts_with(&r.path))
        .max_by_key(|r| r.path.components().count())
}

/// Turns selections into concrete files
#[derive(Clone)]
pub struct Resolver {
    collector: Collector,
    ignores: Arc<IgnoreProvider>,
    max_files: usize,
}

impl Resolver {
    /// Create a resolver capping each root at `max_files`
    pub fn new(collector: Collector, ignores: Arc<IgnoreProvider>, max_files: usize) -> Self {
        Self {
            collector,
            ignores,
            max_files,
        }
    }

    /// Files covered by `selections`, grouped by root in root order
    pub async fn resolve(
        &self,
        selections: &[PathBuf],
        roots: &[WorkspaceRoot],
        cancel: &CancellationToken,
    ) -> Vec<PathBuf> {
        let started = Instant::now();
        let mut groups: Vec<(&WorkspaceRoot, Vec<&PathBuf>)> =
            roots.iter().map(|r| (r, Vec::new())).collect();
        for selection in selections {
            match root_of(roots, selection) {
                Some(root) => {
                    if let Some((_, group)) = groups.iter_mut().find(|(r, _)| *r == root) {
                        group.push(selection);
                    }
                }
                None => warn!("{} is outside every workspace root", selection.display()),
            }
        }

        let mut files: IndexSet<PathBuf> = IndexSet::new();
        for (root, group) in groups {
            if group.is_empty() || cancel.is_cancelled() {
                continue;
            }
            let rules = self.ignores.get(&root.path).await;
            let counter = TraversalCounter::new(self.max_files);

            let runs = group.iter().map(|selection| {
                let rules = rules.clone();
                let counter = &counter;
                async move {
                    let t = Instant::now();
                    let found = self
                        .collector
                        .collect(selection, &rules, &root.path, cancel, Some(counter))
                        .await;
                    debug!(
                        "Collected {} files from {} in {:?}",
                        found.len(),
                        selection.display(),
                        t.elapsed()
                    );
                    found
                }
            });
            for found in join_all(runs).await {
                files.extend(found);
            }
        }

        info!(
            "Resolved {} selections into {} files in {:?}",
            selections.len(),
            files.len(),
            started.elapsed()
        );
        files.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryFs;
    use crate::tree::KindCache;

    fn resolver(fs: Arc<MemoryFs>, max_files: usize) -> Resolver {
        let kinds = Arc::new(KindCache::new());
        let collector = Collector::new(fs.clone(), kinds, 8);
        let ignores = Arc::new(IgnoreProvider::new(fs, ".gitignore"));
        Resolver::new(collector, ignores, max_files)
    }

    #[tokio::test]
    async fn test_overlapping_selections_are_deduplicated() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file("/p/a/x.txt", "x");
        fs.add_file("/p/a/y.txt", "y");
        let roots = vec![WorkspaceRoot::new("/p")];

        let files = resolver(fs, 100)
            .resolve(
                &[PathBuf::from("/p/a"), PathBuf::from("/p/a/x.txt")],
                &roots,
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_each_root_has_its_own_rules_and_cap() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file("/p/.gitignore", "*.log\n");
        fs.add_file("/p/app.log", "log");
        fs.add_file("/p/one.txt", "1");
        fs.add_file("/p/two.txt", "2");
        fs.add_file("/q/app.log", "log");
        fs.add_file("/q/three.txt", "3");
        let roots = vec![WorkspaceRoot::new("/p"), WorkspaceRoot::new("/q")];

        let files = resolver(fs, 2)
            .resolve(
                &[PathBuf::from("/p"), PathBuf::from("/q")],
                &roots,
                &CancellationToken::new(),
            )
            .await;
        // /p: .gitignore, one.txt, two.txt minus the cap; /q: both files
        assert_eq!(files.iter().filter(|f| f.starts_with("/p")).count(), 2);
        assert!(!files.contains(&PathBuf::from("/p/app.log")));
        assert!(files.contains(&PathBuf::from("/q/app.log")));
        assert!(files.contains(&PathBuf::from("/q/three.txt")));
    }

    #[test]
    fn test_root_of_prefers_deepest() {
        let roots = vec![WorkspaceRoot::new("/p"), WorkspaceRoot::new("/p/inner")];
        assert_eq!(
            root_of(&roots, Path::new("/p/inner/x")).map(|r| r.path.clone()),
            Some(PathBuf::from("/p/inner"))
        );
        assert_eq!(
            root_of(&roots, Path::new("/p/x")).map(|r| r.path.clone()),
            Some(PathBuf::from("/p"))
        );
        assert!(root_of(&roots, Path::new("/q")).is_none());
    }
}
