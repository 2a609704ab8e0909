/*!
 * File collector
 *
 * Expands one selected path into the concrete, non-ignored files below it.
 * Children of a directory are expanded concurrently; a semaphore bounds the
 * outstanding `stat`/`read_directory` calls, never the recursion itself.
 */

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::host::FsHost;
use crate::ignore_rules::IgnoreRules;
use crate::tree::KindCache;
use crate::types::EntryKind;
use crate::utils::relative_slash_path;

/// Default traversal concurrency
pub const DEFAULT_TRAVERSAL_CONCURRENCY: usize = 24;

/// Default cap on files collected per root in one run
pub const DEFAULT_MAX_FILES: usize = 10_000;

/// Nesting depth past which a branch is abandoned (symlink cycles)
pub const MAX_DEPTH: usize = 128;

/// File cap shared by every traversal of one collection run
#[derive(Debug)]
pub struct TraversalCounter {
    max: usize,
    count: AtomicUsize,
    warned: AtomicBool,
}

impl TraversalCounter {
    /// Create a counter admitting at most `max` files
    pub fn new(max: usize) -> Self {
        Self {
            max,
            count: AtomicUsize::new(0),
            warned: AtomicBool::new(false),
        }
    }

    /// Claim a slot for one file. Returns false once the cap is reached,
    /// logging a warning the first time.
    pub fn try_claim(&self) -> bool {
        let claimed = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max).then_some(n + 1)
            })
            .is_ok();
        if !claimed {
            self.warn_once();
        }
        claimed
    }

    fn warn_once(&self) {
        if !self.warned.swap(true, Ordering::SeqCst) {
            warn!(
                "File limit of {} reached, remaining files are skipped",
                self.max
            );
        }
    }

    /// Files admitted so far
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Whether no slot is left
    pub fn is_full(&self) -> bool {
        self.count() >= self.max
    }

    /// Whether the cap was hit
    pub fn exhausted(&self) -> bool {
        self.warned.load(Ordering::SeqCst)
    }
}

/// Whether a path must be skipped because the cap is already reached
fn is_full(counter: Option<&TraversalCounter>) -> bool {
    match counter {
        Some(counter) if counter.is_full() => {
            counter.warn_once();
            true
        }
        _ => false,
    }
}

/// Bounded, cancellable recursive file collector
#[derive(Clone)]
pub struct Collector {
    host: Arc<dyn FsHost>,
    permits: Arc<Semaphore>,
    kinds: Arc<KindCache>,
}

impl Collector {
    /// Create a collector allowing `concurrency` outstanding filesystem calls
    pub fn new(host: Arc<dyn FsHost>, kinds: Arc<KindCache>, concurrency: usize) -> Self {
        Self {
            host,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            kinds,
        }
    }

    /// Collect the files at or below `path`.
    ///
    /// `root` is the workspace root `rules` are relative to. Without a
    /// `counter` the run is uncapped; once the counter is full no further
    /// path is stat-ed or listed. A cancelled run returns whatever it had
    /// gathered.
    pub async fn collect(
        &self,
        path: &Path,
        rules: &IgnoreRules,
        root: &Path,
        cancel: &CancellationToken,
        counter: Option<&TraversalCounter>,
    ) -> Vec<PathBuf> {
        self.walk(path.to_path_buf(), rules, root, cancel, counter, 0)
            .await
    }

    fn walk<'a>(
        &'a self,
        path: PathBuf,
        rules: &'a IgnoreRules,
        root: &'a Path,
        cancel: &'a CancellationToken,
        counter: Option<&'a TraversalCounter>,
        depth: usize,
    ) -> BoxFuture<'a, Vec<PathBuf>> {
        async move {
            if cancel.is_cancelled() || is_full(counter) {
                return Vec::new();
            }
            if depth > MAX_DEPTH {
                warn!("Maximum depth reached at {}", path.display());
                return Vec::new();
            }
            let Some(rel) = relative_slash_path(root, &path) else {
                debug!("{} is outside {}", path.display(), root.display());
                return Vec::new();
            };

            let kind = match self.kinds.get(&path) {
                Some(kind) => kind,
                None => {
                    let stat = {
                        let Ok(_permit) = self.permits.acquire().await else {
                            return Vec::new();
                        };
                        self.host.stat(&path).await
                    };
                    match stat {
                        Ok(stat) => {
                            self.kinds.record(&path, stat.kind);
                            stat.kind
                        }
                        Err(e) => {
                            debug!("Skipping {}: {}", path.display(), e);
                            return Vec::new();
                        }
                    }
                }
            };

            match kind {
                EntryKind::File => {
                    if rules.ignores(&rel) {
                        return Vec::new();
                    }
                    if counter.map_or(true, |c| c.try_claim()) {
                        vec![path]
                    } else {
                        Vec::new()
                    }
                }
                EntryKind::Directory => {
                    if !rel.is_empty() && rules.ignores(&format!("{}/", rel)) {
                        return Vec::new();
                    }
                    if cancel.is_cancelled() || is_full(counter) {
                        return Vec::new();
                    }
                    let listing = {
                        let Ok(_permit) = self.permits.acquire().await else {
                            return Vec::new();
                        };
                        // The cap may have filled while queued for the permit
                        if cancel.is_cancelled() || is_full(counter) {
                            return Vec::new();
                        }
                        self.host.read_directory(&path).await
                    };
                    let listing = match listing {
                        Ok(listing) => listing,
                        Err(e) => {
                            debug!("Cannot list {}: {}", path.display(), e);
                            return Vec::new();
                        }
                    };
                    if cancel.is_cancelled() || is_full(counter) {
                        return Vec::new();
                    }

                    let children = listing.into_iter().map(|entry| {
                        let child = path.join(&entry.name);
                        self.kinds.record(&child, entry.kind);
                        self.walk(child, rules, root, cancel, counter, depth + 1)
                    });
                    join_all(children).await.into_iter().flatten().collect()
                }
                EntryKind::Unknown => Vec::new(),
            }
        }
        .boxed()
    }
}
