/*!
 * Session context
 *
 * Owns the caches, the selection store and the persistence backend for one
 * workspace and threads them into the collector, the counter and the export
 * writer. Every selection mutation is persisted before it returns.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collector::Collector;
use crate::config::Config;
use crate::debounce::Debouncer;
use crate::error::Result;
use crate::host::{FsHost, LocalFs};
use crate::ignore_rules::IgnoreProvider;
use crate::refresh::{LogStatus, RefreshController, RefreshOutcome, RefreshPipeline, StatusSink};
use crate::report::{FileTokens, SelectionReport};
use crate::selection::{
    self, root_of, JsonStateFile, Resolver, SelectionPersistence, SelectionStore,
};
use crate::tokenizer::{
    create_tokenizer, BinaryClassifier, CacheStats, TokenCache, TokenCounter, Tokenizer,
};
use crate::tree::{KindCache, Tree, TreeSource};
use crate::types::{CheckState, EntryKind, FsEvent, WorkspaceRoot};
use crate::utils::{is_watcher_noise, normalize_path, relative_slash_path};
use crate::writer::XmlWriter;

/// Outcome of replacing the selection with an external candidate list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Candidates kept (before reduction to the minimal frontier)
    pub added: usize,
    /// Candidates that do not exist
    pub missing: usize,
    /// Candidates outside every workspace root
    pub outside: usize,
}

/// Result of an export
#[derive(Debug, Clone)]
pub struct Export {
    /// The `<code_files>` document
    pub xml: String,
    /// Files included
    pub files: usize,
    /// Tokens across those files
    pub tokens: usize,
    /// Per-file counts behind `tokens`
    pub report: SelectionReport,
}

/// One row of a tree listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeItem {
    /// Absolute path
    pub path: PathBuf,
    /// Entry kind
    pub kind: EntryKind,
    /// Derived checkbox state
    pub state: CheckState,
}

/// Builder for [`Session`]
pub struct SessionBuilder {
    config: Config,
    host: Option<Arc<dyn FsHost>>,
    persistence: Option<Arc<dyn SelectionPersistence>>,
    sink: Option<Arc<dyn StatusSink>>,
    tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl SessionBuilder {
    /// Start from `config`
    pub fn new(config: Config) -> Self {
        Self {
            config,
            host: None,
            persistence: None,
            sink: None,
            tokenizer: None,
        }
    }

    /// Filesystem host (defaults to the local filesystem)
    pub fn host(mut self, host: Arc<dyn FsHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Selection persistence (defaults to the configured state file)
    pub fn persistence(mut self, persistence: Arc<dyn SelectionPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Status sink (defaults to logging)
    pub fn sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Tokenizer (defaults to the configured BPE encoding)
    pub fn tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Load the persisted selection and assemble the session
    pub fn build(self) -> Result<Session> {
        let config = self.config;
        let host: Arc<dyn FsHost> = self.host.unwrap_or_else(|| Arc::new(LocalFs::new()));
        let persistence: Arc<dyn SelectionPersistence> = self
            .persistence
            .unwrap_or_else(|| Arc::new(JsonStateFile::new(config.state_file.clone())));
        let sink: Arc<dyn StatusSink> = self.sink.unwrap_or_else(|| Arc::new(LogStatus));
        let tokenizer = match self.tokenizer {
            Some(tokenizer) => tokenizer,
            None => create_tokenizer(config.encoding)?,
        };

        let roots: Vec<WorkspaceRoot> = config
            .roots
            .iter()
            .map(|r| WorkspaceRoot::new(normalize_path(r)))
            .collect();

        let kinds = Arc::new(KindCache::new());
        let ignores = Arc::new(IgnoreProvider::new(
            host.clone(),
            config.ignore_file_name.clone(),
        ));
        let collector = Collector::new(host.clone(), kinds.clone(), config.traversal_concurrency);
        let resolver = Resolver::new(collector, ignores.clone(), config.max_collected_files);
        let binary = Arc::new(BinaryClassifier::new(config.binary_cache_capacity));
        let counter = TokenCounter::new(
            host.clone(),
            tokenizer,
            Arc::new(TokenCache::new(config.token_cache_capacity)),
            binary.clone(),
            config.token_concurrency,
            config.max_preview_bytes,
        );
        let writer = XmlWriter::new(host.clone(), binary, config.max_preview_bytes);

        let loaded = persistence.load()?;
        let mut store = SelectionStore::from_paths(loaded.iter().map(|p| normalize_path(p)));
        let pruned = store.prune_outside_roots(&roots);
        if pruned || store.len() != loaded.len() {
            persistence.save(&store.paths())?;
        }
        debug!(
            "Session over {} roots with {} selections",
            roots.len(),
            store.len()
        );

        Ok(Session {
            tree: Tree::new(host.clone(), kinds.clone()),
            host,
            roots: RwLock::new(roots),
            kinds,
            ignores,
            resolver,
            counter,
            writer,
            selection: Mutex::new(store),
            persistence,
            refresh: RefreshController::new(sink),
            config,
        })
    }
}

/// Selection engine for one workspace
pub struct Session {
    pub(crate) config: Config,
    pub(crate) host: Arc<dyn FsHost>,
    roots: RwLock<Vec<WorkspaceRoot>>,
    kinds: Arc<KindCache>,
    tree: Tree,
    ignores: Arc<IgnoreProvider>,
    resolver: Resolver,
    counter: TokenCounter,
    writer: XmlWriter,
    pub(crate) selection: Mutex<SelectionStore>,
    persistence: Arc<dyn SelectionPersistence>,
    refresh: RefreshController,
}

impl Session {
    /// Builder starting from `config`
    pub fn builder(config: Config) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current workspace roots
    pub fn roots(&self) -> Vec<WorkspaceRoot> {
        self.roots.read().clone()
    }

    /// Root containing `path`, or an error when it is outside the workspace
    pub fn root_for(&self, path: &Path) -> Result<WorkspaceRoot> {
        let roots = self.roots.read();
        match root_of(&roots, path) {
            Some(root) => Ok(root.clone()),
            None => crate::bail!(
                InvalidArgument,
                "{} is outside every workspace root",
                path.display()
            ),
        }
    }

    pub(crate) fn persist(&self, store: &SelectionStore) -> Result<()> {
        self.persistence.save(&store.paths())
    }

    /// Explicit selection in path order
    pub async fn selected_paths(&self) -> Vec<PathBuf> {
        self.selection.lock().await.paths()
    }

    /// Check or uncheck `path`. Returns whether the explicit set changed.
    pub async fn toggle(&self, path: &Path, checked: bool) -> Result<bool> {
        crate::ensure!(
            path.is_absolute(),
            InvalidArgument,
            "expected an absolute path, got {}",
            path.display()
        );
        let path = normalize_path(path);
        let root = self.root_for(&path)?;

        let mut store = self.selection.lock().await;
        let changed = selection::toggle(
            &mut store,
            &self.tree,
            &root.path,
            &path,
            checked,
            self.config.collapse_complete_folders,
        )
        .await;
        if changed {
            self.persist(&store)?;
        }
        Ok(changed)
    }

    /// Uncheck everything
    pub async fn clear(&self) -> Result<bool> {
        let mut store = self.selection.lock().await;
        let changed = store.clear();
        if changed {
            self.persist(&store)?;
        }
        Ok(changed)
    }

    /// Replace the selection with the candidates that exist inside the
    /// workspace
    pub async fn seed(&self, candidates: &[PathBuf]) -> Result<SeedReport> {
        let roots = self.roots();
        let mut report = SeedReport::default();
        let mut kept = Vec::new();

        for candidate in candidates {
            let path = normalize_path(candidate);
            if root_of(&roots, &path).is_none() {
                report.outside += 1;
                continue;
            }
            if self.host.stat(&path).await.is_err() {
                report.missing += 1;
                continue;
            }
            kept.push(path);
        }
        report.added = kept.len();

        let mut store = self.selection.lock().await;
        if store.replace(kept) {
            self.persist(&store)?;
        }
        info!(
            "Seeded selection: {} added, {} missing, {} outside",
            report.added, report.missing, report.outside
        );
        Ok(report)
    }

    /// Changed files of the repositories containing the roots
    pub async fn git_changes(&self) -> Result<Vec<PathBuf>> {
        let mut changed = Vec::new();
        for root in self.roots() {
            let path = root.path.clone();
            let listed = tokio::task::spawn_blocking(move || crate::git::changed_paths(&path))
                .await
                .map_err(|e| crate::error!(Unexpected, "git task failed: {}", e))?;
            match listed {
                Ok(paths) => changed.extend(paths),
                Err(e) => warn!("No git changes for {}: {}", root.path.display(), e),
            }
        }
        changed.sort();
        changed.dedup();
        Ok(changed)
    }

    /// Replace the selection with the files changed in git
    pub async fn seed_from_git(&self) -> Result<SeedReport> {
        let changed = self.git_changes().await?;
        self.seed(&changed).await
    }

    /// Apply a watcher event. Returns whether a refresh should follow.
    pub async fn handle_fs_event(&self, event: &FsEvent) -> Result<bool> {
        let path = normalize_path(event.path());
        let root = root_of(&self.roots.read(), &path).cloned();
        let Some(root) = root else {
            return Ok(false);
        };
        let rel = path.strip_prefix(&root.path).unwrap_or(&path);
        if is_watcher_noise(rel) {
            return Ok(false);
        }

        self.kinds.invalidate(event);
        if path.parent() == Some(root.path.as_path())
            && path.file_name() == Some(std::ffi::OsStr::new(self.ignores.file_name()))
        {
            debug!("Ignore rules changed in {}", root.path.display());
            self.ignores.invalidate(&root.path);
        }

        match event {
            FsEvent::Deleted(_) => {
                self.forget_cached(&path);
                let mut store = self.selection.lock().await;
                if store.forget(&path) {
                    debug!("Forgot selections under deleted {}", path.display());
                    self.persist(&store)?;
                }
            }
            FsEvent::Changed(_) => self.counter.invalidate(&path),
            FsEvent::Created(_) => {}
        }
        Ok(true)
    }

    /// Replace the workspace roots, dropping selections outside them.
    /// Returns whether the selection changed.
    pub async fn set_roots(&self, roots: Vec<PathBuf>) -> Result<bool> {
        let roots: Vec<WorkspaceRoot> = roots
            .iter()
            .map(|r| WorkspaceRoot::new(normalize_path(r)))
            .collect();
        *self.roots.write() = roots.clone();
        for root in &roots {
            self.ignores.invalidate(&root.path);
        }

        let mut store = self.selection.lock().await;
        let changed = store.prune_outside_roots(&roots);
        if changed {
            self.persist(&store)?;
        }
        Ok(changed)
    }

    /// Workspace folders changed: prune, then schedule a refresh
    pub async fn workspace_folders_changed(
        &self,
        roots: Vec<PathBuf>,
        debouncer: &Debouncer,
    ) -> Result<bool> {
        let changed = self.set_roots(roots).await?;
        debouncer.trigger();
        Ok(changed)
    }

    /// Remap selections after `old` was renamed to `new` outside the session
    pub async fn handle_rename(&self, old: &Path, new: &Path) -> Result<bool> {
        let old = normalize_path(old);
        let new = normalize_path(new);
        self.forget_cached(&old);

        let mut store = self.selection.lock().await;
        let changed = store.rename(&old, &new);
        if changed {
            self.persist(&store)?;
        }
        Ok(changed)
    }

    /// Derived checkbox state of `path`
    pub async fn check_state(&self, path: &Path) -> CheckState {
        let path = normalize_path(path);
        let store = self.selection.lock().await;
        selection::check_state(&store, &self.tree, &path).await
    }

    /// Children of `dir` with their checkbox states
    pub async fn children(&self, dir: &Path) -> Vec<TreeItem> {
        let dir = normalize_path(dir);
        let entries = self.tree.entries(&dir).await;
        let store = self.selection.lock().await;
        let mut items = Vec::with_capacity(entries.len());
        for (path, kind) in entries {
            let state = selection::check_state(&store, &self.tree, &path).await;
            items.push(TreeItem { path, kind, state });
        }
        items
    }

    /// Files covered by the selection
    pub async fn resolve(&self, cancel: &CancellationToken) -> Vec<PathBuf> {
        let selections = self.selected_paths().await;
        let roots = self.roots();
        self.resolver.resolve(&selections, &roots, cancel).await
    }

    /// Token total across `files`
    pub async fn count(&self, files: &[PathBuf], cancel: &CancellationToken) -> usize {
        self.counter.count_tokens(files, cancel).await
    }

    /// Token cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.counter.cache_stats()
    }

    /// Resolve and count, with per-file counts
    pub async fn report(&self, cancel: &CancellationToken) -> SelectionReport {
        let started = Instant::now();
        let files = self.resolve(cancel).await;
        let mut report = self.report_for(&files, cancel).await;
        report.duration = started.elapsed();
        report
    }

    /// Per-file counts over an already resolved file list
    pub async fn report_for(&self, files: &[PathBuf], cancel: &CancellationToken) -> SelectionReport {
        let started = Instant::now();
        let selections = self.selection.lock().await.len();
        let roots = self.roots();

        let counts =
            futures::future::join_all(files.iter().map(|f| self.counter.count_file(f, cancel))).await;
        let file_tokens: Vec<FileTokens> = files
            .iter()
            .zip(counts)
            .map(|(path, tokens)| FileTokens {
                path: root_of(&roots, path)
                    .and_then(|r| relative_slash_path(&r.path, path))
                    .unwrap_or_else(|| path.to_string_lossy().to_string()),
                tokens,
            })
            .collect();

        SelectionReport {
            output: None,
            duration: started.elapsed(),
            selections,
            files: files.len(),
            tokens: if cancel.is_cancelled() {
                0
            } else {
                file_tokens.iter().map(|f| f.tokens).sum()
            },
            cache: self.cache_stats(),
            file_tokens,
        }
    }

    /// Resolve the selection once, render it as XML and report on the same
    /// file list
    pub async fn export(&self, cancel: &CancellationToken) -> Result<Export> {
        let started = Instant::now();
        let files = self.resolve(cancel).await;
        let roots = self.roots();
        let xml = self.writer.render(&files, &roots).await?;
        let mut report = self.report_for(&files, cancel).await;
        report.duration = started.elapsed();
        Ok(Export {
            xml,
            files: files.len(),
            tokens: report.tokens,
            report,
        })
    }

    /// Run one sequenced refresh, reporting to the status sink
    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresh.refresh(self).await
    }

    /// Debouncer starting [`Session::refresh`] after the configured quiet
    /// window. Each run is spawned, so a later burst supersedes a run still
    /// in flight.
    pub fn debounced_refresh(self: &Arc<Self>) -> Debouncer {
        let session = Arc::downgrade(self);
        Debouncer::new(self.config.debounce, move || {
            let session = session.clone();
            async move {
                if let Some(session) = session.upgrade() {
                    tokio::spawn(async move {
                        session.refresh().await;
                    });
                }
            }
        })
    }

    /// Kind of `path`, from the kind cache or a stat
    pub async fn kind(&self, path: &Path) -> EntryKind {
        self.tree.kind(path).await
    }

    /// Drop cached kinds and counts at or below `path`
    pub(crate) fn forget_cached(&self, path: &Path) {
        self.kinds.invalidate(&FsEvent::Deleted(path.to_path_buf()));
        self.kinds.forget_subtree(path);
        self.counter.invalidate(path);
    }
}

#[async_trait]
impl RefreshPipeline for Session {
    async fn has_workspace(&self) -> bool {
        !self.roots.read().is_empty()
    }

    async fn resolve(&self, cancel: &CancellationToken) -> Vec<PathBuf> {
        Session::resolve(self, cancel).await
    }

    async fn count_tokens(&self, files: &[PathBuf], cancel: &CancellationToken) -> usize {
        self.count(files, cancel).await
    }
}
