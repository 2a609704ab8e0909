/*!
 * Refresh controller
 *
 * Sequences one resolve-then-count recomputation per request. Each request
 * takes a new sequence number and cancels the token of the request before
 * it; a run whose number is no longer the latest drops its result instead
 * of reporting it.
 */

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// The two phases a refresh sequences
#[async_trait]
pub trait RefreshPipeline: Send + Sync {
    /// Whether any workspace root is configured
    async fn has_workspace(&self) -> bool;

    /// Expand the current selection into files
    async fn resolve(&self, cancel: &CancellationToken) -> Vec<PathBuf>;

    /// Count tokens across `files`
    async fn count_tokens(&self, files: &[PathBuf], cancel: &CancellationToken) -> usize;
}

/// Receiver of refresh progress (a status bar, a spinner, a log line)
pub trait StatusSink: Send + Sync {
    /// A recomputation started
    fn set_calculating(&self);

    /// Fresh counts are available
    fn update_counts(&self, files: usize, tokens: usize);

    /// No workspace is open
    fn set_no_workspace(&self);
}

/// Status sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn set_calculating(&self) {
        debug!("Calculating");
    }

    fn update_counts(&self, files: usize, tokens: usize) {
        info!("{}", crate::utils::format_status(files, tokens));
    }

    fn set_no_workspace(&self) {
        info!("No workspace");
    }
}

/// What became of one refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Counts were reported to the sink
    Applied {
        /// Files resolved
        files: usize,
        /// Tokens counted
        tokens: usize,
    },
    /// A newer request started first; nothing was reported
    Superseded,
    /// No workspace root is configured
    NoWorkspace,
}

/// Sequencer for resolve/count runs
pub struct RefreshController {
    seq: AtomicU64,
    active: Mutex<Option<CancellationToken>>,
    sink: Arc<dyn StatusSink>,
}

impl RefreshController {
    /// Create a controller reporting to `sink`
    pub fn new(sink: Arc<dyn StatusSink>) -> Self {
        Self {
            seq: AtomicU64::new(0),
            active: Mutex::new(None),
            sink,
        }
    }

    /// Latest sequence number issued
    pub fn current(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    fn is_current(&self, seq: u64) -> bool {
        self.current() == seq
    }

    /// Cancel the in-flight run, if any
    pub fn cancel(&self) {
        if let Some(token) = self.active.lock().take() {
            token.cancel();
        }
    }

    /// Run one resolve/count pass, superseding any run in flight
    pub async fn refresh(&self, pipeline: &dyn RefreshPipeline) -> RefreshOutcome {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let previous = self.active.lock().replace(cancel.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        let started = Instant::now();

        if !pipeline.has_workspace().await {
            if !self.is_current(seq) {
                return RefreshOutcome::Superseded;
            }
            self.sink.set_no_workspace();
            return RefreshOutcome::NoWorkspace;
        }

        self.sink.set_calculating();
        let files = pipeline.resolve(&cancel).await;
        if !self.is_current(seq) {
            debug!("Refresh #{} superseded after resolve", seq);
            return RefreshOutcome::Superseded;
        }

        let tokens = pipeline.count_tokens(&files, &cancel).await;
        if !self.is_current(seq) {
            debug!("Refresh #{} superseded after count", seq);
            return RefreshOutcome::Superseded;
        }

        self.sink.update_counts(files.len(), tokens);
        debug!(
            "Refresh #{}: {} files, {} tokens in {:?}",
            seq,
            files.len(),
            tokens,
            started.elapsed()
        );
        RefreshOutcome::Applied {
            files: files.len(),
            tokens,
        }
    }
}
