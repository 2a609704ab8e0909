//! Tokenizer module for token counting
//!
//! Turns a resolved file list into a token total. Each file goes through
//! stat, the preview ceiling, the count cache, binary detection and finally
//! a BPE pass, under a concurrency limit and with cooperative cancellation.

mod binary;
mod bpe;
mod cache;
mod encoding;
mod error;

// Re-exports for public API
pub use binary::{looks_binary, BinaryClassifier, BINARY_SNIFF_BYTES};
pub use bpe::BpeTokenizer;
pub use cache::{CacheStats, TokenCache, DEFAULT_CACHE_CAPACITY};
pub use encoding::Encoding;
pub use error::{TokenizerError, TokenizerResult};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::host::FsHost;
use crate::types::EntryKind;

/// Default token counting concurrency
pub const DEFAULT_TOKEN_CONCURRENCY: usize = 8;

/// Files larger than this many bytes are not previewed or counted
pub const DEFAULT_MAX_PREVIEW_BYTES: u64 = 200_000;

/// Trait defining the interface for tokenizers
pub trait Tokenizer: Send + Sync {
    /// Count tokens in the given text
    fn count(&self, text: &str) -> usize;
}

/// Create a tokenizer for the specified encoding
pub fn create_tokenizer(encoding: Encoding) -> TokenizerResult<Arc<dyn Tokenizer>> {
    Ok(Arc::new(BpeTokenizer::new(encoding)?))
}

/// Cache-aware, bounded, cancellable token counter
#[derive(Clone)]
pub struct TokenCounter {
    host: Arc<dyn FsHost>,
    tokenizer: Arc<dyn Tokenizer>,
    cache: Arc<TokenCache>,
    binary: Arc<BinaryClassifier>,
    permits: Arc<Semaphore>,
    max_preview_bytes: u64,
}

impl TokenCounter {
    /// Create a counter over `host`
    pub fn new(
        host: Arc<dyn FsHost>,
        tokenizer: Arc<dyn Tokenizer>,
        cache: Arc<TokenCache>,
        binary: Arc<BinaryClassifier>,
        concurrency: usize,
        max_preview_bytes: u64,
    ) -> Self {
        Self {
            host,
            tokenizer,
            cache,
            binary,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            max_preview_bytes,
        }
    }

    /// Total tokens across `paths`. Returns 0 if `cancel` fires before the
    /// pass completes.
    pub async fn count_tokens(&self, paths: &[PathBuf], cancel: &CancellationToken) -> usize {
        let counts = join_all(paths.iter().map(|p| self.count_file(p, cancel))).await;
        if cancel.is_cancelled() {
            debug!("Token count over {} files cancelled", paths.len());
            return 0;
        }
        counts.into_iter().sum()
    }

    /// Tokens in one file; 0 for anything that is not a readable text file
    /// under the preview ceiling
    pub async fn count_file(&self, path: &Path, cancel: &CancellationToken) -> usize {
        if cancel.is_cancelled() {
            return 0;
        }
        let Ok(_permit) = self.permits.acquire().await else {
            return 0;
        };
        if cancel.is_cancelled() {
            return 0;
        }

        let stat = match self.host.stat(path).await {
            Ok(stat) if stat.kind == EntryKind::File => stat,
            Ok(_) => return 0,
            Err(e) => {
                debug!("Cannot stat {}: {}", path.display(), e);
                return 0;
            }
        };
        if stat.size > self.max_preview_bytes {
            return 0;
        }
        if let Some(tokens) = self.cache.get(path, stat.mtime, stat.size) {
            return tokens;
        }

        if cancel.is_cancelled() {
            return 0;
        }
        if self
            .binary
            .is_binary(self.host.as_ref(), path, stat.mtime)
            .await
        {
            return 0;
        }

        if cancel.is_cancelled() {
            return 0;
        }
        let bytes = match self.host.read_file(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Cannot read {}: {}", path.display(), e);
                return 0;
            }
        };
        if cancel.is_cancelled() {
            return 0;
        }

        let text = String::from_utf8_lossy(&bytes).into_owned();
        let tokenizer = self.tokenizer.clone();
        let tokens = match tokio::task::spawn_blocking(move || tokenizer.count(&text)).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("{}", TokenizerError::TaskFailed(e.to_string()));
                return 0;
            }
        };
        self.cache.insert(path, tokens, stat.mtime, stat.size);

        if cancel.is_cancelled() {
            return 0;
        }
        tokens
    }

    /// Forget cached results for `path`
    pub fn invalidate(&self, path: &Path) {
        self.cache.invalidate(path);
        self.binary.invalidate(path);
    }

    /// Count cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
