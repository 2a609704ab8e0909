//! Errors surfaced by ctxcraft
//!
//! Resolution and counting never fail: unreadable paths count as absent and
//! unreadable files as zero tokens. Errors come only from configuration,
//! the state file, git seeding and delete/rename.

use std::io;
use thiserror::Error;

use crate::tokenizer::TokenizerError;

/// Crate-wide error
#[derive(Error, Debug)]
pub enum CraftError {
    /// Repository discovery or status listing failed
    #[error("git: {0}")]
    Git(#[from] git2::Error),

    /// The BPE encoding could not be loaded
    #[error("tokenizer: {0}")]
    Tokenizer(#[from] TokenizerError),

    /// Filesystem access outside the tolerant read paths
    #[error("i/o: {0}")]
    Io(#[from] io::Error),

    /// Rejected configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Malformed selection state file
    #[error("state file: {0}")]
    Json(#[from] serde_json::Error),

    /// Delete or rename refused by the host; the selection is unchanged
    #[error("operation failed: {0}")]
    Operation(String),

    /// A required path does not exist
    #[error("no such path: {0}")]
    PathNotFound(String),

    /// Caller passed a path or value the session cannot act on
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An error wrapped with what was being attempted
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Background task failure and similar
    #[error("unexpected: {0}")]
    Unexpected(String),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, CraftError>;

/// Build a `CraftError` variant from a format string
#[macro_export]
macro_rules! error {
    ($kind:ident, $($arg:tt)*) => {
        $crate::error::CraftError::$kind(format!($($arg)*))
    };
}

/// Return early with a `CraftError` variant
#[macro_export]
macro_rules! bail {
    ($kind:ident, $($arg:tt)*) => {
        return Err($crate::error!($kind, $($arg)*))
    };
}

/// Return early with a `CraftError` variant unless `cond` holds
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $kind:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($kind, $($arg)*)
        }
    };
}

/// Attach a description of the failed step to any error
pub trait ResultExt<T> {
    /// Wrap the error in [`CraftError::Context`]
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        self.map_err(|e| CraftError::Context {
            context: f().to_string(),
            source: Box::new(e),
        })
    }
}
