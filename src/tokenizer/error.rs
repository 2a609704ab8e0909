//! Error types for the tokenizer module

use thiserror::Error;

/// Result type for tokenizer operations
pub type TokenizerResult<T> = Result<T, TokenizerError>;

/// Errors that can occur while setting up tokenization
#[derive(Error, Debug)]
pub enum TokenizerError {
    /// The BPE ranks for an encoding could not be loaded
    #[error("Failed to load {encoding} encoding: {reason}")]
    EncodingLoad {
        /// Encoding that failed
        encoding: String,
        /// Underlying failure
        reason: String,
    },

    /// Tokenization task panicked or was aborted
    #[error("Tokenizer task failed: {0}")]
    TaskFailed(String),
}
