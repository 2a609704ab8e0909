//! BPE tokenizer backed by tiktoken

use tiktoken_rs::CoreBPE;

use super::encoding::Encoding;
use super::error::TokenizerResult;
use super::Tokenizer;

/// Tokenizer for one of the tiktoken encodings
pub struct BpeTokenizer {
    encoding: Encoding,
    bpe: CoreBPE,
}

impl BpeTokenizer {
    /// Load the ranks for `encoding`
    pub fn new(encoding: Encoding) -> TokenizerResult<Self> {
        Ok(Self {
            encoding,
            bpe: encoding.load()?,
        })
    }

    /// Encoding in use
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

impl Tokenizer for BpeTokenizer {
    fn count(&self, text: &str) -> usize {
        // Special tokens are counted as plain text
        self.bpe.encode_ordinary(text).len()
    }
}
