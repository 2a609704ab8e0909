//! BPE encodings available for counting

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumProperty};
use tiktoken_rs::CoreBPE;

use super::error::{TokenizerError, TokenizerResult};

/// Byte-pair encodings supported by the counter
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    Display,
    ValueEnum,
    Serialize,
    Deserialize,
    EnumProperty,
)]
pub enum Encoding {
    /// GPT-3.5 / GPT-4 vocabulary
    #[default]
    #[strum(props(id = "cl100k_base", vocab = 100256))]
    Cl100k,

    /// GPT-4o vocabulary
    #[strum(props(id = "o200k_base", vocab = 200000))]
    O200k,

    /// Codex-era vocabulary
    #[strum(props(id = "p50k_base", vocab = 50281))]
    P50k,
}

impl Encoding {
    /// Name of the encoding as tiktoken knows it
    pub fn id(&self) -> &'static str {
        self.get_str("id").unwrap_or("unknown")
    }

    /// Approximate vocabulary size
    pub fn vocab_size(&self) -> usize {
        self.get_int("vocab").unwrap_or(0) as usize
    }

    /// Load the BPE ranks for this encoding
    pub fn load(&self) -> TokenizerResult<CoreBPE> {
        let bpe = match self {
            Encoding::Cl100k => tiktoken_rs::cl100k_base(),
            Encoding::O200k => tiktoken_rs::o200k_base(),
            Encoding::P50k => tiktoken_rs::p50k_base(),
        };
        bpe.map_err(|e| TokenizerError::EncodingLoad {
            encoding: self.id().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_every_encoding_has_an_id() {
        for encoding in Encoding::iter() {
            assert!(encoding.id().ends_with("_base"));
            assert!(encoding.vocab_size() > 0);
        }
        assert_eq!(Encoding::default(), Encoding::Cl100k);
    }
}
