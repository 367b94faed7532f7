//! Token counting for inbound messages.

use crate::error::TokenizerError;
use rootcause::prelude::Report;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

/// Encoding used for all counts.
pub const ENCODING: &str = "cl100k_base";

/// Counts tokens with the `cl100k_base` encoding.
///
/// Loading the BPE tables is not free; build one counter at start-up and
/// share it.
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Arc<CoreBPE>,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("encoding", &ENCODING)
            .finish()
    }
}

impl TokenCounter {
    /// Loads the encoding.
    ///
    /// # Errors
    ///
    /// Returns [`TokenizerError::LoadFailed`] if the tables cannot be built.
    pub fn new() -> Result<Self, Report<TokenizerError>> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| TokenizerError::LoadFailed {
            encoding: ENCODING.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { bpe: Arc::new(bpe) })
    }

    /// Returns the number of tokens in `text`.
    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_tokens() {
        let counter = TokenCounter::new().expect("load tokenizer");
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("hello world"), 2);
    }

    #[test]
    fn longer_text_counts_more() {
        let counter = TokenCounter::new().expect("load tokenizer");
        let short = counter.count("hi");
        let long = counter.count(&"hi ".repeat(50));
        assert!(long > short);
    }
}
