//! Token counting for digest parts.
//!
//! Counts are advisory: they size parts against a budget but never decide
//! whether content is written. Every failure collapses to a count of 0.

use log;
use once_cell::sync::Lazy;
use tiktoken_rs::{CoreBPE, cl100k_base};

/// Anything that can turn text into a token count.
///
/// Implementations must be deterministic for identical input and must not
/// panic; the digest pipeline may call them several times per file.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

static CL100K: Lazy<Option<CoreBPE>> = Lazy::new(|| match cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(e) => {
        log::warn!("Failed to initialize cl100k_base tokenizer, counts will be 0: {}", e);
        None
    }
});

/// BPE counter backed by the cl100k_base vocabulary.
#[derive(Debug, Default, Clone, Copy)]
pub struct Cl100kTokenizer;

impl Cl100kTokenizer {
    pub fn new() -> Self {
        Self
    }
}

impl TokenCounter for Cl100kTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        match CL100K.as_ref() {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => 0,
        }
    }
}

/// Used when token counting is switched off in the configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTokenizer;

impl TokenCounter for DisabledTokenizer {
    fn count_tokens(&self, _text: &str) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_counts_zero() {
        assert_eq!(Cl100kTokenizer::new().count_tokens(""), 0);
    }

    #[test]
    fn counting_is_deterministic() {
        let tokenizer = Cl100kTokenizer::new();
        let text = "fn main() {\n    println!(\"hello\");\n}\n";
        let first = tokenizer.count_tokens(text);
        assert!(first > 0);
        assert_eq!(first, tokenizer.count_tokens(text));
    }

    #[test]
    fn disabled_tokenizer_always_zero() {
        assert_eq!(DisabledTokenizer.count_tokens("some words here"), 0);
    }
}
