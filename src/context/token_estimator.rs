//! Prompt size estimation using tiktoken

use once_cell::sync::Lazy;
use std::sync::Arc;
use tiktoken_rs::{cl100k_base, CoreBPE};

use crate::error::{ContextError, Result};

/// Token estimator trait for different tokenization strategies
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in the given text
    fn estimate(&self, text: &str) -> usize;

    /// Estimate the combined size of several prompt parts
    fn estimate_all(&self, texts: &[&str]) -> usize {
        texts.iter().map(|t| self.estimate(t)).sum()
    }
}

/// Tiktoken-based token estimator using cl100k_base (GPT-4, GPT-3.5-turbo)
#[derive(Clone)]
pub struct TiktokenEstimator {
    bpe: Arc<CoreBPE>,
}

impl TiktokenEstimator {
    /// Create a new tiktoken estimator with cl100k_base encoding
    pub fn new() -> Result<Self> {
        let bpe = cl100k_base()
            .map_err(|e| ContextError::Internal(format!("Failed to load cl100k_base: {e}")))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Word-based token estimator (fallback, ~1.3 tokens per word)
#[derive(Debug, Clone, Copy)]
pub struct WordBasedEstimator {
    tokens_per_word: f64,
}

impl WordBasedEstimator {
    pub fn new(tokens_per_word: f64) -> Self {
        Self { tokens_per_word }
    }
}

impl Default for WordBasedEstimator {
    fn default() -> Self {
        Self::new(1.3)
    }
}

impl TokenEstimator for WordBasedEstimator {
    fn estimate(&self, text: &str) -> usize {
        let word_count = text.split_whitespace().count();
        (word_count as f64 * self.tokens_per_word).ceil() as usize
    }
}

/// Tiktoken when its encoding loads, word counting otherwise
pub fn default_estimator() -> Arc<dyn TokenEstimator> {
    Arc::clone(&SHARED_ESTIMATOR)
}

/// cl100k is loaded once per process
static SHARED_ESTIMATOR: Lazy<Arc<dyn TokenEstimator>> = Lazy::new(|| {
    match TiktokenEstimator::new() {
        Ok(estimator) => Arc::new(estimator),
        Err(e) => {
            tracing::warn!("{}, falling back to word-based token estimates", e);
            Arc::new(WordBasedEstimator::default())
        }
    }
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiktoken_estimator() {
        let estimator = TiktokenEstimator::new().unwrap();
        let text = "Hello, world! This is a test.";
        let tokens = estimator.estimate(text);
        assert!(tokens > 0);
        assert!(tokens < 20);
    }

    #[test]
    fn test_word_based_estimator() {
        let estimator = WordBasedEstimator::default();
        let tokens = estimator.estimate("Hello world test");
        assert_eq!(tokens, 4); // 3 words * 1.3 = 3.9 -> 4
    }

    #[test]
    fn test_estimate_all() {
        let estimator = WordBasedEstimator::new(1.0);
        assert_eq!(estimator.estimate_all(&["one two", "three", ""]), 3);
    }

    #[test]
    fn test_default_estimator_is_shared() {
        let first = default_estimator();
        let second = default_estimator();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.estimate("shared tokenizer") > 0);
    }
}
