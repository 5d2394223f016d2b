//! Local feature-hashing embedding provider.
//!
//! [`HashingEmbeddingProvider`] needs no model download or network access.
//! Each lower-cased alphanumeric token (English stop-words removed) is hashed
//! with 64-bit FNV-1a; the hash selects a bucket and its top bit selects the
//! sign added to that bucket. Texts sharing content words end up pointing in
//! similar directions, which is enough for offline runs and tests.

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default dimensionality, matching `all-MiniLM-L6-v2`.
pub const DEFAULT_HASHING_DIMENSIONS: usize = 384;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "did", "do", "does", "for",
    "from", "had", "has", "have", "he", "her", "his", "how", "i", "if", "in", "into", "is", "it",
    "its", "me", "my", "no", "not", "of", "on", "or", "our", "she", "so", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "to", "too", "up", "us", "was",
    "we", "were", "what", "when", "where", "which", "who", "why", "will", "with", "without",
    "you", "your",
];

/// A deterministic bag-of-words embedding provider.
///
/// # Example
///
/// ```rust,ignore
/// use complaint_rag::{EmbeddingProvider, HashingEmbeddingProvider};
///
/// let provider = HashingEmbeddingProvider::new(384)?;
/// let v = provider.embed("overdraft fee charged").await?;
/// assert_eq!(v.len(), 384);
/// ```
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    /// Create a provider producing `dimensions`-long vectors.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::ConfigError(
                "hashing dimensions must be greater than zero".into(),
            ));
        }
        Ok(Self { dimensions })
    }

    /// Embed synchronously; the hashing is pure CPU work.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokens(text) {
            let hash = fnv1a(&token);
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
            vector[bucket] += sign;
        }
        vector
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self { dimensions: DEFAULT_HASHING_DIMENSIONS }
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    fn name(&self) -> &str {
        "Hashing"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_sync(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
}

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_words_and_single_letters_are_dropped() {
        let collected: Vec<String> = tokens("Why was I charged, A fee?").collect();
        assert_eq!(collected, vec!["charged", "fee"]);
    }

    #[test]
    fn fnv1a_matches_reference_vector() {
        // Published FNV-1a 64 test vector for "a".
        assert_eq!(fnv1a("a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let provider = HashingEmbeddingProvider::new(8).unwrap();
        assert!(provider.embed_sync("").iter().all(|v| *v == 0.0));
    }
}
