//! Embedding provider trait and the batching [`Embedder`] wrapper.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// Embedding must be a pure per-text function: the vector for a text may not
/// depend on which other texts share its batch.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// A short name for logs and error messages.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Known sentence-embedding models and their output dimension.
const KNOWN_MODELS: &[(&str, usize)] = &[
    ("all-MiniLM-L6-v2", 384),
    ("all-MiniLM-L12-v2", 384),
    ("paraphrase-MiniLM-L6-v2", 384),
    ("multi-qa-MiniLM-L6-cos-v1", 384),
    ("all-mpnet-base-v2", 768),
    ("multi-qa-mpnet-base-dot-v1", 768),
    ("bge-small-en-v1.5", 384),
    ("bge-base-en-v1.5", 768),
    ("bge-large-en-v1.5", 1024),
];

/// Look up the output dimension of a known embedding model.
///
/// The organisation prefix is optional: `all-MiniLM-L6-v2` and
/// `sentence-transformers/all-MiniLM-L6-v2` both resolve to 384.
pub fn model_dimensions(model: &str) -> Option<usize> {
    let name = model.rsplit('/').next().unwrap_or(model);
    KNOWN_MODELS.iter().find(|(known, _)| known.eq_ignore_ascii_case(name)).map(|(_, dims)| *dims)
}

/// Batches texts through an [`EmbeddingProvider`] to bound memory per call.
///
/// Batch boundaries never change the output: `embed(texts)[i]` is the
/// embedding of `texts[i]` regardless of `batch_size`. Every returned vector
/// is checked against the provider's declared dimension.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl Embedder {
    /// Wrap a provider with the given batch size.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `batch_size` is zero or the
    /// provider reports a zero dimension.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(RagError::ConfigError(
                "embedding batch_size must be greater than zero".into(),
            ));
        }
        if provider.dimensions() == 0 {
            return Err(RagError::ConfigError(format!(
                "embedding provider '{}' reports zero dimensions",
                provider.name()
            )));
        }
        Ok(Self { provider, batch_size })
    }

    /// Return the dimensionality of produced vectors.
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Return the configured batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Return a reference to the wrapped provider.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed `texts` in order, `batch_size` texts per provider call.
    ///
    /// # Errors
    ///
    /// Propagates provider failures, and returns [`RagError::EmbeddingError`]
    /// if a batch yields the wrong number of vectors or a vector of the
    /// wrong dimension.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (batch_index, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(
                provider = self.provider.name(),
                batch = batch_index,
                batch_size = batch.len(),
                "embedding batch"
            );
            let embedded = self.provider.embed_batch(batch).await?;
            if embedded.len() != batch.len() {
                return Err(RagError::EmbeddingError {
                    provider: self.provider.name().to_string(),
                    message: format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        embedded.len()
                    ),
                });
            }
            for vector in &embedded {
                self.check_dimensions(vector)?;
            }
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    /// Embed a single query text as a one-element batch.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text]).await?;
        vectors.pop().ok_or_else(|| RagError::EmbeddingError {
            provider: self.provider.name().to_string(),
            message: "provider returned no embedding for the query".into(),
        })
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        let expected = self.provider.dimensions();
        if vector.len() != expected {
            return Err(RagError::EmbeddingError {
                provider: self.provider.name().to_string(),
                message: format!("expected {expected}-dimensional embedding, got {}", vector.len()),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("provider", &self.provider.name())
            .field("dimensions", &self.provider.dimensions())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
