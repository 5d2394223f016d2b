//! Question → ranked supporting chunks → grounding context.

use std::sync::Arc;

use tracing::{debug, error};

use crate::document::{ID_FIELD, SearchResult};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::vectorindex::VectorIndex;

/// Identifier shown for a source whose metadata lacks the id field.
const UNKNOWN_SOURCE: &str = "unknown";

/// Embeds questions and looks them up in a [`VectorIndex`].
///
/// The index is injected, so several retrievers (or tests) can each own an
/// independent index in one process.
#[derive(Clone)]
pub struct Retriever {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
    id_field: String,
}

impl Retriever {
    /// Create a retriever returning `top_k` sources by default.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `top_k` is zero or the embedder
    /// and index disagree on vector dimension.
    pub fn new(embedder: Embedder, index: Arc<dyn VectorIndex>, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".into()));
        }
        if embedder.dimensions() != index.dimensions() {
            return Err(RagError::ConfigError(format!(
                "embedder produces {}-dimensional vectors but the index stores {}",
                embedder.dimensions(),
                index.dimensions()
            )));
        }
        Ok(Self { embedder, index, top_k, id_field: ID_FIELD.to_string() })
    }

    /// Use another metadata field as the source identifier in the context.
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    /// The default number of sources.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Return a reference to the index.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Retrieve the default `top_k` sources for `question`.
    pub async fn retrieve_default(&self, question: &str) -> Result<Vec<SearchResult>> {
        self.retrieve(question, self.top_k).await
    }

    /// Embed `question` and return the `k` most similar chunks, best first.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for an empty or whitespace question,
    /// before anything is embedded. Embedding and search failures propagate.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<SearchResult>> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidInput("question must not be empty".into()));
        }

        let query = self
            .embedder
            .embed_query(question)
            .await
            .inspect_err(|e| error!(error = %e, "embedding failed during retrieval"))?;

        let results = self.index.search(&query, k).await?;
        debug!(k, result_count = results.len(), "retrieved sources");
        Ok(results)
    }

    /// Render results as the grounding context, one block per source:
    ///
    /// ```text
    /// Source 1: <id>
    /// <chunk text>
    ///
    /// Source 2: <id>
    /// <chunk text>
    /// ```
    ///
    /// An empty result list renders as an empty string.
    pub fn format_context(&self, results: &[SearchResult]) -> String {
        results
            .iter()
            .enumerate()
            .map(|(i, result)| {
                let id = result.field(&self.id_field).unwrap_or_else(|| UNKNOWN_SOURCE.to_string());
                format!("Source {}: {id}\n{}", i + 1, result.text)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder)
            .field("dimensions", &self.index.dimensions())
            .field("top_k", &self.top_k)
            .field("id_field", &self.id_field)
            .finish()
    }
}
