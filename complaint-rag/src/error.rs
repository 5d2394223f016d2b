//! Error types for the `complaint-rag` crate.

use thiserror::Error;

/// Errors that can occur in retrieval, ingestion, and answering.
#[derive(Debug, Error)]
pub enum RagError {
    /// A component could not be configured (bad model id, invalid sizes,
    /// unusable endpoint). Raised at construction time, never deferred.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Caller-supplied input was rejected (empty question, misaligned
    /// vectors and payloads, wrong vector dimension).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector index backend.
    #[error("Vector index error ({backend}): {message}")]
    VectorIndexError {
        /// The index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation oracle call failed.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether the failure is transient and worth retrying.
        retryable: bool,
    },

    /// An error in pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Filesystem failure while persisting or loading data.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    /// Returns `true` if retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::GenerationError { retryable: true, .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
