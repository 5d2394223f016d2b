//! Configuration for ingestion and question answering.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::document::ID_FIELD;
use crate::error::{RagError, Result};

/// The default sentence-embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// The default text-generation model.
pub const DEFAULT_GENERATION_MODEL: &str = "google/flan-t5-base";

/// Configuration parameters shared by the ingestion and query paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of sources retrieved per question.
    pub top_k: usize,
    /// Texts sent to the embedding backend per call.
    pub embedding_batch_size: usize,
    /// Records chunked, embedded, and indexed per ingestion batch.
    pub ingest_batch_size: usize,
    /// Embedding model identifier; selects the vector dimension.
    pub embedding_model: String,
    /// Generation model identifier.
    pub generation_model: String,
    /// Token budget for each generated answer.
    pub max_new_tokens: u32,
    /// Upper bound on a single generation call, retries included.
    pub generation_timeout_secs: u64,
    /// Upper bound on each embedding request.
    pub embedding_timeout_secs: u64,
    /// Metadata field shown as the source identifier in the context.
    pub id_field: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 5,
            embedding_batch_size: 32,
            ingest_batch_size: 1000,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            max_new_tokens: 256,
            generation_timeout_secs: 60,
            embedding_timeout_secs: 30,
            id_field: ID_FIELD.to_string(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Load a JSON configuration file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] or [`RagError::Serialization`] if the file
    /// cannot be read or parsed, and [`RagError::ConfigError`] if the values
    /// are inconsistent.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: RagConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// The generation timeout as a [`Duration`].
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// The per-request embedding timeout as a [`Duration`].
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k`, `embedding_batch_size`, `ingest_batch_size`,
    ///   `max_new_tokens`, or either timeout is zero
    /// - either model identifier or `id_field` is empty
    pub fn validate(&self) -> Result<()> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.embedding_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embedding_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.ingest_batch_size == 0 {
            return Err(RagError::ConfigError(
                "ingest_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.max_new_tokens == 0 {
            return Err(RagError::ConfigError(
                "max_new_tokens must be greater than zero".to_string(),
            ));
        }
        if self.generation_timeout_secs == 0 {
            return Err(RagError::ConfigError(
                "generation_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.embedding_timeout_secs == 0 {
            return Err(RagError::ConfigError(
                "embedding_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.embedding_model.trim().is_empty() || self.generation_model.trim().is_empty() {
            return Err(RagError::ConfigError("model identifiers must not be empty".to_string()));
        }
        if self.id_field.is_empty() {
            return Err(RagError::ConfigError("id_field must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of sources retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set how many texts are embedded per backend call.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Set how many records are processed per ingestion batch.
    pub fn ingest_batch_size(mut self, size: usize) -> Self {
        self.config.ingest_batch_size = size;
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the generation model identifier.
    pub fn generation_model(mut self, model: impl Into<String>) -> Self {
        self.config.generation_model = model.into();
        self
    }

    /// Set the token budget for generated answers.
    pub fn max_new_tokens(mut self, tokens: u32) -> Self {
        self.config.max_new_tokens = tokens;
        self
    }

    /// Set the generation timeout in seconds.
    pub fn generation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.generation_timeout_secs = secs;
        self
    }

    /// Set the per-request embedding timeout in seconds.
    pub fn embedding_timeout_secs(mut self, secs: u64) -> Self {
        self.config.embedding_timeout_secs = secs;
        self
    }

    /// Set the metadata field used as the source identifier.
    pub fn id_field(mut self, field: impl Into<String>) -> Self {
        self.config.id_field = field.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] under the conditions listed on
    /// [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
