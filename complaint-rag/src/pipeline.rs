//! Question-answering orchestrator.
//!
//! The [`QaPipeline`] runs the query-time path: retrieve sources, render the
//! grounding context, prompt the [`Generator`], and clean up its answer.
//!
//! # Example
//!
//! ```rust,ignore
//! use complaint_rag::{QaPipeline, RagConfig, Retriever};
//!
//! let pipeline = QaPipeline::builder()
//!     .config(&RagConfig::default())
//!     .retriever(retriever)
//!     .generator(Arc::new(generator))
//!     .build()?;
//!
//! let result = pipeline.answer("Why was I charged an overdraft fee?").await?;
//! println!("{}", result.answer);
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::RagConfig;
use crate::document::QaResult;
use crate::error::{RagError, Result};
use crate::generation::{
    GenerationConfig, Generator, build_prompt, extract_answer, normalize_response,
};
use crate::retriever::Retriever;

/// Prefix of the answer returned when the generator cannot be reached.
pub const FAILURE_ANSWER_PREFIX: &str = "Sorry, I couldn't generate an answer right now: ";

const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// The query-time pipeline and the system's single entry point.
///
/// Construct one via [`QaPipeline::builder()`].
pub struct QaPipeline {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    generation: GenerationConfig,
    timeout: Duration,
}

impl QaPipeline {
    /// Create a new [`QaPipelineBuilder`].
    pub fn builder() -> QaPipelineBuilder {
        QaPipelineBuilder::default()
    }

    /// Return a reference to the retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Return a reference to the generator.
    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// Answer `question` from the retriever's default number of sources.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for an empty or whitespace question
    /// (nothing is embedded). Retrieval failures propagate. Generation
    /// failures and timeouts do not: they produce an answer starting with
    /// [`FAILURE_ANSWER_PREFIX`], with the retrieved sources still attached.
    pub async fn answer(&self, question: &str) -> Result<QaResult> {
        self.answer_with_k(question, self.retriever.top_k()).await
    }

    /// Like [`answer`](Self::answer) with an explicit number of sources.
    pub async fn answer_with_k(&self, question: &str, k: usize) -> Result<QaResult> {
        let sources = self.retriever.retrieve(question, k).await?;
        let prompt = build_prompt(&self.retriever.format_context(&sources), question);

        let answer = match self.generate(&prompt).await {
            Ok(answer) => answer,
            Err(e @ RagError::GenerationError { .. }) => {
                warn!(generator = self.generator.name(), error = %e, "generation failed");
                format!("{FAILURE_ANSWER_PREFIX}{e}")
            }
            Err(e) => return Err(e),
        };

        info!(source_count = sources.len(), answer_len = answer.len(), "answered question");
        Ok(QaResult { question: question.to_string(), answer, sources })
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let generation = self.generator.generate(prompt, &self.generation);
        let raw = tokio::time::timeout(self.timeout, generation).await.map_err(|_| {
            RagError::GenerationError {
                provider: self.generator.name().to_string(),
                message: format!("no response within {:?}", self.timeout),
                retryable: true,
            }
        })??;
        Ok(extract_answer(&normalize_response(&raw)))
    }
}

impl std::fmt::Debug for QaPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaPipeline")
            .field("retriever", &self.retriever)
            .field("generator", &self.generator.name())
            .field("generation", &self.generation)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for constructing a [`QaPipeline`].
///
/// `retriever` and `generator` are required. Call
/// [`build()`](QaPipelineBuilder::build) to validate and produce the pipeline.
#[derive(Default)]
pub struct QaPipelineBuilder {
    retriever: Option<Retriever>,
    generator: Option<Arc<dyn Generator>>,
    generation: GenerationConfig,
    timeout: Option<Duration>,
}

impl QaPipelineBuilder {
    /// Take `max_new_tokens` and the generation timeout from a [`RagConfig`].
    pub fn config(mut self, config: &RagConfig) -> Self {
        self.generation.max_new_tokens = config.max_new_tokens;
        self.timeout = Some(config.generation_timeout());
        self
    }

    /// Set the retriever.
    pub fn retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Set the generation backend.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the generation parameters.
    pub fn generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Bound each generation call, retries included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the [`QaPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the timeout is zero.
    pub fn build(self) -> Result<QaPipeline> {
        let retriever = self
            .retriever
            .ok_or_else(|| RagError::ConfigError("retriever is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;
        let timeout = self.timeout.unwrap_or(DEFAULT_GENERATION_TIMEOUT);
        if timeout.is_zero() {
            return Err(RagError::ConfigError(
                "generation timeout must be greater than zero".into(),
            ));
        }

        Ok(QaPipeline { retriever, generator, generation: self.generation, timeout })
    }
}
