//! # complaint-rag
//!
//! Retrieval-augmented question answering over consumer complaint narratives.
//!
//! ## Overview
//!
//! Narratives are split into overlapping chunks, embedded into dense vectors
//! and stored in an exact inner-product index. A question is embedded the
//! same way, its nearest chunks become the grounding context, and a hosted
//! text-generation model answers from that context.
//!
//! - [`RecursiveChunker`] - paragraph → line → word → fixed-window splitting
//! - [`Embedder`] - batching over any [`EmbeddingProvider`]
//! - [`FlatIndex`] - append-only cosine-similarity index with JSON snapshots
//! - [`Retriever`] - question → ranked sources → context string
//! - [`IngestionPipeline`] - records → chunks → vectors → index
//! - [`QaPipeline`] - question → answer with cited sources
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use complaint_rag::*;
//!
//! let config = RagConfig::default();
//! let embedder = Embedder::new(Arc::new(HashingEmbeddingProvider::default()), 32)?;
//! let index = Arc::new(FlatIndex::new(embedder.dimensions())?);
//!
//! IngestionPipeline::builder()
//!     .config(&config)
//!     .chunker(Arc::new(RecursiveChunker::from_config(&config)?))
//!     .embedder(embedder.clone())
//!     .index(index.clone())
//!     .build()?
//!     .run(&records)
//!     .await?;
//!
//! let qa = QaPipeline::builder()
//!     .config(&config)
//!     .retriever(Retriever::new(embedder, index, config.top_k)?)
//!     .generator(Arc::new(HuggingFaceGenerator::from_env(&config.generation_model)?))
//!     .build()?;
//!
//! let result = qa.answer("What are common sentiments about overdraft fees?").await?;
//! ```
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `huggingface` (default) | Hugging Face Inference API embedding and generation backends |

pub mod chunking;
pub mod cleaning;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod evaluate;
pub mod generation;
pub mod hashing;
#[cfg(feature = "huggingface")]
pub mod huggingface;
pub mod ingest;
pub mod inmemory;
pub mod pipeline;
pub mod retriever;
pub mod retry;
pub mod vectorindex;

pub use chunking::{Chunker, RecursiveChunker};
pub use cleaning::{DEFAULT_PRODUCTS, clean_text, retain_products};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Metadata, QaResult, Record, SearchResult};
pub use embedding::{Embedder, EmbeddingProvider, model_dimensions};
pub use error::{RagError, Result};
pub use evaluate::{EVAL_QUESTIONS, EvaluationRow, evaluate, render_markdown};
pub use generation::{
    GenerationConfig, Generator, INSTRUCTIONS, build_prompt, extract_answer, normalize_response,
};
pub use hashing::HashingEmbeddingProvider;
#[cfg(feature = "huggingface")]
pub use huggingface::{HuggingFaceEmbeddingProvider, HuggingFaceGenerator};
pub use ingest::{IngestReport, IngestionPipeline, IngestionPipelineBuilder};
pub use inmemory::FlatIndex;
pub use pipeline::{FAILURE_ANSWER_PREFIX, QaPipeline, QaPipelineBuilder};
pub use retriever::Retriever;
pub use retry::RetryPolicy;
pub use vectorindex::{VectorIndex, normalize};
