//! Build-time path: records → chunks → embeddings → index.
//!
//! Records are processed in fixed-size batches that run strictly one after
//! another. Batching only bounds peak memory; the final index holds the same
//! entries in the same order whatever the batch size.
//!
//! # Example
//!
//! ```rust,ignore
//! use complaint_rag::{IngestionPipeline, RecursiveChunker, FlatIndex};
//!
//! let pipeline = IngestionPipeline::builder()
//!     .chunker(Arc::new(RecursiveChunker::new(500, 50)?))
//!     .embedder(embedder)
//!     .index(index.clone())
//!     .batch_size(1000)
//!     .build()?;
//!
//! let report = pipeline.run(&records).await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::chunking::Chunker;
use crate::cleaning::clean_text;
use crate::config::RagConfig;
use crate::document::{Chunk, Record};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::vectorindex::VectorIndex;

/// Records per batch when none is configured.
pub const DEFAULT_INGEST_BATCH_SIZE: usize = 1000;

/// Counts describing one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Records that produced at least one chunk.
    pub records: usize,
    /// Records skipped for a missing, blank, or fully cleaned-away narrative.
    pub skipped: usize,
    /// Chunks appended to the index.
    pub chunks: usize,
    /// Batches processed.
    pub batches: usize,
}

/// Drives a [`Chunker`], an [`Embedder`] and a [`VectorIndex`] over records.
///
/// Construct one via [`IngestionPipeline::builder()`].
pub struct IngestionPipeline {
    chunker: Arc<dyn Chunker>,
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
    clean: bool,
}

impl IngestionPipeline {
    /// Create a new [`IngestionPipelineBuilder`].
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::default()
    }

    /// Return a reference to the target index.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Records per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Toggle [`clean_text`] on narratives before chunking.
    pub fn with_cleaning(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    /// Ingest `records` batch by batch.
    ///
    /// Records whose narrative is missing or blank (or empty after cleaning)
    /// are logged and skipped. Each batch is chunked, embedded in one
    /// [`Embedder::embed`] call, and appended with a single
    /// [`VectorIndex::add`], so the index never holds half a batch.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] on the first batch whose embedding
    /// or insertion fails. Batches before it stay in the index.
    pub async fn run(&self, records: &[Record]) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for (batch, batch_records) in records.chunks(self.batch_size).enumerate() {
            let mut chunks = Vec::new();
            let mut ingested = 0;
            for record in batch_records {
                let produced = self.chunk(record);
                if produced.is_empty() {
                    warn!(complaint_id = %record.id, "skipping record without narrative text");
                    report.skipped += 1;
                    continue;
                }
                ingested += 1;
                chunks.extend(produced);
            }

            let chunk_count = chunks.len();
            if !chunks.is_empty() {
                self.store(batch, chunks).await?;
            }

            report.records += ingested;
            report.chunks += chunk_count;
            report.batches += 1;
            info!(batch, records = ingested, chunks = chunk_count, "ingested batch");
        }

        info!(
            records = report.records,
            skipped = report.skipped,
            chunks = report.chunks,
            batches = report.batches,
            "ingestion complete"
        );
        Ok(report)
    }

    fn chunk(&self, record: &Record) -> Vec<Chunk> {
        if !self.clean {
            return self.chunker.chunk_record(record);
        }
        match record.narrative_text() {
            Some(text) => self.chunker.split(&clean_text(text), &record.to_metadata()),
            None => Vec::new(),
        }
    }

    async fn store(&self, batch: usize, chunks: Vec<Chunk>) -> Result<()> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();

        let vectors = self.embedder.embed(&texts).await.map_err(|e| {
            error!(batch, error = %e, "embedding failed during ingestion");
            RagError::PipelineError(format!("embedding failed for batch {batch}: {e}"))
        })?;

        self.index.add(vectors, chunks).await.map_err(|e| {
            error!(batch, error = %e, "index insertion failed during ingestion");
            RagError::PipelineError(format!("index insertion failed for batch {batch}: {e}"))
        })
    }
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("embedder", &self.embedder)
            .field("batch_size", &self.batch_size)
            .field("clean", &self.clean)
            .finish()
    }
}

/// Builder for constructing an [`IngestionPipeline`].
///
/// `chunker`, `embedder` and `index` are required; `batch_size` defaults to
/// [`DEFAULT_INGEST_BATCH_SIZE`] and cleaning is off.
#[derive(Default)]
pub struct IngestionPipelineBuilder {
    chunker: Option<Arc<dyn Chunker>>,
    embedder: Option<Embedder>,
    index: Option<Arc<dyn VectorIndex>>,
    batch_size: Option<usize>,
    clean: bool,
}

impl IngestionPipelineBuilder {
    /// Take the batch size from a [`RagConfig`].
    pub fn config(mut self, config: &RagConfig) -> Self {
        self.batch_size = Some(config.ingest_batch_size);
        self
    }

    /// Set the chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedder.
    pub fn embedder(mut self, embedder: Embedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the target index.
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the number of records per batch.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Apply [`clean_text`] to narratives before chunking.
    pub fn cleaning(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    /// Build the [`IngestionPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required component is missing,
    /// the batch size is zero, or the embedder and index disagree on vector
    /// dimension.
    pub fn build(self) -> Result<IngestionPipeline> {
        let chunker =
            self.chunker.ok_or_else(|| RagError::ConfigError("chunker is required".to_string()))?;
        let embedder =
            self.embedder.ok_or_else(|| RagError::ConfigError("embedder is required".to_string()))?;
        let index =
            self.index.ok_or_else(|| RagError::ConfigError("index is required".to_string()))?;

        let batch_size = self.batch_size.unwrap_or(DEFAULT_INGEST_BATCH_SIZE);
        if batch_size == 0 {
            return Err(RagError::ConfigError("ingest batch_size must be greater than zero".into()));
        }
        if embedder.dimensions() != index.dimensions() {
            return Err(RagError::ConfigError(format!(
                "embedder produces {}-dimensional vectors but the index stores {}",
                embedder.dimensions(),
                index.dimensions()
            )));
        }

        Ok(IngestionPipeline { chunker, embedder, index, batch_size, clean: self.clean })
    }
}
