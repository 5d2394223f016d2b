//! Vector index trait and the normalization shared by every backend.

use async_trait::async_trait;

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// Lower bound on the norm used when normalizing, so an all-zero vector maps
/// to an all-zero vector instead of NaN.
pub const NORM_EPSILON: f32 = 1e-10;

/// An append-only store of unit-normalized vectors with aligned payloads.
///
/// Position is the only address: the payload at position `i` is the chunk
/// that was added alongside vector `i`. Entries are never removed, replaced,
/// or reordered. Rebuilding an index means ingesting again from scratch.
///
/// # Example
///
/// ```rust,ignore
/// use complaint_rag::{FlatIndex, VectorIndex};
///
/// let index = FlatIndex::new(384)?;
/// index.add(vectors, chunks).await?;
/// let results = index.search(&query_vector, 5).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The dimension every stored and query vector must have.
    fn dimensions(&self) -> usize;

    /// Normalize and append `vectors`, appending `chunks` in the same order.
    ///
    /// Duplicates are accepted. Either every pair is appended or, on error,
    /// none is.
    async fn add(&self, vectors: Vec<Vec<f32>>, chunks: Vec<Chunk>) -> Result<()>;

    /// Return up to `k` entries by descending cosine similarity to `query`.
    ///
    /// Returns fewer than `k` results only when the index holds fewer than
    /// `k` entries, and none when it is empty.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Number of stored entries.
    async fn len(&self) -> usize;

    /// Whether the index holds no entries.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Scale `vector` to unit L2 norm, dividing by `max(norm, NORM_EPSILON)`.
///
/// The norm stays in `f64` so vectors whose norm exceeds `f32::MAX` still
/// normalize to unit length.
pub fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();
    let denominator = norm.max(f64::from(NORM_EPSILON));
    vector.iter().map(|x| (f64::from(*x) / denominator) as f32).collect()
}

/// Inner product of two equal-length vectors.
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
