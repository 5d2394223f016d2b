//! Exact in-memory vector index using inner-product search.
//!
//! [`FlatIndex`] stores normalized vectors contiguously, row after row, next
//! to a parallel list of chunk payloads. Because every vector is unit length,
//! the inner product of a stored row and a normalized query is their cosine
//! similarity. Storage sits behind a `tokio::sync::RwLock`: appends take the
//! single writer lock, searches share read access.

use std::cmp::Ordering;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorindex::{VectorIndex, dot, normalize};

const BACKEND: &str = "Flat";

/// An exact nearest-neighbour index over unit-normalized vectors.
///
/// # Example
///
/// ```rust,ignore
/// use complaint_rag::{FlatIndex, VectorIndex};
///
/// let index = FlatIndex::new(384)?;
/// index.add(vectors, chunks).await?;
/// index.save("index.json").await?;
/// let restored = FlatIndex::load("index.json").await?;
/// ```
#[derive(Debug)]
pub struct FlatIndex {
    dimensions: usize,
    storage: RwLock<FlatStorage>,
}

#[derive(Debug, Default)]
struct FlatStorage {
    /// Row-major normalized vectors, `dimensions` floats per entry.
    vectors: Vec<f32>,
    entries: Vec<Chunk>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    dimensions: usize,
    vectors: Vec<&'a [f32]>,
    entries: &'a [Chunk],
}

#[derive(Deserialize)]
struct Snapshot {
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
    entries: Vec<Chunk>,
}

impl FlatIndex {
    /// Create an empty index for `dimensions`-long vectors.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::ConfigError("index dimensions must be greater than zero".into()));
        }
        Ok(Self { dimensions, storage: RwLock::new(FlatStorage::default()) })
    }

    /// Return the stored (normalized) vector and payload at `position`.
    pub async fn get(&self, position: usize) -> Option<(Vec<f32>, Chunk)> {
        let storage = self.storage.read().await;
        let entry = storage.entries.get(position)?.clone();
        let start = position * self.dimensions;
        let vector = storage.vectors.get(start..start + self.dimensions)?.to_vec();
        Some((vector, entry))
    }

    /// Write the index to `path` as a JSON snapshot.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = {
            let storage = self.storage.read().await;
            let snapshot = SnapshotRef {
                dimensions: self.dimensions,
                vectors: storage.vectors.chunks_exact(self.dimensions).collect(),
                entries: &storage.entries,
            };
            serde_json::to_vec(&snapshot)?
        };
        tokio::fs::write(path, bytes).await?;
        info!(path = %path.display(), "saved vector index");
        Ok(())
    }

    /// Read an index previously written by [`save`](FlatIndex::save).
    ///
    /// Stored vectors are already normalized and are kept as-is.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorIndexError`] if the snapshot's vectors and
    /// entries are misaligned or a vector has the wrong dimension.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;

        if snapshot.dimensions == 0 {
            return Err(corrupt("snapshot declares zero dimensions"));
        }
        if snapshot.vectors.len() != snapshot.entries.len() {
            return Err(corrupt(&format!(
                "snapshot has {} vectors but {} entries",
                snapshot.vectors.len(),
                snapshot.entries.len()
            )));
        }

        let mut vectors = Vec::with_capacity(snapshot.vectors.len() * snapshot.dimensions);
        for (position, vector) in snapshot.vectors.iter().enumerate() {
            if vector.len() != snapshot.dimensions {
                return Err(corrupt(&format!(
                    "vector {position} has {} dimensions, expected {}",
                    vector.len(),
                    snapshot.dimensions
                )));
            }
            vectors.extend_from_slice(vector);
        }

        info!(path = %path.display(), entries = snapshot.entries.len(), "loaded vector index");
        Ok(Self {
            dimensions: snapshot.dimensions,
            storage: RwLock::new(FlatStorage { vectors, entries: snapshot.entries }),
        })
    }

    fn check_vector(&self, vector: &[f32], what: &str) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(RagError::InvalidInput(format!(
                "{what} has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            )));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(RagError::InvalidInput(format!("{what} contains non-finite values")));
        }
        Ok(())
    }
}

fn corrupt(message: &str) -> RagError {
    RagError::VectorIndexError { backend: BACKEND.to_string(), message: message.to_string() }
}

/// Descending score, ties broken by insertion order.
fn by_rank(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn add(&self, vectors: Vec<Vec<f32>>, chunks: Vec<Chunk>) -> Result<()> {
        if vectors.len() != chunks.len() {
            return Err(RagError::InvalidInput(format!(
                "got {} vectors but {} payloads",
                vectors.len(),
                chunks.len()
            )));
        }
        for (i, vector) in vectors.iter().enumerate() {
            self.check_vector(vector, &format!("vector {i}"))?;
        }

        let mut storage = self.storage.write().await;
        storage.vectors.reserve(vectors.len() * self.dimensions);
        for vector in &vectors {
            storage.vectors.extend(normalize(vector));
        }
        storage.entries.extend(chunks);

        debug!(added = vectors.len(), total = storage.entries.len(), "appended to flat index");
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.check_vector(query, "query vector")?;

        let storage = self.storage.read().await;
        if k == 0 || storage.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query = normalize(query);
        let mut scored: Vec<(usize, f32)> = storage
            .vectors
            .chunks_exact(self.dimensions)
            .map(|row| dot(row, &query))
            .enumerate()
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_rank);
            scored.truncate(k);
        }
        scored.sort_by(by_rank);

        Ok(scored
            .into_iter()
            .map(|(position, score)| {
                let entry = &storage.entries[position];
                SearchResult { score, text: entry.text.clone(), metadata: entry.metadata.clone() }
            })
            .collect())
    }

    async fn len(&self) -> usize {
        self.storage.read().await.entries.len()
    }
}
