//! Flat L2 vector index over chunk embeddings.
//!
//! Chunks and vectors live in lockstep insertion order: vector position `i`
//! always maps back to chunk `i`. The index is rebuilt wholesale on every
//! ingestion; there is no incremental add and no persistence.

use serde::Serialize;

use crate::chunker::Chunk;
use crate::embeddings::TextEmbedder;
use crate::error::ModelError;

/// A retrieved chunk with its similarity score, higher meaning more similar.
/// Ephemeral, produced per query.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub similarity: f32,
}

/// Exhaustive nearest-neighbor structure under squared Euclidean distance.
#[derive(Debug, Default)]
struct VectorIndex {
    dim: usize,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
        }
    }

    fn push(&mut self, vector: Vec<f32>) -> Result<(), ModelError> {
        if vector.len() != self.dim {
            return Err(ModelError::DimensionMismatch {
                expected: self.dim,
                got: vector.len(),
            });
        }
        self.vectors.push(vector);
        Ok(())
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    /// The `k` nearest stored vectors, as (position, squared distance) pairs
    /// in ascending distance order.
    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, squared_l2(query, v)))
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Convert an L2 distance to a similarity score in (0, 1], monotonically
/// decreasing in distance. A monotone rescaling only: scores are not
/// comparable across different embedding models or dimensionalities.
fn distance_to_similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

/// Owns the chunk sequence and its vector index as one atomic unit.
pub struct EmbeddingIndex<E> {
    embedder: E,
    dim: usize,
    chunks: Vec<Chunk>,
    vectors: VectorIndex,
}

impl<E: TextEmbedder> EmbeddingIndex<E> {
    pub fn new(embedder: E, dim: usize) -> Self {
        Self {
            embedder,
            dim,
            chunks: Vec::new(),
            vectors: VectorIndex::new(dim),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Embed every chunk and replace the prior index wholesale. Builds into
    /// fresh storage and swaps only after all chunks are embedded, so an
    /// embedding failure partway leaves the previous index usable.
    pub async fn build(&mut self, chunks: Vec<Chunk>) -> Result<usize, ModelError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(ModelError::EmbeddingCountMismatch {
                expected: chunks.len(),
                got: embeddings.len(),
            });
        }

        let mut vectors = VectorIndex::new(self.dim);
        for embedding in embeddings {
            vectors.push(embedding)?;
        }

        let count = chunks.len();
        self.chunks = chunks;
        self.vectors = vectors;

        tracing::info!(chunks = count, "embedding index rebuilt");
        Ok(count)
    }

    /// Retrieve the `top_k` chunks nearest to the query, best first. An
    /// empty or unbuilt index yields an empty result, not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, ModelError> {
        if self.chunks.is_empty() {
            return Ok(vec![]);
        }

        let query_embedding = self.embedder.embed_query(query).await?;
        if query_embedding.len() != self.dim {
            return Err(ModelError::DimensionMismatch {
                expected: self.dim,
                got: query_embedding.len(),
            });
        }

        let k = top_k.min(self.vectors.len());
        let results = self
            .vectors
            .search(&query_embedding, k)
            .into_iter()
            .map(|(position, distance)| RetrievalResult {
                chunk: self.chunks[position].clone(),
                similarity: distance_to_similarity(distance),
            })
            .collect();

        Ok(results)
    }
}
