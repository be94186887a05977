use std::future::Future;
use std::pin::Pin;

use crate::access::Predicate;
use crate::types::{AccessLabel, ChunkId};

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("vector dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("delete error: {0}")]
    Delete(String),
    #[error("scroll error: {0}")]
    Scroll(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl VectorStoreError {
    /// Errors that no retry or per-document skip can fix.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. })
    }
}

/// One embedded chunk as written to an index.
#[derive(Debug, Clone)]
pub struct IndexedVector {
    pub chunk_id: ChunkId,
    pub source_id: String,
    pub sequence_index: usize,
    pub embedding: Vec<f32>,
    pub text: String,
    pub access_label: AccessLabel,
}

/// A ranked hit. Never persisted.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunk_id: ChunkId,
    pub source_id: String,
    pub text: String,
    pub access_label: AccessLabel,
    pub score: f32,
}

/// Stored entry without its vector, as returned by [`VectorIndex::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub chunk_id: ChunkId,
    pub source_id: String,
    pub sequence_index: usize,
    pub text: String,
    pub access_label: AccessLabel,
}

#[derive(Debug, Clone)]
pub enum DeleteSelector {
    Ids(Vec<ChunkId>),
    Matching(Predicate),
    /// Every chunk whose parent document is `source_id`.
    Source(String),
}

/// Boxed future returned by the object-safe store traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable store of access-labelled chunk embeddings.
///
/// Implementations filter by predicate before ranking, so a query never
/// returns an entry the predicate rejects and never returns fewer hits than
/// are visible (up to `k`). Equal scores keep insertion order where the
/// backend can express it.
pub trait VectorIndex: Send + Sync {
    /// Vector length every entry and query must have.
    fn dimension(&self) -> usize;

    /// Insert or replace entries by chunk id. All or nothing per call.
    fn upsert(&self, entries: Vec<IndexedVector>) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Up to `k` nearest entries whose label satisfies `predicate`, best first.
    fn query(
        &self,
        vector: Vec<f32>,
        predicate: &Predicate,
        k: usize,
    ) -> BoxFuture<'_, Result<Vec<RetrievalResult>, VectorStoreError>>;

    /// Remove matching entries and return how many were removed. Matching
    /// nothing is not an error.
    fn delete(&self, selector: DeleteSelector) -> BoxFuture<'_, Result<usize, VectorStoreError>>;

    fn count(&self, predicate: &Predicate) -> BoxFuture<'_, Result<usize, VectorStoreError>>;

    /// Entries visible under `predicate`, ordered by source id then sequence.
    fn list(
        &self,
        predicate: &Predicate,
    ) -> BoxFuture<'_, Result<Vec<IndexEntry>, VectorStoreError>>;
}

/// Reject any entry whose vector length differs from `dimension`.
pub(crate) fn check_batch(
    dimension: usize,
    entries: &[IndexedVector],
) -> Result<(), VectorStoreError> {
    match entries.iter().find(|e| e.embedding.len() != dimension) {
        Some(bad) => Err(VectorStoreError::DimensionMismatch {
            expected: dimension,
            actual: bad.embedding.len(),
        }),
        None => Ok(()),
    }
}

pub(crate) fn check_query(dimension: usize, vector: &[f32]) -> Result<(), VectorStoreError> {
    if vector.len() == dimension {
        Ok(())
    } else {
        Err(VectorStoreError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
        })
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Sort hits by descending score, then ascending insertion sequence, and keep `k`.
pub(crate) fn rank<T>(mut scored: Vec<(f32, u64, T)>, k: usize) -> Vec<(f32, T)> {
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.truncate(k);
    scored.into_iter().map(|(score, _, item)| (score, item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn rank_breaks_ties_by_sequence() {
        let ranked = rank(vec![(0.5, 2, "late"), (0.9, 3, "best"), (0.5, 1, "early")], 3);
        let order: Vec<_> = ranked.into_iter().map(|(_, s)| s).collect();
        assert_eq!(order, vec!["best", "early", "late"]);
    }

    #[test]
    fn rank_truncates() {
        let ranked = rank(vec![(0.1, 0, 'a'), (0.2, 1, 'b'), (0.3, 2, 'c')], 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].1, 'c');
    }

    #[test]
    fn query_dimension_checked() {
        assert!(check_query(3, &[0.0; 3]).is_ok());
        assert!(matches!(
            check_query(3, &[0.0; 2]),
            Err(VectorStoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }
}
