mod collection;
mod payload;

use qdrant_client::qdrant::{Condition, Filter, PointId};

use crate::access::Predicate;
use crate::vector_store::{
    BoxFuture, DeleteSelector, IndexEntry, IndexedVector, RetrievalResult, VectorIndex,
    VectorStoreError, check_batch, check_query,
};
use collection::Collection;

/// Vector index backed by a Qdrant collection.
///
/// The access predicate is sent as a payload filter, so Qdrant applies it
/// during the HNSW search. Equal scores are ordered by source id and
/// sequence within one result page only.
#[derive(Debug, Clone)]
pub struct QdrantVectorIndex {
    collection: Collection,
    dimension: usize,
}

impl QdrantVectorIndex {
    /// Connect to `collection` at `url`, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns [`VectorStoreError::DimensionMismatch`] if the collection
    /// exists with another vector size, or a connection error.
    pub async fn connect(
        url: &str,
        collection: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, VectorStoreError> {
        let collection = Collection::connect(url, collection.into())?;
        let wanted =
            u64::try_from(dimension).map_err(|e| VectorStoreError::Collection(e.to_string()))?;

        match collection.vector_size().await? {
            Some(size) if size == wanted => {}
            Some(size) => {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: usize::try_from(size).unwrap_or(usize::MAX),
                    actual: dimension,
                });
            }
            None => {
                collection
                    .create(wanted, &[payload::LABEL, payload::SOURCE])
                    .await?;
                tracing::info!(
                    collection = collection.name(),
                    dimension,
                    "created qdrant collection"
                );
            }
        }
        Ok(Self {
            collection,
            dimension,
        })
    }
}

/// `None` means no filter. An empty label set becomes a filter nothing can match.
fn label_filter(predicate: &Predicate) -> Option<Filter> {
    let labels: Vec<String> = predicate
        .labels()?
        .iter()
        .map(|l| l.as_str().to_owned())
        .collect();
    let condition = if labels.is_empty() {
        // NUL is never a valid label
        Condition::matches(payload::LABEL, "\u{0}".to_owned())
    } else {
        Condition::matches(payload::LABEL, labels)
    };
    Some(Filter::must([condition]))
}

fn selector_filter(selector: DeleteSelector) -> Filter {
    match selector {
        DeleteSelector::Ids(ids) => Filter::must([Condition::has_id(
            ids.iter().map(|id| PointId::from(id.to_string())),
        )]),
        DeleteSelector::Source(source_id) => {
            Filter::must([Condition::matches(payload::SOURCE, source_id)])
        }
        DeleteSelector::Matching(predicate) => label_filter(&predicate).unwrap_or_default(),
    }
}

fn by_score_then_position(a: &RetrievalResult, b: &RetrievalResult) -> std::cmp::Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.source_id.cmp(&b.source_id))
}

impl VectorIndex for QdrantVectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn upsert(&self, entries: Vec<IndexedVector>) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            check_batch(self.dimension, &entries)?;
            if entries.is_empty() {
                return Ok(());
            }
            let points = entries
                .into_iter()
                .map(payload::to_point)
                .collect::<Result<Vec<_>, _>>()?;
            self.collection.upsert(points).await
        })
    }

    fn query(
        &self,
        vector: Vec<f32>,
        predicate: &Predicate,
        k: usize,
    ) -> BoxFuture<'_, Result<Vec<RetrievalResult>, VectorStoreError>> {
        let filter = label_filter(predicate);
        Box::pin(async move {
            check_query(self.dimension, &vector)?;
            if k == 0 {
                return Ok(Vec::new());
            }
            let limit = u64::try_from(k).map_err(|e| VectorStoreError::Search(e.to_string()))?;

            let mut hits = Vec::with_capacity(k);
            for point in self.collection.search(vector, limit, filter).await? {
                let entry = payload::to_entry(point.id, &point.payload)?;
                hits.push((entry.sequence_index, RetrievalResult {
                    chunk_id: entry.chunk_id,
                    source_id: entry.source_id,
                    text: entry.text,
                    access_label: entry.access_label,
                    score: point.score,
                }));
            }
            hits.sort_by(|(sa, a), (sb, b)| by_score_then_position(a, b).then(sa.cmp(sb)));
            Ok(hits.into_iter().map(|(_, hit)| hit).collect())
        })
    }

    fn delete(&self, selector: DeleteSelector) -> BoxFuture<'_, Result<usize, VectorStoreError>> {
        Box::pin(async move {
            let removed = self.collection.delete(selector_filter(selector)).await?;
            usize::try_from(removed).map_err(|e| VectorStoreError::Delete(e.to_string()))
        })
    }

    fn count(&self, predicate: &Predicate) -> BoxFuture<'_, Result<usize, VectorStoreError>> {
        let filter = label_filter(predicate);
        Box::pin(async move {
            let n = self.collection.count(filter).await?;
            usize::try_from(n).map_err(|e| VectorStoreError::Scroll(e.to_string()))
        })
    }

    fn list(
        &self,
        predicate: &Predicate,
    ) -> BoxFuture<'_, Result<Vec<IndexEntry>, VectorStoreError>> {
        let filter = label_filter(predicate);
        Box::pin(async move {
            let mut entries = self
                .collection
                .scroll(filter)
                .await?
                .into_iter()
                .map(|p| payload::to_entry(p.id, &p.payload))
                .collect::<Result<Vec<_>, _>>()?;
            entries.sort_by(|a, b| {
                a.source_id
                    .cmp(&b.source_id)
                    .then(a.sequence_index.cmp(&b.sequence_index))
            });
            Ok(entries)
        })
    }
}
