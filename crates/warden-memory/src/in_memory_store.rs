use std::collections::HashMap;
use std::sync::RwLock;

use crate::access::Predicate;
use crate::types::{AccessLabel, ChunkId};
use crate::vector_store::{
    BoxFuture, DeleteSelector, IndexEntry, IndexedVector, RetrievalResult, VectorIndex,
    VectorStoreError, check_batch, check_query, cosine_similarity, rank,
};

struct StoredEntry {
    /// Position of first insertion; replacing an entry keeps it.
    seq: u64,
    source_id: String,
    sequence_index: usize,
    vector: Vec<f32>,
    text: String,
    access_label: AccessLabel,
}

impl StoredEntry {
    fn to_index_entry(&self, chunk_id: ChunkId) -> IndexEntry {
        IndexEntry {
            chunk_id,
            source_id: self.source_id.clone(),
            sequence_index: self.sequence_index,
            text: self.text.clone(),
            access_label: self.access_label.clone(),
        }
    }
}

#[derive(Default)]
struct Entries {
    by_id: HashMap<ChunkId, StoredEntry>,
    next_seq: u64,
}

/// Process-local index with exact cosine search. Lost on restart.
pub struct InMemoryVectorIndex {
    dimension: usize,
    entries: RwLock<Entries>,
}

impl InMemoryVectorIndex {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(Entries::default()),
        }
    }
}

impl std::fmt::Debug for InMemoryVectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorIndex")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl VectorIndex for InMemoryVectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn upsert(&self, entries: Vec<IndexedVector>) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            check_batch(self.dimension, &entries)?;
            let mut store = self
                .entries
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            // Validated above; the batch is applied under one write lock so
            // readers see either none or all of it.
            for e in entries {
                let existing = store.by_id.get(&e.chunk_id).map(|se| se.seq);
                let seq = if let Some(seq) = existing {
                    seq
                } else {
                    store.next_seq += 1;
                    store.next_seq
                };
                store.by_id.insert(
                    e.chunk_id,
                    StoredEntry {
                        seq,
                        source_id: e.source_id,
                        sequence_index: e.sequence_index,
                        vector: e.embedding,
                        text: e.text,
                        access_label: e.access_label,
                    },
                );
            }
            Ok(())
        })
    }

    fn query(
        &self,
        vector: Vec<f32>,
        predicate: &Predicate,
        k: usize,
    ) -> BoxFuture<'_, Result<Vec<RetrievalResult>, VectorStoreError>> {
        let predicate = predicate.clone();
        Box::pin(async move {
            check_query(self.dimension, &vector)?;
            if k == 0 {
                return Ok(Vec::new());
            }
            let store = self
                .entries
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;

            let scored: Vec<_> = store
                .by_id
                .iter()
                .filter(|(_, se)| predicate.matches(&se.access_label))
                .map(|(id, se)| (cosine_similarity(&vector, &se.vector), se.seq, (*id, se)))
                .collect();

            Ok(rank(scored, k)
                .into_iter()
                .map(|(score, (chunk_id, se))| RetrievalResult {
                    chunk_id,
                    source_id: se.source_id.clone(),
                    text: se.text.clone(),
                    access_label: se.access_label.clone(),
                    score,
                })
                .collect())
        })
    }

    fn delete(&self, selector: DeleteSelector) -> BoxFuture<'_, Result<usize, VectorStoreError>> {
        Box::pin(async move {
            let mut store = self
                .entries
                .write()
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            let before = store.by_id.len();
            match selector {
                DeleteSelector::Ids(ids) => {
                    for id in ids {
                        store.by_id.remove(&id);
                    }
                }
                DeleteSelector::Matching(predicate) => {
                    store.by_id.retain(|_, se| !predicate.matches(&se.access_label));
                }
                DeleteSelector::Source(source_id) => {
                    store.by_id.retain(|_, se| se.source_id != source_id);
                }
            }
            Ok(before - store.by_id.len())
        })
    }

    fn count(&self, predicate: &Predicate) -> BoxFuture<'_, Result<usize, VectorStoreError>> {
        let predicate = predicate.clone();
        Box::pin(async move {
            let store = self
                .entries
                .read()
                .map_err(|e| VectorStoreError::Scroll(e.to_string()))?;
            Ok(store
                .by_id
                .values()
                .filter(|se| predicate.matches(&se.access_label))
                .count())
        })
    }

    fn list(
        &self,
        predicate: &Predicate,
    ) -> BoxFuture<'_, Result<Vec<IndexEntry>, VectorStoreError>> {
        let predicate = predicate.clone();
        Box::pin(async move {
            let store = self
                .entries
                .read()
                .map_err(|e| VectorStoreError::Scroll(e.to_string()))?;
            let mut out: Vec<IndexEntry> = store
                .by_id
                .iter()
                .filter(|(_, se)| predicate.matches(&se.access_label))
                .map(|(id, se)| se.to_index_entry(*id))
                .collect();
            out.sort_by(|a, b| {
                a.source_id
                    .cmp(&b.source_id)
                    .then(a.sequence_index.cmp(&b.sequence_index))
            });
            Ok(out)
        })
    }
}
