use sqlx::{QueryBuilder, Sqlite};

use super::SqliteStore;
use crate::access::Predicate;
use crate::types::{AccessLabel, ChunkId};
use crate::vector_store::{
    BoxFuture, DeleteSelector, IndexEntry, IndexedVector, RetrievalResult, VectorIndex,
    VectorStoreError, check_batch, check_query, cosine_similarity, rank,
};

const DIMENSION_KEY: &str = "dimension";

/// Durable vector index in `SQLite` with exact cosine search.
///
/// The label filter runs in SQL; scoring runs over the filtered rows only.
/// Suitable for corpora of up to a few hundred thousand chunks.
#[derive(Debug, Clone)]
pub struct SqliteVectorIndex {
    store: SqliteStore,
    dimension: usize,
}

type ChunkRow = (i64, String, String, String, String, Vec<u8>);
type EntryRow = (String, String, i64, String, String);

impl SqliteVectorIndex {
    /// Open the index, recording `dimension` on first use.
    ///
    /// # Errors
    ///
    /// Returns [`VectorStoreError::DimensionMismatch`] if the database was
    /// created with a different dimension, or a connection error.
    pub async fn open(store: SqliteStore, dimension: usize) -> Result<Self, VectorStoreError> {
        let recorded: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?")
                .bind(DIMENSION_KEY)
                .fetch_optional(store.pool())
                .await
                .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

        match recorded {
            Some(value) => {
                let existing: usize = value.parse().map_err(|_| {
                    VectorStoreError::Collection(format!("invalid recorded dimension {value:?}"))
                })?;
                if existing != dimension {
                    return Err(VectorStoreError::DimensionMismatch {
                        expected: existing,
                        actual: dimension,
                    });
                }
            }
            None => {
                sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?)")
                    .bind(DIMENSION_KEY)
                    .bind(dimension.to_string())
                    .execute(store.pool())
                    .await
                    .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
                tracing::info!(dimension, "initialized sqlite vector index");
            }
        }

        Ok(Self { store, dimension })
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn parse_chunk_id(s: &str) -> Result<ChunkId, VectorStoreError> {
    s.parse()
        .map_err(|e| VectorStoreError::Serialization(format!("chunk id {s:?}: {e}")))
}

fn parse_label(s: &str) -> Result<AccessLabel, VectorStoreError> {
    AccessLabel::new(s).map_err(|e| VectorStoreError::Serialization(e.to_string()))
}

/// Append a `WHERE` clause restricting `access_label` to the predicate.
fn push_predicate(qb: &mut QueryBuilder<'_, Sqlite>, predicate: &Predicate) {
    let Some(labels) = predicate.labels() else {
        return;
    };
    if labels.is_empty() {
        qb.push(" WHERE 0");
        return;
    }
    qb.push(" WHERE access_label IN (");
    let mut sep = qb.separated(", ");
    for label in labels {
        sep.push_bind(label.as_str().to_owned());
    }
    sep.push_unseparated(")");
}

impl VectorIndex for SqliteVectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn upsert(&self, entries: Vec<IndexedVector>) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            check_batch(self.dimension, &entries)?;
            let upsert_err = |e: sqlx::Error| VectorStoreError::Upsert(e.to_string());

            let mut tx = self.store.pool().begin().await.map_err(upsert_err)?;
            for e in &entries {
                let sequence_index = i64::try_from(e.sequence_index)
                    .map_err(|err| VectorStoreError::Serialization(err.to_string()))?;
                sqlx::query(
                    "INSERT INTO chunks (chunk_id, source_id, sequence_index, access_label, text, embedding) \
                     VALUES (?, ?, ?, ?, ?, ?) \
                     ON CONFLICT(chunk_id) DO UPDATE SET \
                        source_id = excluded.source_id, \
                        sequence_index = excluded.sequence_index, \
                        access_label = excluded.access_label, \
                        text = excluded.text, \
                        embedding = excluded.embedding",
                )
                .bind(e.chunk_id.to_string())
                .bind(&e.source_id)
                .bind(sequence_index)
                .bind(e.access_label.as_str())
                .bind(&e.text)
                .bind(encode_vector(&e.embedding))
                .execute(&mut *tx)
                .await
                .map_err(upsert_err)?;
            }
            // Dropping the transaction on any error above rolls it back.
            tx.commit().await.map_err(upsert_err)?;
            tracing::debug!(entries = entries.len(), "sqlite upsert committed");
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

            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT seq, chunk_id, source_id, access_label, text, embedding FROM chunks",
            );
            push_predicate(&mut qb, &predicate);
            let rows: Vec<ChunkRow> = qb
                .build_query_as()
                .fetch_all(self.store.pool())
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;

            let scored: Vec<_> = rows
                .into_iter()
                .map(|(seq, chunk_id, source_id, label, text, blob)| {
                    let score = cosine_similarity(&vector, &decode_vector(&blob));
                    let seq = u64::try_from(seq).unwrap_or_default();
                    (score, seq, (chunk_id, source_id, label, text))
                })
                .collect();

            rank(scored, k)
                .into_iter()
                .map(|(score, (chunk_id, source_id, label, text))| {
                    Ok(RetrievalResult {
                        chunk_id: parse_chunk_id(&chunk_id)?,
                        source_id,
                        text,
                        access_label: parse_label(&label)?,
                        score,
                    })
                })
                .collect()
        })
    }

    fn delete(&self, selector: DeleteSelector) -> BoxFuture<'_, Result<usize, VectorStoreError>> {
        Box::pin(async move {
            let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM chunks");
            match selector {
                DeleteSelector::Ids(ids) => {
                    if ids.is_empty() {
                        return Ok(0);
                    }
                    qb.push(" WHERE chunk_id IN (");
                    let mut sep = qb.separated(", ");
                    for id in ids {
                        sep.push_bind(id.to_string());
                    }
                    sep.push_unseparated(")");
                }
                DeleteSelector::Matching(predicate) => push_predicate(&mut qb, &predicate),
                DeleteSelector::Source(source_id) => {
                    qb.push(" WHERE source_id = ");
                    qb.push_bind(source_id);
                }
            }
            let result = qb
                .build()
                .execute(self.store.pool())
                .await
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            usize::try_from(result.rows_affected())
                .map_err(|e| VectorStoreError::Delete(e.to_string()))
        })
    }

    fn count(&self, predicate: &Predicate) -> BoxFuture<'_, Result<usize, VectorStoreError>> {
        let predicate = predicate.clone();
        Box::pin(async move {
            let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM chunks");
            push_predicate(&mut qb, &predicate);
            let count: i64 = qb
                .build_query_scalar()
                .fetch_one(self.store.pool())
                .await
                .map_err(|e| VectorStoreError::Scroll(e.to_string()))?;
            usize::try_from(count).map_err(|e| VectorStoreError::Scroll(e.to_string()))
        })
    }

    fn list(
        &self,
        predicate: &Predicate,
    ) -> BoxFuture<'_, Result<Vec<IndexEntry>, VectorStoreError>> {
        let predicate = predicate.clone();
        Box::pin(async move {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT chunk_id, source_id, sequence_index, access_label, text FROM chunks",
            );
            push_predicate(&mut qb, &predicate);
            qb.push(" ORDER BY source_id, sequence_index");
            let rows: Vec<EntryRow> = qb
                .build_query_as()
                .fetch_all(self.store.pool())
                .await
                .map_err(|e| VectorStoreError::Scroll(e.to_string()))?;

            rows.into_iter()
                .map(|(chunk_id, source_id, sequence_index, label, text)| {
                    Ok(IndexEntry {
                        chunk_id: parse_chunk_id(&chunk_id)?,
                        source_id,
                        sequence_index: usize::try_from(sequence_index)
                            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?,
                        text,
                        access_label: parse_label(&label)?,
                    })
                })
                .collect()
        })
    }
}
