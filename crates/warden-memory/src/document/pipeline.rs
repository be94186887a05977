use std::sync::Arc;
use std::time::Instant;

use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use warden_llm::Embedder;

use super::source::DocumentSource;
use super::types::Document;
use super::{DocumentError, TextSplitter};
use crate::vector_store::{IndexedVector, VectorIndex, VectorStoreError};

const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Load,
    Chunking,
    Embedding,
    IndexWrite,
}

/// Why one document was not indexed. Nothing of it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    pub source_id: String,
    pub stage: FailureStage,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    pub documents_seen: usize,
    pub documents_indexed: usize,
    /// Chunks newly written or overwritten in this run.
    pub chunks_indexed: usize,
    pub failures: Vec<DocumentFailure>,
    pub duration_ms: u64,
}

/// Chunk, embed and index documents.
///
/// Each document lands with a single upsert, so it is either fully indexed
/// or not at all. Chunk ids are derived from source id and position, so
/// re-running over an unchanged source overwrites instead of duplicating.
pub struct IngestionPipeline {
    splitter: TextSplitter,
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    concurrency: usize,
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("splitter", &self.splitter)
            .field("embedder", &self.embedder)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl IngestionPipeline {
    #[must_use]
    pub fn new(splitter: TextSplitter, embedder: Embedder, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            splitter,
            embedder,
            index,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Maximum in-flight embedding calls per document.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Ingest one document: split, embed every chunk, upsert the batch.
    /// Returns the number of chunks written.
    ///
    /// # Errors
    ///
    /// The first embedding failure stops the document before anything is
    /// written. Index write failures leave no partial document behind.
    pub async fn ingest(&self, document: &Document) -> Result<usize, DocumentError> {
        if self.embedder.dimension() != self.index.dimension() {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: self.embedder.dimension(),
            }
            .into());
        }

        let chunks = self.splitter.split(document)?;
        if chunks.is_empty() {
            tracing::debug!(source_id = %document.source_id, "document has no tokens");
            return Ok(0);
        }

        let embeddings: Vec<Vec<f32>> =
            futures::stream::iter(chunks.iter().map(|c| self.embedder.embed(&c.text)))
                .buffered(self.concurrency)
                .try_collect()
                .await?;

        let entries: Vec<IndexedVector> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedVector {
                chunk_id: chunk.chunk_id,
                source_id: chunk.parent_source_id,
                sequence_index: chunk.sequence_index,
                embedding,
                text: chunk.text,
                access_label: chunk.access_label,
            })
            .collect();

        let count = entries.len();
        self.index.upsert(entries).await?;
        tracing::debug!(source_id = %document.source_id, chunks = count, "document indexed");
        Ok(count)
    }

    /// Ingest every document of `source`.
    ///
    /// Per-document failures are collected in the report and the run
    /// continues.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be listed, or on a configuration
    /// error (such as a dimension mismatch) that would fail every document.
    pub async fn run(
        &self,
        source: &(dyn DocumentSource + '_),
    ) -> Result<IngestionReport, DocumentError> {
        let start = Instant::now();
        let mut report = IngestionReport::default();

        for item in source.list().await? {
            report.documents_seen += 1;
            let document = match item {
                Ok(document) => document,
                Err(failure) => {
                    report.failures.push(failure);
                    continue;
                }
            };

            match self.ingest(&document).await {
                Ok(count) => {
                    report.documents_indexed += 1;
                    report.chunks_indexed += count;
                    tracing::info!(
                        source_id = %document.source_id,
                        access_label = %document.access_label,
                        chunks = count,
                    );
                }
                Err(e) if e.is_configuration() => return Err(e),
                Err(e) => {
                    tracing::warn!(source_id = %document.source_id, error = %e, "document failed");
                    report.failures.push(DocumentFailure {
                        source_id: document.source_id,
                        stage: stage_of(&e),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            documents = report.documents_seen,
            chunks = report.chunks_indexed,
            failures = report.failures.len(),
            duration_ms = report.duration_ms,
            "ingestion finished"
        );
        Ok(report)
    }
}

fn stage_of(error: &DocumentError) -> FailureStage {
    match error {
        DocumentError::Embedding(_) => FailureStage::Embedding,
        DocumentError::Index(_) => FailureStage::IndexWrite,
        DocumentError::Tokenizer(_) | DocumentError::InvalidSplitter(_) => FailureStage::Chunking,
        _ => FailureStage::Load,
    }
}
