use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, PointId, PointStruct, RetrievedPoint,
    ScoredPoint, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder, vectors_config,
};
use qdrant_client::{Qdrant, QdrantError};

use crate::vector_store::VectorStoreError;

const SCROLL_PAGE: u32 = 256;

/// Maps a client error into the given [`VectorStoreError`] variant.
fn failed(kind: fn(String) -> VectorStoreError) -> impl Fn(QdrantError) -> VectorStoreError {
    move |e| kind(e.to_string())
}

/// A Qdrant client bound to one collection. Every write waits for the
/// change to be applied before returning.
#[derive(Clone)]
pub(super) struct Collection {
    client: Qdrant,
    name: String,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Collection {
    pub(super) fn connect(url: &str, name: String) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(failed(VectorStoreError::Connection))?;
        Ok(Self { client, name })
    }

    pub(super) fn name(&self) -> &str {
        &self.name
    }

    /// Vector size of the collection, `None` if it does not exist yet.
    pub(super) async fn vector_size(&self) -> Result<Option<u64>, VectorStoreError> {
        let connection = failed(VectorStoreError::Connection);
        if !self
            .client
            .collection_exists(&self.name)
            .await
            .map_err(&connection)?
        {
            return Ok(None);
        }
        let info = self
            .client
            .collection_info(&self.name)
            .await
            .map_err(&connection)?;
        let config = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);
        match config {
            Some(vectors_config::Config::Params(params)) => Ok(Some(params.size)),
            _ => Err(VectorStoreError::Collection(format!(
                "collection {} does not use a single unnamed vector",
                self.name
            ))),
        }
    }

    /// Create a cosine collection with keyword indexes on `keyword_fields`.
    pub(super) async fn create(
        &self,
        vector_size: u64,
        keyword_fields: &[&str],
    ) -> Result<(), VectorStoreError> {
        let collection = failed(VectorStoreError::Collection);
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.name)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
            .map_err(&collection)?;
        for field in keyword_fields {
            self.client
                .create_field_index(
                    CreateFieldIndexCollectionBuilder::new(&self.name, *field, FieldType::Keyword)
                        .wait(true),
                )
                .await
                .map_err(&collection)?;
        }
        Ok(())
    }

    pub(super) async fn upsert(&self, points: Vec<PointStruct>) -> Result<(), VectorStoreError> {
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.name, points).wait(true))
            .await
            .map_err(failed(VectorStoreError::Upsert))?;
        Ok(())
    }

    pub(super) async fn search(
        &self,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<Filter>,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let mut request = SearchPointsBuilder::new(&self.name, vector, limit).with_payload(true);
        if let Some(filter) = filter {
            request = request.filter(filter);
        }
        let response = self
            .client
            .search_points(request)
            .await
            .map_err(failed(VectorStoreError::Search))?;
        Ok(response.result)
    }

    pub(super) async fn count(&self, filter: Option<Filter>) -> Result<u64, VectorStoreError> {
        let mut request = CountPointsBuilder::new(&self.name).exact(true);
        if let Some(filter) = filter {
            request = request.filter(filter);
        }
        let response = self
            .client
            .count(request)
            .await
            .map_err(failed(VectorStoreError::Scroll))?;
        Ok(response.result.map_or(0, |r| r.count))
    }

    /// Delete every point matching `filter` and return how many there were.
    pub(super) async fn delete(&self, filter: Filter) -> Result<u64, VectorStoreError> {
        let matched = self.count(Some(filter.clone())).await?;
        if matched > 0 {
            self.client
                .delete_points(DeletePointsBuilder::new(&self.name).points(filter).wait(true))
                .await
                .map_err(failed(VectorStoreError::Delete))?;
        }
        Ok(matched)
    }

    /// Every point matching `filter`, payloads only, following scroll pages to the end.
    pub(super) async fn scroll(
        &self,
        filter: Option<Filter>,
    ) -> Result<Vec<RetrievedPoint>, VectorStoreError> {
        let mut points = Vec::new();
        let mut next: Option<PointId> = None;
        loop {
            let mut request = ScrollPointsBuilder::new(&self.name)
                .with_payload(true)
                .with_vectors(false)
                .limit(SCROLL_PAGE);
            if let Some(filter) = &filter {
                request = request.filter(filter.clone());
            }
            if let Some(offset) = next.take() {
                request = request.offset(offset);
            }

            let page = self
                .client
                .scroll(request)
                .await
                .map_err(failed(VectorStoreError::Scroll))?;
            points.extend(page.result);
            match page.next_page_offset {
                Some(offset) => next = Some(offset),
                None => return Ok(points),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_accepts_grpc_url() {
        let collection = Collection::connect("http://localhost:6334", "docs".into()).unwrap();
        assert_eq!(collection.name(), "docs");
        assert!(format!("{collection:?}").contains("docs"));
    }

    #[test]
    fn connect_rejects_garbage_url() {
        let err = Collection::connect("not a valid url", "docs".into()).unwrap_err();
        assert!(matches!(err, VectorStoreError::Connection(_)));
    }
}
