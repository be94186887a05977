use std::path::Path;
use std::sync::Arc;

use warden_llm::embedder::{EmbedFn, EmbedFuture};
use warden_llm::mock::MockProvider;
use warden_llm::{Embedder, LlmProvider};
use warden_memory::document::{
    DirectorySource, IngestionPipeline, SplitterConfig, TextSplitter,
};
use warden_memory::{
    AccessLabel, DeleteSelector, InMemoryVectorIndex, Predicate, SqliteStore, SqliteVectorIndex,
    VectorIndex,
};

const DIM: usize = 64;

fn embedder() -> Embedder {
    let provider = Arc::new(MockProvider::default().with_hashed_embeddings(DIM));
    let embed_fn: EmbedFn = Arc::new(move |text: &str| -> EmbedFuture {
        let p = Arc::clone(&provider);
        let owned = text.to_owned();
        Box::pin(async move { p.embed(&owned).await })
    });
    Embedder::new(embed_fn, DIM)
}

fn pipeline(index: Arc<dyn VectorIndex>) -> IngestionPipeline {
    let splitter = TextSplitter::new(SplitterConfig {
        chunk_size: 40,
        chunk_overlap: 10,
    })
    .unwrap();
    IngestionPipeline::new(splitter, embedder(), index).with_concurrency(2)
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn corpus(root: &Path) {
    let payroll = "Quarterly payroll figures and salary bands for finance staff. ".repeat(12);
    let brand = "Brand guidelines describe logo usage and campaign tone. ".repeat(12);
    let holidays = "The office is closed on public holidays for everyone. ".repeat(3);
    write(root, "finance/payroll.md", &payroll);
    write(root, "marketing/brand.md", &brand);
    write(root, "general/holidays.md", &holidays);
}

async fn query_sources(index: &dyn VectorIndex, text: &str, role: &str) -> Vec<String> {
    let vector = embedder().embed(text).await.unwrap();
    index
        .query(vector, &Predicate::for_role(role), 10)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.source_id)
        .collect()
}

#[tokio::test]
async fn directory_ingestion_is_idempotent_on_sqlite() {
    let docs = tempfile::tempdir().unwrap();
    corpus(docs.path());
    let db = tempfile::NamedTempFile::new().unwrap();
    let store = SqliteStore::new(db.path().to_str().unwrap()).await.unwrap();
    let index: Arc<dyn VectorIndex> = Arc::new(SqliteVectorIndex::open(store, DIM).await.unwrap());
    let pipeline = pipeline(Arc::clone(&index));
    let source = DirectorySource::new(docs.path());

    let first = pipeline.run(&source).await.unwrap();
    let after_first = index.count(&Predicate::Unrestricted).await.unwrap();
    let second = pipeline.run(&source).await.unwrap();
    let after_second = index.count(&Predicate::Unrestricted).await.unwrap();

    assert_eq!(first.documents_indexed, 3);
    assert!(first.failures.is_empty());
    assert_eq!(first.chunks_indexed, after_first);
    assert_eq!(second.chunks_indexed, first.chunks_indexed);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn finance_chunks_never_reach_marketing() {
    let docs = tempfile::tempdir().unwrap();
    corpus(docs.path());
    let index: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::new(DIM));
    pipeline(Arc::clone(&index))
        .run(&DirectorySource::new(docs.path()))
        .await
        .unwrap();

    let marketing = query_sources(index.as_ref(), "payroll salary bands", "marketing").await;
    assert!(!marketing.is_empty());
    assert!(marketing.iter().all(|s| s != "finance/payroll.md"));

    let finance = query_sources(index.as_ref(), "payroll salary bands", "finance").await;
    assert_eq!(finance.first().map(String::as_str), Some("finance/payroll.md"));

    for role in ["finance", "marketing", "engineering", "unknown-role"] {
        let hits = query_sources(index.as_ref(), "public holidays office", role).await;
        assert!(
            hits.iter().any(|s| s == "general/holidays.md"),
            "general content hidden from {role}"
        );
    }
}

#[tokio::test]
async fn delete_by_source_then_reingest() {
    let docs = tempfile::tempdir().unwrap();
    corpus(docs.path());
    let index: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::new(DIM));
    let pipeline = pipeline(Arc::clone(&index));
    let source = DirectorySource::new(docs.path());
    pipeline.run(&source).await.unwrap();

    let brand = index
        .count(&Predicate::only(AccessLabel::new("marketing").unwrap()))
        .await
        .unwrap();
    let removed = index
        .delete(DeleteSelector::Source("marketing/brand.md".into()))
        .await
        .unwrap();
    assert_eq!(removed, brand);
    assert!(
        query_sources(index.as_ref(), "brand logo", "marketing")
            .await
            .iter()
            .all(|s| s != "marketing/brand.md")
    );

    pipeline.run(&source).await.unwrap();
    assert_eq!(
        index
            .count(&Predicate::only(AccessLabel::new("marketing").unwrap()))
            .await
            .unwrap(),
        brand
    );
}
