/// Failure in the conversation store or the SQLite layer beneath it.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("vector index: {0}")]
    VectorStore(#[from] crate::vector_store::VectorStoreError),

    #[error("row count out of range: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),

    #[error("corrupt conversation record: {0}")]
    Corrupt(String),

    #[error("session lock poisoned")]
    Poisoned,
}
