//! Access-labelled vector indexes, document ingestion and conversation
//! history.

pub mod access;
pub mod conversation;
pub mod document;
pub mod error;
pub mod in_memory_store;
pub mod qdrant;
pub mod sqlite;
pub mod types;
pub mod vector_store;

pub use access::Predicate;
pub use conversation::{
    ConversationStore, ConversationTurn, InMemoryConversationStore, TurnRole,
};
pub use error::MemoryError;
pub use in_memory_store::InMemoryVectorIndex;
pub use qdrant::QdrantVectorIndex;
pub use sqlite::{SqliteConversationStore, SqliteStore, SqliteVectorIndex};
pub use types::{AccessLabel, ChunkId, LabelError, SessionId};
pub use vector_store::{
    BoxFuture, DeleteSelector, IndexEntry, IndexedVector, RetrievalResult, VectorIndex,
    VectorStoreError,
};
