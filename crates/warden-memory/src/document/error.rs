use warden_llm::EmbedError;

use crate::types::LabelError;
use crate::vector_store::VectorStoreError;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} is not valid UTF-8 text")]
    NotUtf8(String),

    #[error("file too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("invalid access label: {0}")]
    Label(#[from] LabelError),

    #[error("{0} is not inside a labelled folder")]
    Unlabelled(String),

    #[error("invalid splitter configuration: {0}")]
    InvalidSplitter(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("index write failed: {0}")]
    Index(#[from] VectorStoreError),
}

impl DocumentError {
    /// Errors that would fail every document the same way.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Embedding(e) => e.is_configuration(),
            Self::Index(e) => e.is_configuration(),
            Self::InvalidSplitter(_) => true,
            _ => false,
        }
    }
}
