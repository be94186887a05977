//! Document sources, chunking and ingestion.

pub mod error;
pub mod loader;
pub mod pipeline;
pub mod source;
pub mod splitter;
pub mod tokenizer;
pub mod types;

use std::path::Path;

pub use error::DocumentError;
pub use loader::TextLoader;
pub use pipeline::{DocumentFailure, FailureStage, IngestionPipeline, IngestionReport};
pub use source::{DirectorySource, DocumentSource, SourceItem, StaticSource};
pub use splitter::{SplitterConfig, TextSplitter};
#[cfg(feature = "hf-tokenizer")]
pub use tokenizer::HfTokenizer;
pub use tokenizer::{Tokenizer, WordTokenizer};
pub use types::{Chunk, Document};

use crate::vector_store::BoxFuture;

/// Default maximum file size: 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Reads one file into text.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> BoxFuture<'_, Result<String, DocumentError>>;

    fn supported_extensions(&self) -> &[&str];
}
