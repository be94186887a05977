use crate::types::{AccessLabel, ChunkId};

/// A source document. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source_id: String,
    pub access_label: AccessLabel,
    pub raw_text: String,
}

impl Document {
    #[must_use]
    pub fn new(
        source_id: impl Into<String>,
        access_label: AccessLabel,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            access_label,
            raw_text: raw_text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub parent_source_id: String,
    pub sequence_index: usize,
    pub text: String,
    pub access_label: AccessLabel,
}
