use std::ops::Range;
use std::sync::Arc;

use super::DocumentError;
use super::tokenizer::{Tokenizer, WordTokenizer};
use super::types::{Chunk, Document};
use crate::types::ChunkId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Maximum tokens per chunk.
    pub chunk_size: usize,
    /// Tokens repeated at the start of each following chunk.
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 256,
        }
    }
}

impl SplitterConfig {
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidSplitter`] unless `chunk_overlap < chunk_size`.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.chunk_size == 0 {
            return Err(DocumentError::InvalidSplitter(
                "chunk_size must be positive".into(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(DocumentError::InvalidSplitter(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Deterministic token-window splitter.
///
/// Windows of `chunk_size` tokens advance by `chunk_size - chunk_overlap`, so
/// consecutive chunks share exactly `chunk_overlap` tokens and a text of `L`
/// tokens yields `ceil((L - overlap) / (size - overlap))` chunks when
/// `L > size`, one chunk when `0 < L <= size`, and none when it has no tokens.
#[derive(Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
    tokenizer: Arc<dyn Tokenizer>,
}

impl std::fmt::Debug for TextSplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSplitter")
            .field("config", &self.config)
            .field("tokenizer", &self.tokenizer.name())
            .finish()
    }
}

impl TextSplitter {
    /// Splitter using the built-in word tokenizer.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidSplitter`] if the configuration is invalid.
    pub fn new(config: SplitterConfig) -> Result<Self, DocumentError> {
        Self::with_tokenizer(config, Arc::new(WordTokenizer))
    }

    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidSplitter`] if the configuration is invalid.
    pub fn with_tokenizer(
        config: SplitterConfig,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Result<Self, DocumentError> {
        config.validate()?;
        Ok(Self { config, tokenizer })
    }

    #[must_use]
    pub fn config(&self) -> SplitterConfig {
        self.config
    }

    /// Split raw text into overlapping token windows.
    ///
    /// # Errors
    ///
    /// Returns an error only if the tokenizer fails.
    pub fn split_text(&self, text: &str) -> Result<Vec<String>, DocumentError> {
        let spans = self.tokenizer.spans(text)?;
        Ok(windows(spans.len(), self.config)
            .map(|w| slice_window(text, &spans, w).to_owned())
            .collect())
    }

    /// Split a document into identified chunks carrying its access label.
    ///
    /// # Errors
    ///
    /// Returns an error only if the tokenizer fails.
    pub fn split(&self, document: &Document) -> Result<Vec<Chunk>, DocumentError> {
        Ok(self
            .split_text(&document.raw_text)?
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                chunk_id: ChunkId::derive(&document.source_id, i),
                parent_source_id: document.source_id.clone(),
                sequence_index: i,
                text,
                access_label: document.access_label.clone(),
            })
            .collect())
    }
}

/// Token index ranges of each window over `len` tokens.
fn windows(len: usize, config: SplitterConfig) -> impl Iterator<Item = Range<usize>> {
    let step = config.chunk_size - config.chunk_overlap;
    let mut start = 0;
    let mut done = len == 0;
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        let end = (start + config.chunk_size).min(len);
        let window = start..end;
        if end == len {
            done = true;
        } else {
            start += step;
        }
        Some(window)
    })
}

/// Original text from the first to the last token of `window`.
fn slice_window<'a>(text: &'a str, spans: &[Range<usize>], window: Range<usize>) -> &'a str {
    &text[spans[window.start].start..spans[window.end - 1].end]
}
