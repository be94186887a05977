//! Token boundaries for chunking.
//!
//! A tokenizer reports the byte span of every token in a text. Chunks are cut
//! on token counts but always copy the original text between token
//! boundaries, so no content is rewritten.

use std::ops::Range;

use unicode_segmentation::UnicodeSegmentation;

use super::DocumentError;

pub trait Tokenizer: Send + Sync {
    /// Byte ranges of each token, in order and non-overlapping.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Tokenizer`] if the text cannot be encoded.
    fn spans(&self, text: &str) -> Result<Vec<Range<usize>>, DocumentError>;

    fn name(&self) -> &str;
}

/// Unicode word-boundary tokenizer (UAX #29). Words and punctuation are
/// tokens, whitespace is not.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn spans(&self, text: &str) -> Result<Vec<Range<usize>>, DocumentError> {
        Ok(text
            .split_word_bound_indices()
            .filter(|(_, seg)| !seg.trim().is_empty())
            .map(|(start, seg)| start..start + seg.len())
            .collect())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "words"
    }
}

/// Subword tokenizer loaded from a `tokenizer.json`, matching the token
/// counts of the embedding model.
#[cfg(feature = "hf-tokenizer")]
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    name: String,
}

#[cfg(feature = "hf-tokenizer")]
impl HfTokenizer {
    /// # Errors
    ///
    /// Returns [`DocumentError::Tokenizer`] if the file cannot be loaded.
    pub fn from_file(path: &std::path::Path) -> Result<Self, DocumentError> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| DocumentError::Tokenizer(format!("{}: {e}", path.display())))?;
        Ok(Self {
            inner,
            name: path.display().to_string(),
        })
    }
}

#[cfg(feature = "hf-tokenizer")]
impl std::fmt::Debug for HfTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HfTokenizer")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "hf-tokenizer")]
impl Tokenizer for HfTokenizer {
    fn spans(&self, text: &str) -> Result<Vec<Range<usize>>, DocumentError> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| DocumentError::Tokenizer(format!("encode failed: {e}")))?;
        let mut spans = Vec::with_capacity(encoding.get_offsets().len());
        let mut last_end = 0;
        for &(start, end) in encoding.get_offsets() {
            // Skip empty and overlapping spans (byte-fallback pieces share offsets).
            if start >= end || start < last_end {
                continue;
            }
            spans.push(start..end);
            last_end = end;
        }
        Ok(spans)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
