use std::path::Path;

use super::{DEFAULT_MAX_FILE_SIZE, DocumentError, DocumentLoader};
use crate::vector_store::BoxFuture;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Markdown and plain-text files, read as UTF-8 with any leading BOM removed.
#[derive(Debug, Clone, Copy)]
pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for TextLoader {
    fn load(&self, path: &Path) -> BoxFuture<'_, Result<String, DocumentError>> {
        let path = path.to_owned();
        Box::pin(async move {
            let size = tokio::fs::metadata(&path).await?.len();
            if size > self.max_file_size {
                return Err(DocumentError::FileTooLarge {
                    size,
                    limit: self.max_file_size,
                });
            }
            let bytes = tokio::fs::read(&path).await?;
            let mut text = String::from_utf8(bytes)
                .map_err(|_| DocumentError::NotUtf8(path.display().to_string()))?;
            if text.starts_with(BYTE_ORDER_MARK) {
                text.drain(..BYTE_ORDER_MARK.len_utf8());
            }
            Ok(text)
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["md", "markdown", "txt"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn load_bytes(bytes: &[u8]) -> Result<String, DocumentError> {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.md");
        std::fs::write(&file, bytes).unwrap();
        TextLoader::default().load(&file).await
    }

    #[tokio::test]
    async fn reads_markdown_verbatim() {
        let text = load_bytes(b"# Leave\n\nTwenty days.").await.unwrap();
        assert_eq!(text, "# Leave\n\nTwenty days.");
    }

    #[tokio::test]
    async fn strips_leading_bom() {
        let text = load_bytes("\u{feff}Expenses".as_bytes()).await.unwrap();
        assert_eq!(text, "Expenses");
    }

    #[tokio::test]
    async fn rejects_non_utf8() {
        let err = load_bytes(&[0xff, 0xfe, 0x00]).await.unwrap_err();
        assert!(matches!(err, DocumentError::NotUtf8(p) if p.ends_with("doc.md")));
    }

    #[tokio::test]
    async fn missing_file_is_io() {
        let err = TextLoader::default()
            .load(Path::new("/nonexistent/finance/q3.md"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Io(_)));
    }

    #[tokio::test]
    async fn size_limit_is_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("short.txt");
        std::fs::write(&file, "abc").unwrap();

        assert!(TextLoader { max_file_size: 3 }.load(&file).await.is_ok());
        let err = TextLoader { max_file_size: 2 }.load(&file).await.unwrap_err();
        assert!(matches!(err, DocumentError::FileTooLarge { size: 3, limit: 2 }));
    }
}
