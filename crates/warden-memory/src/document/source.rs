use std::path::{Path, PathBuf};

use super::pipeline::{DocumentFailure, FailureStage};
use super::types::Document;
use super::{DocumentError, DocumentLoader, TextLoader};
use crate::types::AccessLabel;
use crate::vector_store::BoxFuture;

/// A listed document, or the reason it could not be read.
pub type SourceItem = Result<Document, DocumentFailure>;

/// Yields the documents of one ingestion run.
pub trait DocumentSource: Send + Sync {
    /// # Errors
    ///
    /// Fails as a whole only when the source itself is unavailable; unreadable
    /// individual documents are returned as failed items.
    fn list(&self) -> BoxFuture<'_, Result<Vec<SourceItem>, DocumentError>>;
}

/// Fixed in-memory document set.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    documents: Vec<Document>,
}

impl StaticSource {
    #[must_use]
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }
}

impl DocumentSource for StaticSource {
    fn list(&self) -> BoxFuture<'_, Result<Vec<SourceItem>, DocumentError>> {
        Box::pin(async move { Ok(self.documents.iter().cloned().map(Ok).collect()) })
    }
}

/// Folder tree where each file's parent folder names its access label.
///
/// `root/hr/handbook.md` becomes source `hr/handbook.md` labelled `hr`.
/// Files directly under `root` carry no label and are reported as failures.
/// Symbolic links are followed; broken links and unreadable folders are
/// reported as failures too. Hidden files and git-ignored paths are skipped.
#[derive(Debug, Clone)]
pub struct DirectorySource<L = TextLoader> {
    root: PathBuf,
    loader: L,
}

impl DirectorySource<TextLoader> {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_loader(root, TextLoader::default())
    }
}

impl<L: DocumentLoader> DirectorySource<L> {
    #[must_use]
    pub fn with_loader(root: impl Into<PathBuf>, loader: L) -> Self {
        Self {
            root: root.into(),
            loader,
        }
    }

    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.loader
                    .supported_extensions()
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(ext))
            })
    }

    async fn read(&self, path: &Path, source_id: &str) -> Result<Document, DocumentError> {
        let rel = Path::new(source_id);
        let label = rel
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .ok_or_else(|| DocumentError::Unlabelled(source_id.to_owned()))?;
        let access_label = AccessLabel::new(label)?;
        let raw_text = self.loader.load(path).await?;
        Ok(Document::new(source_id, access_label, raw_text))
    }
}

/// Path a walk error refers to, looking through depth and line wrappers.
fn walk_error_path(error: &ignore::Error) -> Option<&Path> {
    match error {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            walk_error_path(err)
        }
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        _ => None,
    }
}

fn source_id_for(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl<L: DocumentLoader> DocumentSource for DirectorySource<L> {
    fn list(&self) -> BoxFuture<'_, Result<Vec<SourceItem>, DocumentError>> {
        Box::pin(async move {
            if !tokio::fs::metadata(&self.root).await?.is_dir() {
                return Err(DocumentError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotADirectory,
                    format!("{} is not a directory", self.root.display()),
                )));
            }

            let mut files = Vec::new();
            let mut items = Vec::new();
            let walk = ignore::WalkBuilder::new(&self.root)
                .hidden(true)
                .git_ignore(true)
                .follow_links(true)
                .sort_by_file_name(|a, b| a.cmp(b))
                .build();
            for entry in walk {
                match entry {
                    Ok(entry) => {
                        if entry.file_type().is_some_and(|ft| ft.is_file())
                            && self.is_supported(entry.path())
                        {
                            files.push(entry.into_path());
                        }
                    }
                    Err(e) => {
                        let path = walk_error_path(&e);
                        // a dangling link to a file we would not read anyway is not a failure
                        if path.is_some_and(|p| p.extension().is_some() && !self.is_supported(p)) {
                            continue;
                        }
                        let source_id = path.map_or_else(
                            || self.root.display().to_string(),
                            |p| source_id_for(p.strip_prefix(&self.root).unwrap_or(p)),
                        );
                        tracing::warn!(%source_id, error = %e, "unreadable path");
                        items.push(Err(DocumentFailure {
                            source_id,
                            stage: FailureStage::Load,
                            reason: e.to_string(),
                        }));
                    }
                }
            }

            tracing::info!(root = %self.root.display(), files = files.len(), "listing documents");

            for path in files {
                let rel = path.strip_prefix(&self.root).unwrap_or(&path);
                let source_id = source_id_for(rel);
                let item = self.read(&path, &source_id).await.map_err(|e| {
                    tracing::warn!(%source_id, error = %e, "skipping document");
                    DocumentFailure {
                        source_id: source_id.clone(),
                        stage: FailureStage::Load,
                        reason: e.to_string(),
                    }
                });
                items.push(item);
            }
            Ok(items)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn folder_name_is_access_label() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hr/handbook.md", "vacation policy");
        write(dir.path(), "general/welcome.md", "hello all");
        write(dir.path(), "finance/q3/report.txt", "revenue");
        write(dir.path(), "hr/photo.png", "not text");

        let items = DirectorySource::new(dir.path()).list().await.unwrap();
        let docs: Vec<_> = items.into_iter().map(Result::unwrap).collect();
        let summary: Vec<_> = docs
            .iter()
            .map(|d| (d.source_id.as_str(), d.access_label.as_str()))
            .collect();
        assert_eq!(
            summary,
            [
                ("finance/q3/report.txt", "q3"),
                ("general/welcome.md", "general"),
                ("hr/handbook.md", "hr"),
            ]
        );
        assert_eq!(docs[2].raw_text, "vacation policy");
    }

    #[tokio::test]
    async fn root_level_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "stray.md", "no folder");
        write(dir.path(), "sales/deck.md", "pitch");

        let items = DirectorySource::new(dir.path()).list().await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().any(Result::is_ok));
        let failure = items.into_iter().find_map(Result::err).unwrap();
        assert_eq!(failure.source_id, "stray.md");
        assert_eq!(failure.stage, FailureStage::Load);
    }

    #[tokio::test]
    async fn oversize_file_is_per_document_failure() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hr/huge.md", "0123456789");
        write(dir.path(), "hr/small.md", "ok");

        let source =
            DirectorySource::with_loader(dir.path(), TextLoader { max_file_size: 5 });
        let items = source.list().await.unwrap();
        assert_eq!(items.iter().filter(|i| i.is_ok()).count(), 1);
        let failure = items.into_iter().find_map(Result::err).unwrap();
        assert_eq!(failure.source_id, "hr/huge.md");
        assert!(failure.reason.contains("too large"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_are_followed_and_broken_ones_reported() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("policy.md");
        std::fs::write(&target, "remote work policy").unwrap();
        std::fs::create_dir_all(dir.path().join("hr")).unwrap();
        std::fs::create_dir_all(dir.path().join("locked")).unwrap();
        symlink(&target, dir.path().join("hr/policy.md")).unwrap();
        symlink(outside.path().join("gone.md"), dir.path().join("locked/broken.md")).unwrap();

        let items = DirectorySource::new(dir.path()).list().await.unwrap();
        assert_eq!(items.len(), 2);

        let doc = items.iter().find_map(|i| i.as_ref().ok()).unwrap();
        assert_eq!(doc.source_id, "hr/policy.md");
        assert_eq!(doc.access_label.as_str(), "hr");
        assert_eq!(doc.raw_text, "remote work policy");

        let failure = items.iter().find_map(|i| i.as_ref().err()).unwrap();
        assert_eq!(failure.source_id, "locked/broken.md");
        assert_eq!(failure.stage, FailureStage::Load);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn broken_link_to_unsupported_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("hr")).unwrap();
        let link = dir.path().join("hr/photo.png");
        std::os::unix::fs::symlink("/nowhere/photo.png", link).unwrap();
        write(dir.path(), "hr/ok.md", "fine");

        let items = DirectorySource::new(dir.path()).list().await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_ok());
    }

    #[tokio::test]
    async fn missing_root_fails_whole_listing() {
        let result = DirectorySource::new("/definitely/not/here").list().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn static_source_lists_all() {
        let doc = Document::new("a", AccessLabel::general(), "x");
        let items = StaticSource::new(vec![doc.clone()]).list().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap(), &doc);
    }
}
