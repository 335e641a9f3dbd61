use std::path::Path;

use crate::error::ContextError;

pub const CONTEXT_EXTENSION: &str = ".md";
pub const TEMPLATE_EXTENSION: &str = ".pptx";

const SEPARATOR: &str = "\n\n";

/// Case-insensitive suffix check on a file name.
pub fn has_extension(name: &str, extension: &str) -> bool {
    name.to_lowercase().ends_with(extension)
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn check_context_name(name: &str) -> Result<(), ContextError> {
    if has_extension(name, CONTEXT_EXTENSION) {
        return Ok(());
    }
    tracing::debug!("rejected context file {name}");
    Err(ContextError::UnsupportedFileKind {
        name: name.to_string(),
        expected: CONTEXT_EXTENSION,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDocument {
    pub name: String,
    pub raw_text: String,
}

/// Ordered set of accepted context documents and the text built from them.
#[derive(Debug, Default, Clone)]
pub struct ContextAggregator {
    documents: Vec<ReferenceDocument>,
    context: String,
}

impl ContextAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept an already-read document.
    pub fn accept_document(&mut self, name: &str, raw_text: String) -> Result<(), ContextError> {
        check_context_name(name)?;
        self.documents.push(ReferenceDocument {
            name: name.to_string(),
            raw_text,
        });
        self.recompute();
        tracing::debug!(
            "accepted context file {name} ({} documents)",
            self.documents.len()
        );
        Ok(())
    }

    /// Read `path` and accept it. The extension is checked before reading.
    pub async fn accept_file(&mut self, path: &Path) -> Result<(), ContextError> {
        let name = file_name_of(path);
        check_context_name(&name)?;
        let raw_text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ContextError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        self.accept_document(&name, raw_text)
    }

    /// Accept every `.md` file of a batch, one after another in the given
    /// order. Other files are skipped; a batch with none accepts nothing.
    ///
    /// A read failure stops the batch; files before it stay accepted.
    pub async fn accept_drop<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
    ) -> Result<usize, ContextError> {
        let accepted: Vec<&Path> = paths
            .iter()
            .map(AsRef::as_ref)
            .filter(|path| has_extension(&file_name_of(path), CONTEXT_EXTENSION))
            .collect();
        if accepted.is_empty() {
            return Err(ContextError::NoAcceptableFiles {
                expected: CONTEXT_EXTENSION,
            });
        }
        if accepted.len() < paths.len() {
            tracing::debug!(
                "skipping {} non-{CONTEXT_EXTENSION} files in drop",
                paths.len() - accepted.len()
            );
        }
        for path in &accepted {
            self.accept_file(path).await?;
        }
        Ok(accepted.len())
    }

    pub fn documents(&self) -> &[ReferenceDocument] {
        &self.documents
    }

    /// The aggregated context: documents in acceptance order, blank-line separated.
    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn display_names(&self) -> String {
        self.documents
            .iter()
            .map(|d| d.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn clear(&mut self) {
        self.documents.clear();
        self.recompute();
    }

    fn recompute(&mut self) {
        self.context = self
            .documents
            .iter()
            .map(|d| d.raw_text.as_str())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(SEPARATOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn documents_join_with_blank_line_in_order() {
        let mut agg = ContextAggregator::new();
        agg.accept_document("a.md", "alpha".to_string()).unwrap();
        agg.accept_document("B.MD", "beta".to_string()).unwrap();
        assert_eq!(agg.context(), "alpha\n\nbeta");
        assert_eq!(agg.display_names(), "a.md, B.MD");
    }

    #[test]
    fn wrong_extension_is_rejected_and_not_included() {
        let mut agg = ContextAggregator::new();
        agg.accept_document("a.md", "alpha".to_string()).unwrap();
        let err = agg
            .accept_document("notes.txt", "secret".to_string())
            .unwrap_err();
        assert!(matches!(err, ContextError::UnsupportedFileKind { .. }));
        assert_eq!(agg.context(), "alpha");
        assert_eq!(agg.documents().len(), 1);
    }

    #[test]
    fn empty_documents_add_no_separator() {
        let mut agg = ContextAggregator::new();
        agg.accept_document("empty.md", String::new()).unwrap();
        agg.accept_document("b.md", "beta".to_string()).unwrap();
        assert_eq!(agg.context(), "beta");
        assert_eq!(agg.documents().len(), 2);

        agg.clear();
        assert!(agg.is_empty());
        assert_eq!(agg.context(), "");
    }

    #[tokio::test]
    async fn drop_filters_and_preserves_order() {
        let tmp = tempfile::tempdir().unwrap();
        let names = ["z.md", "image.png", "a.md", "notes.txt", "m.Md"];
        for name in names {
            fs::write(tmp.path().join(name), format!("text of {name}")).unwrap();
        }
        let paths: Vec<_> = names.iter().map(|n| tmp.path().join(n)).collect();

        let mut agg = ContextAggregator::new();
        let accepted = agg.accept_drop(&paths).await.unwrap();
        assert_eq!(accepted, 3);

        let order: Vec<&str> = agg.documents().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(order, vec!["z.md", "a.md", "m.Md"]);
        assert_eq!(
            agg.context(),
            "text of z.md\n\ntext of a.md\n\ntext of m.Md"
        );
        assert!(!agg.context().contains("image.png"));
        assert!(!agg.context().contains("notes.txt"));
    }

    #[tokio::test]
    async fn drop_without_markdown_accepts_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("deck.pptx");
        fs::write(&path, "binary").unwrap();

        let mut agg = ContextAggregator::new();
        agg.accept_document("kept.md", "kept".to_string()).unwrap();
        let err = agg.accept_drop(&[path]).await.unwrap_err();
        assert!(matches!(err, ContextError::NoAcceptableFiles { .. }));
        assert_eq!(agg.context(), "kept");
    }

    #[tokio::test]
    async fn unreadable_file_reports_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut agg = ContextAggregator::new();
        let err = agg
            .accept_file(&tmp.path().join("missing.md"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::Read { .. }));
        assert!(agg.is_empty());
    }

    #[tokio::test]
    async fn single_file_with_wrong_extension_is_not_read() {
        let tmp = tempfile::tempdir().unwrap();
        let mut agg = ContextAggregator::new();
        // Does not exist; the extension check must fail first.
        let err = agg
            .accept_file(&tmp.path().join("missing.docx"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::UnsupportedFileKind { .. }));
    }
}
