//! Abstract storage interface for the editor's documents
//!
//! The relay never looks at document contents; this store only backs the
//! small HTTP API the editor uses to list, open, create and save files.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::constants::DOCUMENT_EXTENSION;
use crate::error::{Result, RustyRoomsError};

/// Entry returned by document listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub name: String,
}

/// Document storage interface
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List every document, sorted by name
    async fn list(&self) -> Result<Vec<DocumentSummary>>;

    /// Read a document's content
    async fn read(&self, name: &str) -> Result<String>;

    /// Create a new document with a title heading, failing if it exists
    async fn create(&self, name: &str) -> Result<DocumentSummary>;

    /// Create or replace a document's content
    async fn save(&self, name: &str, content: &str) -> Result<()>;
}

pub type SharedDocumentStore = Arc<dyn DocumentStore>;

/// Check that `name` is a plain markdown file name
pub fn validate_filename(name: &str) -> Result<()> {
    let stem = name.strip_suffix(DOCUMENT_EXTENSION).unwrap_or("");
    if stem.is_empty() || name.contains('/') || name.contains('\\') {
        return Err(RustyRoomsError::InvalidFilename(name.to_string()));
    }
    Ok(())
}

/// Content written into a freshly created document
pub fn initial_content(name: &str) -> String {
    let title = name.strip_suffix(DOCUMENT_EXTENSION).unwrap_or(name);
    format!("# {}\n\n", title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("notes.md").is_ok());
        assert!(validate_filename("notes.txt").is_err());
        assert!(validate_filename(".md").is_err());
        assert!(validate_filename("../notes.md").is_err());
        assert!(validate_filename("dir\\notes.md").is_err());
        assert!(validate_filename("").is_err());
    }

    #[test]
    fn test_initial_content_uses_stem_as_title() {
        assert_eq!(initial_content("slides.md"), "# slides\n\n");
    }
}
