//! Directory-backed document storage

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::traits::*;
use crate::constants::DOCUMENT_EXTENSION;
use crate::error::{Result, RustyRoomsError};

/// Stores each document as a `.md` file in one flat directory
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_filename(name)?;
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn list(&self) -> Result<Vec<DocumentSummary>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&self.root).await?;
                log::info!("Created storage directory {}", self.root.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut documents = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(DOCUMENT_EXTENSION) {
                    documents.push(DocumentSummary {
                        name: name.to_string(),
                    });
                }
            }
        }

        documents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(documents)
    }

    async fn read(&self, name: &str) -> Result<String> {
        let path = self.path_for(name)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(RustyRoomsError::DocumentNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, name: &str) -> Result<DocumentSummary> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.root).await?;

        // create_new makes the existence check and the creation one step
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(RustyRoomsError::DocumentExists(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        file.write_all(initial_content(name).as_bytes()).await?;
        file.flush().await?;

        Ok(DocumentSummary {
            name: name.to_string(),
        })
    }

    async fn save(&self, name: &str, content: &str) -> Result<()> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.root).await?;
        fs::write(&path, content).await?;
        Ok(())
    }
}
