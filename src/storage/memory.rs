//! In-memory document storage for development and testing

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::*;
use crate::error::{Result, RustyRoomsError};

/// Keeps documents in a sorted map, nothing survives a restart
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list(&self) -> Result<Vec<DocumentSummary>> {
        Ok(self
            .documents
            .read()
            .await
            .keys()
            .map(|name| DocumentSummary { name: name.clone() })
            .collect())
    }

    async fn read(&self, name: &str) -> Result<String> {
        validate_filename(name)?;
        self.documents
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RustyRoomsError::DocumentNotFound(name.to_string()))
    }

    async fn create(&self, name: &str) -> Result<DocumentSummary> {
        validate_filename(name)?;
        let mut documents = self.documents.write().await;
        if documents.contains_key(name) {
            return Err(RustyRoomsError::DocumentExists(name.to_string()));
        }
        documents.insert(name.to_string(), initial_content(name));
        Ok(DocumentSummary {
            name: name.to_string(),
        })
    }

    async fn save(&self, name: &str, content: &str) -> Result<()> {
        validate_filename(name)?;
        self.documents
            .write()
            .await
            .insert(name.to_string(), content.to_string());
        Ok(())
    }
}
