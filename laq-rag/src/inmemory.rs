//! In-memory vector store using cosine distance.
//!
//! [`InMemoryVectorStore`] keeps collections in a `HashMap` behind a
//! `tokio::sync::RwLock`. It is meant for tests and short-lived sessions;
//! nothing is persisted.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{LaqError, Result};
use crate::record::{SearchHit, StoredRecord};
use crate::vectorstore::{VectorStore, check_dimensions, cosine_distance, nearest};

const BACKEND: &str = "in-memory";

#[derive(Debug)]
struct Collection {
    dimensions: usize,
    /// Records in insertion order, so equal distances rank deterministically.
    records: Vec<StoredRecord>,
    ids: HashSet<String>,
}

/// An in-memory vector store using cosine distance for search.
///
/// Batches are atomic: duplicates are checked before anything is written.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(collection: &str) -> LaqError {
    LaqError::storage(BACKEND, format!("collection '{collection}' does not exist"))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_insert_with(|| Collection {
            dimensions,
            records: Vec::new(),
            ids: HashSet::new(),
        });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn insert(&self, collection: &str, records: &[StoredRecord]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;

        let mut batch_ids = HashSet::with_capacity(records.len());
        for record in records {
            check_dimensions(BACKEND, collection, store.dimensions, record.embedding.len())?;
            if store.ids.contains(&record.id) || !batch_ids.insert(record.id.as_str()) {
                return Err(LaqError::DuplicateRecord {
                    collection: collection.to_string(),
                    id: record.id.clone(),
                });
            }
        }

        for record in records {
            store.ids.insert(record.id.clone());
            store.records.push(record.clone());
        }
        Ok(())
    }

    async fn list_ids(&self, collection: &str) -> Result<HashSet<String>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(store.ids.clone())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(store.records.len())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        check_dimensions(BACKEND, collection, store.dimensions, embedding.len())?;

        let hits = store
            .records
            .iter()
            .map(|record| SearchHit {
                id: record.id.clone(),
                document: record.document.clone(),
                metadata: record.metadata.clone(),
                distance: cosine_distance(&record.embedding, embedding),
            })
            .collect();

        Ok(nearest(hits, top_k))
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }
}
