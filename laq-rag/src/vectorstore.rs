//! Vector store trait for storing and searching record embeddings.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::{LaqError, Result};
use crate::record::{SearchHit, StoredRecord};

/// A storage backend for record embeddings with similarity search.
///
/// Implementations manage named collections of [`StoredRecord`]s. Unlike an
/// upsert store, [`insert`](VectorStore::insert) must never overwrite: a
/// record whose ID already exists is rejected with
/// [`LaqError::DuplicateRecord`](crate::LaqError::DuplicateRecord).
///
/// # Example
///
/// ```rust,ignore
/// use laq_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("laqs", 768).await?;
/// store.insert("laqs", &records).await?;
/// let hits = store.query("laqs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists, in which case
    /// the original `dimensions` are kept.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its data. No-op if it is absent.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert records into a collection. Every embedding must have the
    /// collection's dimensions.
    ///
    /// When [`atomic_batches`](VectorStore::atomic_batches) is `true`, either
    /// every record is written or none is.
    async fn insert(&self, collection: &str, records: &[StoredRecord]) -> Result<()>;

    /// Return every record ID in a collection.
    async fn list_ids(&self, collection: &str) -> Result<HashSet<String>>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Return the `top_k` records nearest to `embedding`, ordered by
    /// ascending distance. `embedding` must have the collection's dimensions.
    async fn query(&self, collection: &str, embedding: &[f32], top_k: usize)
    -> Result<Vec<SearchHit>>;

    /// Whether a multi-record [`insert`](VectorStore::insert) is all-or-nothing.
    fn atomic_batches(&self) -> bool {
        true
    }

    /// Short backend name used in logs and errors.
    fn backend(&self) -> &'static str;
}

/// Cosine distance `1 - cos(a, b)`, in `[0, 2]`.
///
/// Returns `1.0` (orthogonal) if either vector has zero magnitude. Callers
/// check lengths first with [`check_dimensions`].
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "cosine distance over vectors of different length");
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// Reject an embedding whose length differs from the collection's.
///
/// A mismatch means the embedding model changed after the collection was
/// created; clearing the collection recreates it with the new dimensions.
pub fn check_dimensions(
    backend: &str,
    collection: &str,
    expected: usize,
    actual: usize,
) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    Err(LaqError::storage(
        backend,
        format!(
            "collection '{collection}' holds {expected}-dimensional embeddings but got {actual}; \
             clear the collection after changing the embedding model"
        ),
    ))
}

/// Sort hits by ascending distance (stable) and keep the first `top_k`.
pub(crate) fn nearest(mut hits: Vec<SearchHit>, top_k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits.truncate(top_k);
    hits
}
