//! Vector Store Abstraction Layer
//!
//! Knowledge embeddings live in a single cosine-space collection. This module
//! provides the trait every backend implements plus the in-memory backend used
//! for tests and local development.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  VectorStore Trait                    │
//! ├──────────────────────────────────────────────────────┤
//! │  upsert  │  query  │  delete  │  delete_where  │ ... │
//! └──────────────────────────────────────────────────────┘
//!          ▲                         ▲
//!    ┌─────┴──────┐           ┌──────┴─────┐
//!    │  InMemory  │           │  ChromaDB  │
//!    │  (tests)   │           │   (REST)   │
//!    └────────────┘           └────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use klugbot::db::vectorstore::VectorStoreProvider;
//!
//! let store = VectorStoreProvider::ChromaDB {
//!     url: "http://localhost:8000".into(),
//!     collection: "klugbot_embeddings".into(),
//!     tenant: "default_tenant".into(),
//!     database: "default_database".into(),
//! }
//! .create_store()
//! .await?;
//!
//! store.upsert(&records).await?;
//! let matches = store.query(&query_embedding, 5).await?;
//! ```

use crate::types::{AppError, Result, VectorMatch, VectorRecord};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Default collection holding knowledge embeddings.
pub const DEFAULT_COLLECTION: &str = "klugbot_embeddings";

// ============================================================================
// Vector Store Provider Configuration
// ============================================================================

/// Configuration for vector store providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorStoreProvider {
    /// ChromaDB server reached over its HTTP API.
    ChromaDB {
        /// ChromaDB server URL (e.g., "http://localhost:8000").
        url: String,
        /// Collection name, created on first use with cosine distance.
        collection: String,
        /// ChromaDB tenant.
        tenant: String,
        /// ChromaDB database within the tenant.
        database: String,
    },

    /// In-memory vector store.
    ///
    /// Data is not persisted and will be lost when the process exits.
    InMemory,
}

impl VectorStoreProvider {
    /// Create a vector store instance from this provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or the collection
    /// cannot be created.
    pub async fn create_store(&self) -> Result<Box<dyn VectorStore>> {
        match self {
            VectorStoreProvider::ChromaDB {
                url,
                collection,
                tenant,
                database,
            } => {
                let store =
                    super::chromadb::ChromaDBStore::connect(url, tenant, database, collection)
                        .await?;
                Ok(Box::new(store))
            }
            VectorStoreProvider::InMemory => Ok(Box::new(InMemoryVectorStore::new())),
        }
    }
}

// ============================================================================
// Vector Store Trait
// ============================================================================

/// Abstract trait for the embedding collection.
///
/// # Implementors
///
/// - `ChromaDBStore` - ChromaDB over HTTP
/// - `InMemoryVectorStore` - Testing and local development
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Get the name of this vector store provider.
    fn provider_name(&self) -> &'static str;

    /// Insert or replace records by id.
    ///
    /// # Returns
    ///
    /// Number of records written.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize>;

    /// Nearest records to `embedding`, closest first.
    ///
    /// # Arguments
    ///
    /// * `embedding` - Query vector.
    /// * `limit` - Maximum number of matches to return.
    async fn query(&self, embedding: &[f32], limit: usize) -> Result<Vec<VectorMatch>>;

    /// Delete records by id.
    ///
    /// # Returns
    ///
    /// Number of records actually deleted.
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    /// Delete every record whose metadata matches all `filters` exactly.
    ///
    /// An empty filter list is rejected rather than treated as "match all".
    async fn delete_where(&self, filters: &[(String, String)]) -> Result<usize>;

    /// Get a record by id.
    async fn get(&self, id: &str) -> Result<Option<VectorRecord>>;

    /// Count records in the collection.
    async fn count(&self) -> Result<usize>;
}

pub(crate) fn require_filters(filters: &[(String, String)]) -> Result<()> {
    if filters.is_empty() {
        return Err(AppError::InvalidInput(
            "At least one metadata filter is required".into(),
        ));
    }
    Ok(())
}

// ============================================================================
// In-Memory Vector Store
// ============================================================================

/// In-memory vector store.
///
/// Uses cosine distance for comparisons, like the hosted collection.
pub struct InMemoryVectorStore {
    records: Arc<RwLock<HashMap<String, VectorRecord>>>,
}

impl InMemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Calculate cosine similarity between two vectors.
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }

    fn matches(record: &VectorRecord, filters: &[(String, String)]) -> bool {
        filters.iter().all(|(key, expected)| {
            match record.metadata.get(key) {
                Some(serde_json::Value::String(actual)) => actual == expected,
                Some(other) => other.to_string() == *expected,
                None => false,
            }
        })
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn provider_name(&self) -> &'static str {
        "in-memory"
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        let mut stored = self.records.write();
        for record in records {
            if record.embedding.is_empty() {
                return Err(AppError::InvalidInput(format!(
                    "Record '{}' has an empty embedding",
                    record.id
                )));
            }
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn query(&self, embedding: &[f32], limit: usize) -> Result<Vec<VectorMatch>> {
        let stored = self.records.read();

        let mut results: Vec<VectorMatch> = stored
            .values()
            .map(|record| VectorMatch {
                id: record.id.clone(),
                document: record.document.clone(),
                metadata: record.metadata.clone(),
                distance: 1.0 - Self::cosine_similarity(embedding, &record.embedding),
            })
            .collect();

        // Closest first
        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        Ok(results)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut stored = self.records.write();
        Ok(ids.iter().filter(|id| stored.remove(*id).is_some()).count())
    }

    async fn delete_where(&self, filters: &[(String, String)]) -> Result<usize> {
        require_filters(filters)?;

        let mut stored = self.records.write();
        let before = stored.len();
        stored.retain(|_, record| !Self::matches(record, filters));
        Ok(before - stored.len())
    }

    async fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, embedding: Vec<f32>, metadata: serde_json::Value) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            embedding,
            metadata: metadata.as_object().cloned().unwrap_or_default(),
            document: format!("document {}", id),
        }
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_inmemory_upsert_and_query() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[
                record("doc1", vec![1.0, 0.0, 0.0], json!({})),
                record("doc2", vec![0.0, 1.0, 0.0], json!({})),
                record("doc3", vec![0.9, 0.1, 0.0], json!({})),
            ])
            .await
            .unwrap();

        let results = store.query(&[1.0, 0.0, 0.0], 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "doc1");
        assert_eq!(results[1].id, "doc3");
        assert!(results[0].distance.abs() < 0.001);
    }

    #[tokio::test]
    async fn test_inmemory_upsert_replaces_by_id() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[record("doc1", vec![1.0, 0.0], json!({"v": "1"}))])
            .await
            .unwrap();
        store
            .upsert(&[record("doc1", vec![0.0, 1.0], json!({"v": "2"}))])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let stored = store.get("doc1").await.unwrap().unwrap();
        assert_eq!(stored.metadata["v"], "2");
    }

    #[tokio::test]
    async fn test_inmemory_delete_by_ids() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[record("doc1", vec![1.0, 0.0, 0.0], json!({}))])
            .await
            .unwrap();

        let deleted = store
            .delete(&["doc1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_inmemory_delete_where_requires_all_keys() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[
                record(
                    "match",
                    vec![1.0, 0.0],
                    json!({"source_url": "https://example.com", "source": "slack", "date": "2025-01-01"}),
                ),
                record(
                    "other-date",
                    vec![1.0, 0.0],
                    json!({"source_url": "https://example.com", "source": "slack", "date": "2025-01-02"}),
                ),
                record(
                    "other-source",
                    vec![1.0, 0.0],
                    json!({"source_url": "https://example.com", "source": "offline", "date": "2025-01-01"}),
                ),
            ])
            .await
            .unwrap();

        let deleted = store
            .delete_where(&pairs(&[
                ("source_url", "https://example.com"),
                ("source", "slack"),
                ("date", "2025-01-01"),
            ]))
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert!(store.get("match").await.unwrap().is_none());
        assert!(store.get("other-date").await.unwrap().is_some());
        assert!(store.get("other-source").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_inmemory_delete_where_rejects_empty_filters() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[record("doc1", vec![1.0], json!({}))])
            .await
            .unwrap();

        assert!(store.delete_where(&[]).await.is_err());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[test]
    fn test_cosine_similarity() {
        // Identical vectors
        assert!((InMemoryVectorStore::cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 0.001);

        // Orthogonal vectors
        assert!(InMemoryVectorStore::cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);

        // Mismatched dimensions
        assert_eq!(InMemoryVectorStore::cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
