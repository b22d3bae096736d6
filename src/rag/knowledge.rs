//! Knowledge base: the relational store and the vector index kept in step.
//!
//! Every entry is written to the relational store first, then embedded and
//! upserted into the vector index under the same id, and finally the
//! embedding is copied back onto the relational row.

use std::sync::Arc;

use serde_json::Value;

use super::embeddings::Embedder;
use crate::db::{KnowledgeStore, VectorStore};
use crate::types::{
    DeleteFilters, EntryUpdate, KnowledgeEntry, NewKnowledgeEntry, Result, VectorRecord,
};

/// Row counts removed by a filtered delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub relational: usize,
    pub vector: usize,
}

impl DeletionReport {
    pub fn is_empty(&self) -> bool {
        self.relational == 0 && self.vector == 0
    }
}

/// Today's date as stored in entry metadata (`YYYY-MM-DD`, UTC).
pub fn today() -> String {
    chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

#[derive(Clone)]
pub struct KnowledgeBase {
    store: Arc<dyn KnowledgeStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl KnowledgeBase {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            store,
            vectors,
            embedder,
        }
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    pub fn vectors(&self) -> &Arc<dyn VectorStore> {
        &self.vectors
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Persist an entry in both stores and return it with its embedding set.
    pub async fn learn(&self, entry: NewKnowledgeEntry) -> Result<KnowledgeEntry> {
        let stored = self.store.create(entry).await?;
        let embedding = self.embedder.embed(&stored.content).await?;

        self.vectors
            .upsert(&[VectorRecord {
                id: stored.id.to_string(),
                embedding: embedding.clone(),
                metadata: vector_metadata(&stored),
                document: stored.content.clone(),
            }])
            .await?;

        let updated = self
            .store
            .update(stored.id, EntryUpdate::embedding(embedding.clone()))
            .await?;

        tracing::debug!(entry_id = %stored.id, dims = embedding.len(), "Entry stored and embedded");

        Ok(updated.unwrap_or(KnowledgeEntry {
            embedding: Some(embedding),
            ..stored
        }))
    }

    /// Delete matching entries from both stores.
    ///
    /// Vector records are removed by the ids the relational delete returned and
    /// then by metadata filter, which also catches records with no relational row.
    pub async fn delete_matching(&self, filters: &DeleteFilters) -> Result<DeletionReport> {
        let (relational, ids) = self.store.delete_where(filters).await?;

        let by_id = if ids.is_empty() {
            0
        } else {
            self.vectors.delete(&ids).await?
        };
        let by_filter = self.vectors.delete_where(&filters.metadata_pairs()).await?;

        let report = DeletionReport {
            relational,
            vector: by_id.max(by_filter),
        };
        tracing::info!(
            filters = %filters.describe(),
            relational = report.relational,
            vector = report.vector,
            "Deleted knowledge entries"
        );
        Ok(report)
    }
}

/// Flat, string-only metadata for the vector index.
fn vector_metadata(entry: &KnowledgeEntry) -> serde_json::Map<String, Value> {
    let mut metadata = serde_json::Map::new();
    metadata.insert("id".into(), Value::String(entry.id.to_string()));
    metadata.insert(
        "slack_username".into(),
        Value::String(entry.slack_username.clone()),
    );
    metadata.insert(
        "slack_timestamp".into(),
        Value::String(entry.slack_timestamp.clone()),
    );
    metadata.insert(
        "source_url".into(),
        Value::String(entry.source_url.clone().unwrap_or_default()),
    );
    metadata.insert("tags".into(), Value::String(entry.tags.join(",")));

    for (key, value) in &entry.additional_metadata {
        let flat = match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        metadata.entry(key.clone()).or_insert(Value::String(flat));
    }

    metadata
}
