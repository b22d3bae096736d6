//! ChromaDB vector database integration.
//!
//! Talks to a ChromaDB server through its v2 HTTP API. The collection is
//! created on connect with cosine distance (`hnsw:space = cosine`) if it does
//! not exist yet.
//!
//! # Example
//!
//! ```rust,ignore
//! use klugbot::db::ChromaDBStore;
//!
//! let store = ChromaDBStore::connect(
//!     "http://localhost:8000",
//!     "default_tenant",
//!     "default_database",
//!     "klugbot_embeddings",
//! )
//! .await?;
//! let matches = store.query(&embedding, 5).await?;
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::vectorstore::{VectorStore, require_filters};
use crate::types::{AppError, Result, VectorMatch, VectorRecord};

/// ChromaDB-backed embedding collection.
pub struct ChromaDBStore {
    client: reqwest::Client,
    collection_url: String,
    collection: String,
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<serde_json::Map<String, Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

#[derive(Debug, Default, Deserialize)]
struct GetResponse {
    #[serde(default)]
    ids: Vec<String>,
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<serde_json::Map<String, Value>>>>,
    #[serde(default)]
    embeddings: Option<Vec<Option<Vec<f32>>>>,
}

impl ChromaDBStore {
    /// Connect to `url` and get or create `collection`.
    pub async fn connect(url: &str, tenant: &str, database: &str, collection: &str) -> Result<Self> {
        let client = reqwest::Client::new();
        let collections_url = format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            url.trim_end_matches('/'),
            tenant,
            database
        );

        let response = client
            .post(&collections_url)
            .json(&json!({
                "name": collection,
                "metadata": { "hnsw:space": "cosine" },
                "get_or_create": true,
            }))
            .send()
            .await
            .map_err(|e| AppError::VectorStore(format!("Failed to reach ChromaDB: {}", e)))?;

        let created: CollectionResponse = Self::parse(response, "create collection").await?;
        tracing::info!(collection = %collection, id = %created.id, "ChromaDB collection ready");

        Ok(Self {
            client,
            collection_url: format!("{}/{}", collections_url, created.id),
            collection: collection.to_string(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        operation: &str,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::VectorStore(format!(
                "ChromaDB {} failed ({}): {}",
                operation, status, body
            )));
        }

        response.json::<T>().await.map_err(|e| {
            AppError::VectorStore(format!("Invalid ChromaDB {} response: {}", operation, e))
        })
    }

    async fn send(&self, endpoint: &str, body: Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/{}", self.collection_url, endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::VectorStore(format!("ChromaDB {} request failed: {}", endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::VectorStore(format!(
                "ChromaDB {} failed ({}): {}",
                endpoint, status, body
            )));
        }
        Ok(response)
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Value,
    ) -> Result<T> {
        let response = self.send(endpoint, body).await?;
        Self::parse(response, endpoint).await
    }

    /// Chroma requires `$and` as soon as more than one key is filtered.
    fn where_clause(filters: &[(String, String)]) -> Value {
        let mut clauses: Vec<Value> = filters
            .iter()
            .map(|(key, value)| {
                let mut clause = serde_json::Map::new();
                clause.insert(key.clone(), json!({ "$eq": value }));
                Value::Object(clause)
            })
            .collect();

        if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            json!({ "$and": clauses })
        }
    }

    async fn ids_matching(&self, filters: &[(String, String)]) -> Result<Vec<String>> {
        let found: GetResponse = self
            .post(
                "get",
                json!({ "where": Self::where_clause(filters), "include": [] }),
            )
            .await?;
        Ok(found.ids)
    }

    async fn existing_ids(&self, ids: &[String]) -> Result<Vec<String>> {
        let found: GetResponse = self
            .post("get", json!({ "ids": ids, "include": [] }))
            .await?;
        Ok(found.ids)
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<()> {
        self.send("delete", json!({ "ids": ids })).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for ChromaDBStore {
    fn provider_name(&self) -> &'static str {
        "chromadb"
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let body = json!({
            "ids": records.iter().map(|r| &r.id).collect::<Vec<_>>(),
            "embeddings": records.iter().map(|r| &r.embedding).collect::<Vec<_>>(),
            "metadatas": records.iter().map(|r| &r.metadata).collect::<Vec<_>>(),
            "documents": records.iter().map(|r| &r.document).collect::<Vec<_>>(),
        });
        self.send("upsert", body).await?;

        Ok(records.len())
    }

    async fn query(&self, embedding: &[f32], limit: usize) -> Result<Vec<VectorMatch>> {
        let response: QueryResponse = self
            .post(
                "query",
                json!({
                    "query_embeddings": [embedding],
                    "n_results": limit,
                    "include": ["documents", "metadatas", "distances"],
                }),
            )
            .await?;

        let ids = response.ids.into_iter().next().unwrap_or_default();
        let documents = response
            .documents
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();
        let metadatas = response
            .metadatas
            .and_then(|m| m.into_iter().next())
            .unwrap_or_default();
        let distances = response
            .distances
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();

        Ok(ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| VectorMatch {
                id,
                document: documents.get(i).cloned().flatten().unwrap_or_default(),
                metadata: metadatas.get(i).cloned().flatten().unwrap_or_default(),
                distance: distances.get(i).copied().flatten().unwrap_or(f32::MAX),
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let existing = self.existing_ids(ids).await?;
        if existing.is_empty() {
            return Ok(0);
        }
        self.delete_ids(&existing).await?;
        Ok(existing.len())
    }

    async fn delete_where(&self, filters: &[(String, String)]) -> Result<usize> {
        require_filters(filters)?;

        let ids = self.ids_matching(filters).await?;
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete_ids(&ids).await?;
        Ok(ids.len())
    }

    async fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        let found: GetResponse = self
            .post(
                "get",
                json!({ "ids": [id], "include": ["documents", "metadatas", "embeddings"] }),
            )
            .await?;

        let Some(found_id) = found.ids.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(VectorRecord {
            id: found_id,
            embedding: found
                .embeddings
                .and_then(|e| e.into_iter().next().flatten())
                .unwrap_or_default(),
            metadata: found
                .metadatas
                .and_then(|m| m.into_iter().next().flatten())
                .unwrap_or_default(),
            document: found
                .documents
                .and_then(|d| d.into_iter().next().flatten())
                .unwrap_or_default(),
        }))
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .get(format!("{}/count", self.collection_url))
            .send()
            .await
            .map_err(|e| AppError::VectorStore(format!("ChromaDB count request failed: {}", e)))?;

        Self::parse(response, "count").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_clause_single_key() {
        let clause = ChromaDBStore::where_clause(&[("source".into(), "slack".into())]);
        assert_eq!(clause, json!({ "source": { "$eq": "slack" } }));
    }

    #[test]
    fn test_where_clause_multiple_keys_use_and() {
        let clause = ChromaDBStore::where_clause(&[
            ("source".into(), "slack".into()),
            ("date".into(), "2025-01-01".into()),
        ]);
        assert_eq!(
            clause,
            json!({ "$and": [
                { "source": { "$eq": "slack" } },
                { "date": { "$eq": "2025-01-01" } }
            ]})
        );
    }
}
