//! ChromaDB vector store against a mocked v2 REST API
//!
//! Run with: cargo test --test chromadb_tests

use klugbot::db::{ChromaDBStore, VectorStore};
use klugbot::types::VectorRecord;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COLLECTIONS: &str = "/api/v2/tenants/default_tenant/databases/default_database/collections";
const COLLECTION_ID: &str = "7f1c0b0e-0000-4000-8000-000000000001";

fn collection_path(endpoint: &str) -> String {
    format!("{}/{}/{}", COLLECTIONS, COLLECTION_ID, endpoint)
}

async fn connected(server: &MockServer) -> ChromaDBStore {
    Mock::given(method("POST"))
        .and(path(COLLECTIONS))
        .and(body_partial_json(json!({
            "name": "klugbot",
            "get_or_create": true,
            "metadata": { "hnsw:space": "cosine" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": COLLECTION_ID,
            "name": "klugbot"
        })))
        .expect(1)
        .mount(server)
        .await;

    ChromaDBStore::connect(&server.uri(), "default_tenant", "default_database", "klugbot")
        .await
        .unwrap()
}

#[tokio::test]
async fn test_connect_creates_collection() {
    let server = MockServer::start().await;
    let store = connected(&server).await;
    assert_eq!(store.collection(), "klugbot");
    assert_eq!(store.provider_name(), "chromadb");
}

#[tokio::test]
async fn test_connect_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result =
        ChromaDBStore::connect(&server.uri(), "default_tenant", "default_database", "klugbot")
            .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_upsert_sends_parallel_arrays() {
    let server = MockServer::start().await;
    let store = connected(&server).await;

    Mock::given(method("POST"))
        .and(path(collection_path("upsert")))
        .and(body_partial_json(json!({
            "ids": ["a"],
            "documents": ["Deploys happen on Thursday"],
            "metadatas": [{ "source": "slack" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let written = store
        .upsert(&[VectorRecord {
            id: "a".to_string(),
            embedding: vec![0.1, 0.2],
            metadata: json!({ "source": "slack" }).as_object().cloned().unwrap(),
            document: "Deploys happen on Thursday".to_string(),
        }])
        .await
        .unwrap();
    assert_eq!(written, 1);
}

#[tokio::test]
async fn test_query_unpacks_first_result_set() {
    let server = MockServer::start().await;
    let store = connected(&server).await;

    Mock::given(method("POST"))
        .and(path(collection_path("query")))
        .and(body_partial_json(json!({ "n_results": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ids": [["a", "b"]],
            "documents": [["first", null]],
            "metadatas": [[{ "source_url": "https://wiki/a" }, null]],
            "distances": [[0.125, 0.5]]
        })))
        .mount(&server)
        .await;

    let matches = store.query(&[0.1, 0.2], 2).await.unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, "a");
    assert_eq!(matches[0].document, "first");
    assert_eq!(matches[0].source_url(), Some("https://wiki/a"));
    assert!((matches[0].distance - 0.125).abs() < 1e-6);
    assert_eq!(matches[1].document, "");
    assert!(matches[1].metadata.is_empty());
}

#[tokio::test]
async fn test_delete_where_looks_up_then_deletes() {
    let server = MockServer::start().await;
    let store = connected(&server).await;

    Mock::given(method("POST"))
        .and(path(collection_path("get")))
        .and(body_partial_json(json!({
            "where": { "$and": [
                { "source": { "$eq": "slack" } },
                { "date": { "$eq": "2025-02-22" } }
            ]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ids": ["a", "b"] })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(collection_path("delete")))
        .and(body_partial_json(json!({ "ids": ["a", "b"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
        .expect(1)
        .mount(&server)
        .await;

    let removed = store
        .delete_where(&[
            ("source".to_string(), "slack".to_string()),
            ("date".to_string(), "2025-02-22".to_string()),
        ])
        .await
        .unwrap();
    assert_eq!(removed, 2);
}

#[tokio::test]
async fn test_delete_where_without_matches_skips_delete() {
    let server = MockServer::start().await;
    let store = connected(&server).await;

    Mock::given(method("POST"))
        .and(path(collection_path("get")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ids": [] })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(collection_path("delete")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let removed = store
        .delete_where(&[("source".to_string(), "nowhere".to_string())])
        .await
        .unwrap();
    assert_eq!(removed, 0);
}

#[tokio::test]
async fn test_count() {
    let server = MockServer::start().await;
    let store = connected(&server).await;

    Mock::given(method("GET"))
        .and(path(collection_path("count")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(42)))
        .mount(&server)
        .await;

    assert_eq!(store.count().await.unwrap(), 42);
}
