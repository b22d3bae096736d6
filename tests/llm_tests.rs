//! Gemini generation and embedding clients against a mocked API
//!
//! Run with: cargo test --test llm_tests

use klugbot::llm::LLMClient;
use klugbot::llm::gemini::GeminiClient;
use klugbot::llm::GenerationParams;
use klugbot::rag::embeddings::{Embedder, GeminiEmbedder};
use klugbot::types::{AppError, ChatTurn, EncodedImage};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-2.0-flash";
const EMBED_MODEL: &str = "text-embedding-004";

fn gemini(server: &MockServer) -> GeminiClient {
    GeminiClient::new(
        "test-key".to_string(),
        server.uri(),
        MODEL.to_string(),
        GenerationParams::default(),
    )
}

fn embedder(server: &MockServer) -> GeminiEmbedder {
    GeminiEmbedder::new("test-key".to_string(), server.uri(), EMBED_MODEL.to_string())
}

// ============= Generation =============

#[tokio::test]
async fn test_gemini_generates_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/models/{}:generateContent", MODEL)))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "When do we deploy?" }] }],
            "generationConfig": { "candidateCount": 1, "maxOutputTokens": 2048 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "On " }, { "text": "Thursday." }] },
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let answer = gemini(&server)
        .complete(&[ChatTurn::user("When do we deploy?")])
        .await
        .unwrap();
    assert_eq!(answer, "On Thursday.");
}

#[tokio::test]
async fn test_gemini_sends_inline_images() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/models/{}:generateContent", MODEL)))
        .and(body_partial_json(json!({
            "contents": [{
                "parts": [
                    { "text": "What is in this chart?" },
                    { "inline_data": { "mime_type": "image/jpeg", "data": "aGVsbG8=" } }
                ]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "A bar chart." }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let turn = ChatTurn::user("What is in this chart?")
        .with_images(vec![EncodedImage::jpeg("aGVsbG8=".to_string())]);
    let answer = gemini(&server).complete(&[turn]).await.unwrap();
    assert_eq!(answer, "A bar chart.");
}

#[tokio::test]
async fn test_gemini_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let err = gemini(&server)
        .complete(&[ChatTurn::user("hi")])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::LLM(_)));
    assert!(err.to_string().contains("API key not valid"));
}

#[tokio::test]
async fn test_gemini_blocked_prompt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let err = gemini(&server)
        .complete(&[ChatTurn::user("hi")])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "LLM error: Gemini returned no text (SAFETY)");
}

// ============= Embeddings =============

#[tokio::test]
async fn test_gemini_embeds_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/models/{}:embedContent", EMBED_MODEL)))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "model": format!("models/{}", EMBED_MODEL),
            "content": { "parts": [{ "text": "Deploys happen on Thursday" }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": { "values": [0.25, -0.5, 1.0] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedding = embedder(&server)
        .embed("Deploys happen on Thursday")
        .await
        .unwrap();
    assert_eq!(embedding, vec![0.25, -0.5, 1.0]);
}

#[tokio::test]
async fn test_gemini_embedding_missing_values() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": {} })))
        .mount(&server)
        .await;

    let err = embedder(&server).embed("text").await.unwrap_err();
    assert!(matches!(err, AppError::Embedding(_)));
}

#[tokio::test]
async fn test_gemini_embedding_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = embedder(&server).embed("text").await.unwrap_err();
    assert!(err.to_string().contains("overloaded"));
}
