//! Text embedding providers.
//!
//! The same embedder must be used for stored entries and for questions, so
//! the provider is chosen once at startup from configuration.

use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde_json::json;

/// Turns text into a dense vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn model_name(&self) -> &str;
}

/// Embedding provider selected from configuration.
#[derive(Debug, Clone)]
pub enum EmbeddingProvider {
    /// Gemini `embedContent` endpoint.
    Gemini {
        api_key: String,
        base_url: String,
        model: String,
    },
    /// Local ONNX model via fastembed (`local-embeddings` feature).
    Local,
}

impl EmbeddingProvider {
    pub fn create_embedder(&self) -> Result<Box<dyn Embedder>> {
        match self {
            EmbeddingProvider::Gemini {
                api_key,
                base_url,
                model,
            } => Ok(Box::new(GeminiEmbedder::new(
                api_key.clone(),
                base_url.clone(),
                model.clone(),
            ))),

            #[cfg(feature = "local-embeddings")]
            EmbeddingProvider::Local => Ok(Box::new(LocalEmbedder::new()?)),

            #[cfg(not(feature = "local-embeddings"))]
            EmbeddingProvider::Local => Err(AppError::Configuration(
                "Local embeddings require the `local-embeddings` feature".into(),
            )),
        }
    }
}

pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "model": format!("models/{}", self.model),
                "content": { "parts": [{ "text": text }] },
            }))
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("Embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding(format!(
                "Embedding API error ({}): {}",
                status, body
            )));
        }

        let resp: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Invalid embedding response: {}", e)))?;

        let values = resp["embedding"]["values"]
            .as_array()
            .ok_or_else(|| AppError::Embedding("missing embedding.values".into()))?;

        let embedding: Vec<f32> = values
            .iter()
            .filter_map(|v| v.as_f64())
            .map(|v| v as f32)
            .collect();

        if embedding.is_empty() || embedding.len() != values.len() {
            return Err(AppError::Embedding("malformed embedding vector".into()));
        }

        Ok(embedding)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use super::Embedder;
    use crate::types::{AppError, Result};
    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// all-MiniLM-L6-v2 run in-process.
    pub struct LocalEmbedder {
        model: Arc<Mutex<TextEmbedding>>,
    }

    impl LocalEmbedder {
        pub fn new() -> Result<Self> {
            let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2))
                .map_err(|e| AppError::Embedding(e.to_string()))?;

            Ok(Self {
                model: Arc::new(Mutex::new(model)),
            })
        }
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let model = Arc::clone(&self.model);
            let text = text.to_string();

            let mut embeddings = tokio::task::spawn_blocking(move || {
                model
                    .lock()
                    .embed(vec![text], None)
                    .map_err(|e| AppError::Embedding(e.to_string()))
            })
            .await
            .map_err(|e| AppError::Internal(format!("Embedding task failed: {}", e)))??;

            embeddings
                .pop()
                .ok_or_else(|| AppError::Embedding("model returned no embedding".into()))
        }

        fn model_name(&self) -> &str {
            "all-MiniLM-L6-v2"
        }
    }
}
