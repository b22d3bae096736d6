//! LLM Client abstractions and provider management
//!
//! This module provides a unified interface for the generative model that
//! writes grounded answers:
//! - **Gemini**: Google Generative Language REST API (default, multimodal)
//! - **Ollama**: Local inference, behind the `ollama` feature

use crate::types::{ChatTurn, Result};
use async_trait::async_trait;

/// Generic LLM client trait for provider abstraction
///
/// All LLM providers implement this trait, allowing for easy swapping
/// between providers without changing application code.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate from structured turns, each optionally carrying images
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Sampling parameters applied to every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_output_tokens: 2048,
        }
    }
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// Google Gemini
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Gemini {
    ///     api_key: std::env::var("GEMINI_API_KEY")?,
    ///     base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
    ///     model: "gemini-2.0-flash".to_string(),
    ///     params: GenerationParams::default(),
    /// };
    /// ```
    Gemini {
        api_key: String,
        base_url: String,
        model: String,
        params: GenerationParams,
    },

    /// Ollama local LLM provider
    ///
    /// Image turns require a vision model such as `llava`.
    Ollama { base_url: String, model: String },
}

impl Provider {
    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's feature is not compiled in or the
    /// configuration is invalid.
    pub fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            Provider::Gemini {
                api_key,
                base_url,
                model,
                params,
            } => Ok(Box::new(super::gemini::GeminiClient::new(
                api_key.clone(),
                base_url.clone(),
                model.clone(),
                *params,
            ))),

            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Box::new(
                super::ollama::OllamaClient::new(base_url, model.clone())?,
            )),

            #[cfg(not(feature = "ollama"))]
            Provider::Ollama { model, .. } => Err(crate::types::AppError::Configuration(format!(
                "Ollama provider requested for model '{}' but the `ollama` feature is not enabled",
                model
            ))),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini { .. } => "Gemini",
            Provider::Ollama { .. } => "Ollama",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_name() {
        let gemini = Provider::Gemini {
            api_key: "".to_string(),
            base_url: "".to_string(),
            model: "gemini-2.0-flash".to_string(),
            params: GenerationParams::default(),
        };
        assert_eq!(gemini.name(), "Gemini");

        let ollama = Provider::Ollama {
            base_url: "".to_string(),
            model: "".to_string(),
        };
        assert_eq!(ollama.name(), "Ollama");
    }

    #[test]
    fn test_gemini_client_reports_model() {
        let client = Provider::Gemini {
            api_key: "key".to_string(),
            base_url: "http://localhost".to_string(),
            model: "gemini-2.0-flash".to_string(),
            params: GenerationParams::default(),
        }
        .create_client()
        .unwrap();

        assert_eq!(client.model_name(), "gemini-2.0-flash");
    }

    #[cfg(not(feature = "ollama"))]
    #[test]
    fn test_ollama_without_feature_is_configuration_error() {
        let result = Provider::Ollama {
            base_url: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
        }
        .create_client();

        let err = match result {
            Ok(_) => panic!("Expected error"),
            Err(e) => e.to_string(),
        };
        assert!(err.contains("`ollama` feature"));
    }
}
