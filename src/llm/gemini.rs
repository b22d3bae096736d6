use crate::llm::client::{GenerationParams, LLMClient};
use crate::types::{AppError, ChatTurn, MessageRole, Result};
use async_trait::async_trait;
use serde_json::json;

/// Public endpoint of the Generative Language API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    params: GenerationParams,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String, model: String, params: GenerationParams) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            params,
        }
    }

    /// Build the request body for the generateContent API.
    ///
    /// System turns become `system_instruction`; images ride along as
    /// `inline_data` parts of their turn.
    fn build_request_body(turns: &[ChatTurn], params: &GenerationParams) -> serde_json::Value {
        let system: Vec<&str> = turns
            .iter()
            .filter(|t| t.role == MessageRole::System)
            .map(|t| t.text.as_str())
            .collect();

        let contents: Vec<serde_json::Value> = turns
            .iter()
            .filter(|t| t.role != MessageRole::System)
            .map(|turn| {
                let mut parts = vec![json!({ "text": turn.text })];
                parts.extend(turn.images.iter().map(|image| {
                    json!({
                        "inline_data": {
                            "mime_type": image.mime_type,
                            "data": image.data,
                        }
                    })
                }));

                json!({
                    "role": if turn.role == MessageRole::Assistant { "model" } else { "user" },
                    "parts": parts,
                })
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": params.temperature,
                "candidateCount": 1,
                "maxOutputTokens": params.max_output_tokens,
            },
        });

        if !system.is_empty() {
            body["system_instruction"] = json!({
                "parts": [{ "text": system.join("\n\n") }],
            });
        }

        body
    }
}

#[async_trait]
impl LLMClient for GeminiClient {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = Self::build_request_body(turns, &self.params);
        let images: usize = turns.iter().map(|t| t.images.len()).sum();

        tracing::debug!(model = %self.model, turns = turns.len(), images, "Gemini request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLM(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LLM(format!(
                "Gemini API error ({}): {}",
                status, body
            )));
        }

        let resp: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::LLM(format!("Invalid Gemini response: {}", e)))?;

        let text = resp["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                let reason = resp["candidates"][0]["finishReason"]
                    .as_str()
                    .or_else(|| resp["promptFeedback"]["blockReason"].as_str())
                    .unwrap_or("no candidates");
                AppError::LLM(format!("Gemini returned no text ({})", reason))
            })?;

        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EncodedImage;

    #[test]
    fn test_request_body_structure() {
        let turns = vec![
            ChatTurn::system("Answer from the knowledge base only."),
            ChatTurn::user("What is our deploy day?"),
            ChatTurn {
                role: MessageRole::Assistant,
                text: "Thursday.".into(),
                images: vec![],
            },
            ChatTurn::user("And this chart?").with_images(vec![EncodedImage::jpeg("aGVsbG8=".into())]),
        ];

        let body = GeminiClient::build_request_body(&turns, &GenerationParams::default());

        assert_eq!(
            body["system_instruction"]["parts"][0]["text"],
            "Answer from the knowledge base only."
        );

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(contents[2]["parts"][1]["inline_data"]["data"], "aGVsbG8=");

        let temp = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temp - 0.3).abs() < 1e-6);
        assert_eq!(body["generationConfig"]["candidateCount"], 1);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_request_body_without_system() {
        let body = GeminiClient::build_request_body(
            &[ChatTurn::user("Hello")],
            &GenerationParams::default(),
        );

        assert!(body.get("system_instruction").is_none());
        assert_eq!(body["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }
}
