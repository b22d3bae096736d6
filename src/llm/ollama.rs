use crate::llm::client::LLMClient;
use crate::types::{AppError, ChatTurn, MessageRole, Result};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, request::ChatMessageRequest},
    generation::images::Image,
};

pub struct OllamaClient {
    client: Ollama,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: String) -> Result<Self> {
        let (scheme, rest) = base_url
            .split_once("://")
            .unwrap_or(("http", base_url));
        let rest = rest.trim_end_matches('/');

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    AppError::Configuration(format!("Invalid Ollama port in {}", base_url))
                })?;
                (host, port)
            }
            None => (rest, 11434),
        };

        let client = Ollama::new(format!("{}://{}", scheme, host), port);

        Ok(Self { client, model })
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        let messages: Vec<ChatMessage> = turns
            .iter()
            .map(|turn| {
                let message = match turn.role {
                    MessageRole::System => ChatMessage::system(turn.text.clone()),
                    MessageRole::User => ChatMessage::user(turn.text.clone()),
                    MessageRole::Assistant => ChatMessage::assistant(turn.text.clone()),
                };
                if turn.images.is_empty() {
                    message
                } else {
                    message.with_images(
                        turn.images
                            .iter()
                            .map(|image| Image::from_base64(&image.data))
                            .collect(),
                    )
                }
            })
            .collect();

        let request = ChatMessageRequest::new(self.model.clone(), messages);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AppError::LLM(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
