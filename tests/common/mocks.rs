//! Mock implementations for testing.
//!
//! Shared by the integration tests so every file builds the bot and its
//! pipeline the same way, without network access.

#![allow(dead_code)]

use async_trait::async_trait;
use klugbot::db::{InMemoryVectorStore, KnowledgeStore, TursoClient, VectorStore};
use klugbot::llm::LLMClient;
use klugbot::rag::embeddings::Embedder;
use klugbot::rag::knowledge::KnowledgeBase;
use klugbot::slack::{ChatSurface, SlackFile, ThreadMessage};
use klugbot::types::{AppError, ChatTurn, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub const WORKSPACE_URL: &str = "https://acme.slack.com/";
pub const TEACHER: &str = "UTEACHER";
pub const STUDENT: &str = "USTUDENT";

/// Mock LLM client that returns a fixed answer and records every request.
#[derive(Clone, Default)]
pub struct MockLLMClient {
    response: String,
    should_fail: bool,
    requests: Arc<Mutex<Vec<Vec<ChatTurn>>>>,
}

impl MockLLMClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            ..Default::default()
        }
    }

    /// A client whose every call fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatTurn>> {
        self.requests.lock().clone()
    }

    /// Text of the last user turn sent to the model.
    pub fn last_prompt(&self) -> Option<String> {
        self.requests
            .lock()
            .last()
            .and_then(|turns| turns.last())
            .map(|turn| turn.text.clone())
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        self.requests.lock().push(turns.to_vec());
        if self.should_fail {
            return Err(AppError::LLM("Mock LLM failure".to_string()));
        }
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Deterministic bag-of-words embedder.
///
/// Texts sharing words land close together, which is enough for retrieval
/// tests. Any text containing `EMBED_FAIL` is rejected.
#[derive(Clone, Default)]
pub struct MockEmbedder;

pub const EMBED_DIMENSIONS: usize = 64;

impl MockEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; EMBED_DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
        {
            let word = word.to_lowercase();
            let bucket = word
                .bytes()
                .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
                % EMBED_DIMENSIONS;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        } else {
            vector[0] = 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains("EMBED_FAIL") {
            return Err(AppError::Embedding("Mock embedding failure".to_string()));
        }
        Ok(Self::vector(text))
    }

    fn model_name(&self) -> &str {
        "mock-embedder"
    }
}

/// Knowledge base over an in-memory libsql database and vector store.
pub async fn memory_knowledge_base() -> KnowledgeBase {
    let store: Arc<dyn KnowledgeStore> = Arc::new(
        TursoClient::new_memory()
            .await
            .expect("Failed to create in-memory database"),
    );
    let vectors: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    KnowledgeBase::new(store, vectors, Arc::new(MockEmbedder))
}

/// A reply posted through [`MockChatSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedReply {
    pub channel: String,
    pub thread_ts: String,
    pub text: String,
}

/// In-memory Slack workspace.
#[derive(Default)]
pub struct MockChatSurface {
    pub replies: Mutex<Vec<PostedReply>>,
    pub files: Mutex<HashMap<String, SlackFile>>,
    pub downloads: Mutex<HashMap<String, Vec<u8>>>,
    pub threads: Mutex<HashMap<String, Vec<ThreadMessage>>>,
    pub names: Mutex<HashMap<String, String>>,
}

impl MockChatSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file reachable through `files.info` and its download URL.
    pub fn add_file(&self, id: &str, name: &str, mimetype: &str, body: Vec<u8>) -> SlackFile {
        let url = format!("https://files.slack.com/files-pri/T1-{}/{}", id, name);
        let file = SlackFile {
            id: id.to_string(),
            name: Some(name.to_string()),
            filetype: name.rsplit('.').next().map(str::to_string),
            mimetype: Some(mimetype.to_string()),
            size: Some(body.len() as u64),
            url_private: Some(url.clone()),
            url_private_download: Some(format!("{}?download=1", url)),
        };
        self.downloads
            .lock()
            .insert(file.url_private_download.clone().unwrap_or_default(), body);
        self.files.lock().insert(id.to_string(), file.clone());
        file
    }

    pub fn add_thread(&self, thread_ts: &str, messages: Vec<ThreadMessage>) {
        self.threads.lock().insert(thread_ts.to_string(), messages);
    }

    pub fn add_user(&self, user_id: &str, real_name: &str) {
        self.names
            .lock()
            .insert(user_id.to_string(), real_name.to_string());
    }

    pub fn replies(&self) -> Vec<PostedReply> {
        self.replies.lock().clone()
    }

    pub fn last_reply(&self) -> Option<String> {
        self.replies.lock().last().map(|r| r.text.clone())
    }
}

#[async_trait]
impl ChatSurface for MockChatSurface {
    async fn post_reply(&self, channel: &str, thread_ts: &str, text: &str) -> Result<()> {
        self.replies.lock().push(PostedReply {
            channel: channel.to_string(),
            thread_ts: thread_ts.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn file_info(&self, file_id: &str) -> Result<SlackFile> {
        self.files
            .lock()
            .get(file_id)
            .cloned()
            .ok_or_else(|| AppError::Slack(format!("files.info returned error: file_not_found ({})", file_id)))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.downloads
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::Slack(format!("File download failed: 404 ({})", url)))
    }

    async fn thread_messages(&self, _channel: &str, thread_ts: &str) -> Result<Vec<ThreadMessage>> {
        Ok(self
            .threads
            .lock()
            .get(thread_ts)
            .cloned()
            .unwrap_or_default())
    }

    async fn user_real_name(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.names.lock().get(user_id).cloned())
    }

    fn workspace_url(&self) -> &str {
        WORKSPACE_URL
    }
}
