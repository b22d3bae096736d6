//! Question answering over the knowledge base.
//!
//! Embed the question, pull the closest entries from the vector index, and
//! ask the model to answer from those entries only.

use std::sync::Arc;
use std::time::Instant;

use super::knowledge::KnowledgeBase;
use crate::llm::LLMClient;
use crate::types::{ChatTurn, EncodedImage, Result, VectorMatch};

/// Reply used when retrieval finds nothing.
pub const NO_ANSWER: &str = "I don't know the answer to that question. <end>";

/// Upper bound on inline image data sent with one request.
pub const MAX_INLINE_PAYLOAD_BYTES: usize = 20 * 1024 * 1024;

const QUERY_PROMPT_TEMPLATE: &str = "Based on the following knowledge entries, answer the question: \"{query}\"

Available knowledge:
{contexts}

Important instructions:
1. Only use information from the provided knowledge entries
2. If the information isn't in the knowledge entries, respond with \"I don't know\"
3. Don't make up or infer information that isn't explicitly stated
4. If multiple relevant pieces of information exist, combine them the best you can to provide a coherent answer to the question.

Answer:";

/// Retrieval settings, read from configuration per request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuerySettings {
    pub max_results: usize,
    /// Matches farther than this cosine distance are dropped. `None` keeps all.
    pub similarity_threshold: Option<f32>,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            max_results: 5,
            similarity_threshold: None,
        }
    }
}

/// Conversation context gathered around the question.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    /// Earlier thread messages, one `name: text` line each.
    pub thread: Option<String>,
    pub images: Vec<EncodedImage>,
}

#[derive(Debug, Clone)]
pub struct QueryAnswer {
    pub text: String,
    pub matches: Vec<VectorMatch>,
}

pub struct QueryHandler {
    knowledge: KnowledgeBase,
    llm: Arc<dyn LLMClient>,
}

impl QueryHandler {
    pub fn new(knowledge: KnowledgeBase, llm: Arc<dyn LLMClient>) -> Self {
        Self { knowledge, llm }
    }

    pub async fn process_query(
        &self,
        question: &str,
        context: &QueryContext,
        settings: QuerySettings,
    ) -> Result<QueryAnswer> {
        let started = Instant::now();
        let embedding = self.knowledge.embedder().embed(question).await?;

        let mut matches = self
            .knowledge
            .vectors()
            .query(&embedding, settings.max_results)
            .await?;

        if let Some(threshold) = settings.similarity_threshold {
            matches.retain(|m| m.distance <= threshold);
        }

        if matches.is_empty() {
            tracing::info!(question = %question, "No knowledge matched");
            return Ok(QueryAnswer {
                text: NO_ANSWER.to_string(),
                matches,
            });
        }

        let prompt = build_prompt(question, &matches, context.thread.as_deref());
        let images = if is_small_payload(&context.images) {
            context.images.clone()
        } else {
            tracing::warn!(
                images = context.images.len(),
                "Image payload exceeds inline limit, sending text only"
            );
            Vec::new()
        };

        let text = self
            .llm
            .complete(&[ChatTurn::user(prompt).with_images(images)])
            .await?;

        tracing::info!(
            matches = matches.len(),
            model = self.llm.model_name(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Answered question"
        );

        Ok(QueryAnswer {
            text: text.trim().to_string(),
            matches,
        })
    }
}

/// Fill the prompt template with numbered contexts and optional thread history.
pub fn build_prompt(question: &str, matches: &[VectorMatch], thread: Option<&str>) -> String {
    let contexts = matches
        .iter()
        .enumerate()
        .map(|(i, m)| format!("Content {}: {}", i + 1, m.document))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = QUERY_PROMPT_TEMPLATE
        .replace("{query}", question)
        .replace("{contexts}", &contexts);

    match thread.filter(|t| !t.trim().is_empty()) {
        Some(thread) => format!("Conversation so far:\n{}\n\n{}", thread, prompt),
        None => prompt,
    }
}

/// Append a references section linking every distinct source of the matches.
pub fn format_slack_response(answer: &str, matches: &[VectorMatch]) -> String {
    let mut urls: Vec<&str> = Vec::new();
    for url in matches.iter().filter_map(VectorMatch::source_url) {
        if !urls.contains(&url) {
            urls.push(url);
        }
    }

    if urls.is_empty() {
        return answer.to_string();
    }

    let mut response = format!("{}\n\n*References:*", answer);
    for url in urls {
        response.push_str(&format!("\n• <{}|View source>", url));
    }
    response
}

/// Whether the images fit in one inline request.
pub fn is_small_payload(images: &[EncodedImage]) -> bool {
    images.iter().map(|i| i.data.len()).sum::<usize>() < MAX_INLINE_PAYLOAD_BYTES
}
