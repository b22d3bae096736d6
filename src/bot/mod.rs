//! The Slack bot controller.
//!
//! A mention is parsed into a [`Command`], checked against the teachers list,
//! and handled. Every handler returns a [`CommandOutcome`]; the reply layer
//! turns it into exactly one threaded message.

pub mod commands;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::rag::extract::dotted_extension;
use crate::rag::ingest::{FileIngestor, FileMetadata, ImportSource};
use crate::rag::knowledge::{KnowledgeBase, today};
use crate::rag::query::{QueryContext, QueryHandler, format_slack_response};
use crate::slack::images::prepare_image;
use crate::slack::{AppMentionEvent, ChatSurface, SlackFile};
use crate::types::{AppError, NewKnowledgeEntry, Result};
use crate::utils::toml_config::KlugConfigManager;

pub use commands::Command;
use commands::{
    DELETE_HELP, HELP_TEXT, LEARN_USAGE, extract_tags, message_link, parse_delete_filters,
    strip_mentions,
};

pub const LEARN_DENIED: &str = "Sorry, you are not authorized to teach me new things.";
pub const DELETE_DENIED: &str = "Sorry, you are not authorized to delete entries.";
pub const EMPTY_QUESTION: &str =
    "I couldn't understand your question. Please try asking something specific.";

pub const LEARN_APOLOGY: &str = "Sorry, I encountered an error while trying to learn that.";
pub const FILE_APOLOGY: &str = "Sorry, I encountered an error while processing the file.";
pub const DELETE_APOLOGY: &str = "Sorry, I encountered an error while trying to delete entries.";
pub const QUERY_APOLOGY: &str =
    "Sorry, I encountered an error while trying to answer that question.";
pub const GENERIC_APOLOGY: &str = "Sorry, I encountered an error processing your request.";

/// Result of handling one command.
#[derive(Debug)]
pub enum CommandOutcome {
    Reply(String),
    /// The request was refused; the text says why.
    Denied(String),
    /// Something broke. The user sees the apology, the log gets the error.
    Failed {
        apology: &'static str,
        error: AppError,
    },
}

impl CommandOutcome {
    /// Map an error to a denial when it is the user's fault, otherwise to a failure.
    fn from_error(error: AppError, apology: &'static str) -> Self {
        match error.user_facing() {
            Some(reason) => CommandOutcome::Denied(reason),
            None => CommandOutcome::Failed { apology, error },
        }
    }

    /// Text posted back to the thread.
    pub fn message(&self) -> String {
        match self {
            CommandOutcome::Reply(text) | CommandOutcome::Denied(text) => text.clone(),
            CommandOutcome::Failed { apology, .. } => apology.to_string(),
        }
    }
}

pub struct KlugBot {
    config: Arc<KlugConfigManager>,
    chat: Arc<dyn ChatSurface>,
    knowledge: KnowledgeBase,
    ingestor: FileIngestor,
    queries: QueryHandler,
}

impl KlugBot {
    pub fn new(
        config: Arc<KlugConfigManager>,
        chat: Arc<dyn ChatSurface>,
        knowledge: KnowledgeBase,
        ingestor: FileIngestor,
        queries: QueryHandler,
    ) -> Self {
        Self {
            config,
            chat,
            knowledge,
            ingestor,
            queries,
        }
    }

    /// Handle a mention on its own task and reply in its thread.
    ///
    /// A panic inside the handler is caught here and answered with the
    /// generic apology.
    pub async fn dispatch(self: Arc<Self>, event: AppMentionEvent) {
        let bot = Arc::clone(&self);
        let mention = event.clone();
        let handled = tokio::spawn(async move { bot.handle_mention(&mention).await }).await;

        match handled {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(channel = %event.channel, error = %e, "Failed to post reply");
            }
            Err(e) => {
                tracing::error!(channel = %event.channel, error = %e, "Mention handler aborted");
                if let Err(e) = self.reply(&event, GENERIC_APOLOGY).await {
                    tracing::error!(error = %e, "Failed to post apology");
                }
            }
        }
    }

    /// Compute the outcome for a mention and post it.
    pub async fn handle_mention(&self, event: &AppMentionEvent) -> Result<()> {
        if event.bot_id.is_some() {
            tracing::debug!(channel = %event.channel, "Ignoring mention from a bot");
            return Ok(());
        }

        let started = Instant::now();
        let outcome = self.respond(event).await;

        match &outcome {
            CommandOutcome::Reply(_) => {}
            CommandOutcome::Denied(reason) => {
                tracing::info!(user = %event.user, reason = %reason, "Request denied");
            }
            CommandOutcome::Failed { error, .. } => {
                tracing::error!(user = %event.user, channel = %event.channel, error = ?error, "Command failed");
            }
        }

        self.reply(event, &outcome.message()).await?;
        tracing::debug!(
            channel = %event.channel,
            duration_ms = started.elapsed().as_millis() as u64,
            "Mention handled"
        );
        Ok(())
    }

    /// Decide what to say without posting anything.
    pub async fn respond(&self, event: &AppMentionEvent) -> CommandOutcome {
        let config = self.config.config();

        match Command::parse(&event.text) {
            Command::Learn { content } => {
                if !config.slack.is_teacher(&event.user) {
                    return CommandOutcome::Denied(LEARN_DENIED.into());
                }
                if let Some(file) = event.files.first() {
                    return self.learn_file(event, file, config.slack.max_file_size).await;
                }
                if content.is_empty() {
                    return CommandOutcome::Reply(LEARN_USAGE.into());
                }
                self.learn_text(event, content).await
            }
            Command::Delete { filters } => {
                if !config.slack.is_teacher(&event.user) {
                    return CommandOutcome::Denied(DELETE_DENIED.into());
                }
                self.delete(&filters).await
            }
            Command::Query { question } => {
                self.answer(event, &question, config.query_settings()).await
            }
            Command::Help => CommandOutcome::Reply(HELP_TEXT.into()),
        }
    }

    async fn reply(&self, event: &AppMentionEvent, text: &str) -> Result<()> {
        self.chat.post_reply(&event.channel, &event.ts, text).await
    }

    fn permalink(&self, event: &AppMentionEvent) -> Option<String> {
        message_link(
            self.chat.workspace_url(),
            event.team.as_deref(),
            &event.channel,
            &event.ts,
        )
    }

    async fn learn_text(&self, event: &AppMentionEvent, content: String) -> CommandOutcome {
        let mut additional_metadata = serde_json::Map::new();
        additional_metadata.insert("channel".into(), Value::String(event.channel.clone()));
        if let Some(team) = &event.team {
            additional_metadata.insert("team".into(), Value::String(team.clone()));
        }
        additional_metadata.insert("source".into(), Value::String("slack".into()));
        additional_metadata.insert("date".into(), Value::String(today()));

        let entry = NewKnowledgeEntry {
            tags: extract_tags(&content),
            content,
            slack_username: event.user.clone(),
            slack_timestamp: event.ts.clone(),
            source_url: self.permalink(event),
            additional_metadata,
        };

        if let Err(e) = entry.validate() {
            return CommandOutcome::from_error(e, LEARN_APOLOGY);
        }

        match self.knowledge.learn(entry).await {
            Ok(stored) => {
                tracing::info!(user = %event.user, entry_id = %stored.id, tags = ?stored.tags, "Learned entry");
                CommandOutcome::Reply(format!(
                    "I've learned that: {}\nStored with ID: {}",
                    stored.content, stored.id
                ))
            }
            Err(e) => CommandOutcome::from_error(e, LEARN_APOLOGY),
        }
    }

    async fn learn_file(
        &self,
        event: &AppMentionEvent,
        file: &SlackFile,
        max_file_size: u64,
    ) -> CommandOutcome {
        match self.ingest_attachment(event, file, max_file_size).await {
            Ok(summary) => CommandOutcome::Reply(format!(
                "File processing complete:\n• Total chunks: {}\n• Successfully stored: {}\n• Failed: {}",
                summary.total_chunks, summary.stored_chunks, summary.failed_chunks
            )),
            Err(e) => CommandOutcome::from_error(e, FILE_APOLOGY),
        }
    }

    async fn ingest_attachment(
        &self,
        event: &AppMentionEvent,
        file: &SlackFile,
        max_file_size: u64,
    ) -> Result<crate::types::IngestSummary> {
        let info = self.chat.file_info(&file.id).await?;

        if let Some(size) = info.size {
            if size > max_file_size {
                return Err(AppError::FileTooLarge {
                    size,
                    max: max_file_size,
                });
            }
        }

        let file_name = info.name.clone().unwrap_or_else(|| file.id.clone());
        let suffix = match dotted_extension(Path::new(&file_name)) {
            ext if !ext.is_empty() => ext,
            _ => info
                .filetype
                .as_deref()
                .map(|t| format!(".{}", t))
                .unwrap_or_default(),
        };

        let url = info
            .download_url()
            .ok_or_else(|| AppError::Slack(format!("File {} has no download URL", file.id)))?;
        let bytes = self.chat.download(url).await?;

        // Removed when `temp` drops, on every path out of this function
        let temp = tempfile::Builder::new()
            .prefix("klugbot-")
            .suffix(&suffix)
            .tempfile()?;
        tokio::fs::write(temp.path(), &bytes).await?;

        tracing::info!(
            user = %event.user,
            file = %file_name,
            bytes = bytes.len(),
            "Processing uploaded file"
        );

        let metadata = FileMetadata {
            user: event.user.clone(),
            ts: event.ts.clone(),
            file_url: self.permalink(event).or(info.url_private.clone()),
            file_name: Some(file_name),
            import_source: ImportSource::FileUpload,
        };

        self.ingestor
            .process_file(temp.path(), &metadata, Some(max_file_size))
            .await
    }

    async fn delete(&self, text: &str) -> CommandOutcome {
        if text.is_empty() {
            return CommandOutcome::Reply(DELETE_HELP.into());
        }

        let filters = parse_delete_filters(text);
        if filters.is_empty() {
            return CommandOutcome::Reply(format!("No valid filters found. {}", DELETE_HELP));
        }

        let description = filters.describe();
        match self.knowledge.delete_matching(&filters).await {
            Ok(report) if report.is_empty() => {
                CommandOutcome::Reply(format!("No entries found matching {}", description))
            }
            Ok(report) => CommandOutcome::Reply(format!(
                "Successfully deleted entries matching {}\n• Entries removed from the relational store: {}\n• Entries removed from the vector database: {}",
                description, report.relational, report.vector
            )),
            Err(e) => CommandOutcome::from_error(e, DELETE_APOLOGY),
        }
    }

    async fn answer(
        &self,
        event: &AppMentionEvent,
        question: &str,
        settings: crate::rag::query::QuerySettings,
    ) -> CommandOutcome {
        let question = strip_mentions(question);
        if question.is_empty() {
            return CommandOutcome::Reply(EMPTY_QUESTION.into());
        }

        let context = self.gather_context(event).await;

        match self.queries.process_query(&question, &context, settings).await {
            Ok(answer) => {
                CommandOutcome::Reply(format_slack_response(&answer.text, &answer.matches))
            }
            Err(e) => CommandOutcome::from_error(e, QUERY_APOLOGY),
        }
    }

    /// Earlier thread messages and images. Anything that fails is skipped.
    async fn gather_context(&self, event: &AppMentionEvent) -> QueryContext {
        let mut context = QueryContext::default();

        if let Some(thread_ts) = event.thread_ts.as_deref().filter(|_| event.is_thread_reply()) {
            match self.chat.thread_messages(&event.channel, thread_ts).await {
                Ok(messages) => {
                    let mut names: HashMap<String, String> = HashMap::new();
                    let mut lines = Vec::new();

                    for message in messages.iter().filter(|m| m.ts != event.ts) {
                        let user_id = message.user.clone().unwrap_or_else(|| "Unknown".into());
                        let name = match names.get(&user_id) {
                            Some(name) => name.clone(),
                            None => {
                                let name = self.display_name(&user_id).await;
                                names.insert(user_id.clone(), name.clone());
                                name
                            }
                        };

                        let text = strip_mentions(&message.text);
                        if !text.is_empty() {
                            lines.push(format!("{}: {}", name, text));
                        }

                        for file in message.files.iter().filter(|f| f.is_image()) {
                            if let Some(image) = self.fetch_image(file).await {
                                context.images.push(image);
                                lines.push(format!("{}: [Shared an image]", name));
                            }
                        }
                    }

                    if !lines.is_empty() {
                        context.thread = Some(lines.join("\n"));
                    }
                }
                Err(e) => {
                    tracing::warn!(channel = %event.channel, error = %e, "Could not read thread history");
                }
            }
        }

        for file in event.files.iter().filter(|f| f.is_image()) {
            if let Some(image) = self.fetch_image(file).await {
                context.images.push(image);
            }
        }

        context
    }

    async fn display_name(&self, user_id: &str) -> String {
        match self.chat.user_real_name(user_id).await {
            Ok(Some(name)) => name,
            Ok(None) => user_id.to_string(),
            Err(e) => {
                tracing::debug!(user = %user_id, error = %e, "users.info failed");
                format!("User {}", user_id)
            }
        }
    }

    async fn fetch_image(&self, file: &SlackFile) -> Option<crate::types::EncodedImage> {
        let url = file.download_url()?;
        let bytes = match self.chat.download(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(file = %file.id, error = %e, "Image download failed");
                return None;
            }
        };

        match tokio::task::spawn_blocking(move || prepare_image(&bytes)).await {
            Ok(Ok(image)) => Some(image),
            Ok(Err(e)) => {
                tracing::warn!(file = %file.id, error = %e, "Image could not be prepared");
                None
            }
            Err(e) => {
                tracing::warn!(file = %file.id, error = %e, "Image task failed");
                None
            }
        }
    }
}
