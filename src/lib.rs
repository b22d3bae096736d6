//! # klugbot - Slack knowledge assistant
//!
//! klugbot learns facts and documents from authorized Slack users and answers
//! questions grounded in what it has learned (retrieval-augmented generation).
//!
//! ## Overview
//!
//! klugbot can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `klugbot` binary and point a Slack
//!    app's event subscription at `POST /slack/events`
//! 2. **As a library** - Reuse the chunker, extractors, stores or query
//!    pipeline in your own Rust project
//!
//! ## Chat Commands
//!
//! | Message | Effect |
//! |---------|--------|
//! | `@klug-bot --learn <text>` | Store a fact (teachers only) |
//! | `@klug-bot --learn` + file | Ingest a PDF, CSV, JSON or text file (teachers only) |
//! | `@klug-bot --delete source:slack date:2025-02-22` | Remove matching entries (teachers only) |
//! | `@klug-bot <question>` | Answer from stored knowledge, with references |
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use klugbot::rag::chunker::TextChunker;
//!
//! let chunker = TextChunker::new(5000, 200)?;
//! for chunk in chunker.chunks(&document) {
//!     println!("{}", chunk);
//! }
//! ```
//!
//! ### Configuration-Driven Setup
//!
//! ```rust,ignore
//! use klugbot::{AppState, KlugConfigManager};
//! use std::sync::Arc;
//!
//! let config_manager = Arc::new(KlugConfigManager::new("klugbot.toml")?);
//! let state = AppState::from_config(config_manager).await?;
//! let app = klugbot::router(state);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Answer with a local Ollama model instead of Gemini |
//! | `local-embeddings` | Embed locally with fastembed instead of Gemini |
//!
//! ## Modules
//!
//! - [`api`] - Slack webhook and health routes
//! - [`bot`] - Command parsing and handling
//! - [`db`] - Relational store (libsql) and vector stores
//! - [`llm`] - Answer generation clients
//! - [`rag`] - Chunking, extraction, ingestion and retrieval
//! - [`slack`] - Slack events, signatures and Web API client
//! - [`types`] - Common types and error handling

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Slack bot controller.
pub mod bot;
/// Command line interface.
pub mod cli;
/// Database clients (Turso/SQLite, vector stores).
pub mod db;
/// LLM provider clients and abstractions.
pub mod llm;
/// Retrieval Augmented Generation (RAG) components.
pub mod rag;
/// Slack integration.
pub mod slack;
/// Core types and errors.
pub mod types;
/// Configuration utilities (TOML).
pub mod utils;

// Re-export commonly used types
pub use bot::KlugBot;
pub use db::{KnowledgeStore, TursoClient, VectorStore};
pub use llm::{LLMClient, Provider};
pub use types::{AppError, Result};
pub use utils::toml_config::{KlugConfig, KlugConfigManager};

use crate::rag::chunker::TextChunker;
use crate::rag::ingest::FileIngestor;
use crate::rag::knowledge::KnowledgeBase;
use crate::rag::query::QueryHandler;
use crate::slack::{ChatSurface, SignatureVerifier, SlackClient};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML configuration with hot-reload support
    pub config_manager: Arc<KlugConfigManager>,
    /// Handles mentions received on the webhook
    pub bot: Arc<KlugBot>,
    /// Checks Slack request signatures
    pub verifier: Arc<SignatureVerifier>,
}

impl AppState {
    /// Assemble the state from already constructed collaborators.
    pub fn new(
        config_manager: Arc<KlugConfigManager>,
        chat: Arc<dyn ChatSurface>,
        knowledge: KnowledgeBase,
        llm: Arc<dyn LLMClient>,
        chunker: TextChunker,
        verifier: SignatureVerifier,
    ) -> Self {
        let ingestor = FileIngestor::new(knowledge.clone(), chunker);
        let queries = QueryHandler::new(knowledge.clone(), llm);
        let bot = KlugBot::new(config_manager.clone(), chat, knowledge, ingestor, queries);

        Self {
            config_manager,
            bot: Arc::new(bot),
            verifier: Arc::new(verifier),
        }
    }

    /// Connect every client named in the configuration.
    ///
    /// Clients are created once here and shared by all requests.
    pub async fn from_config(config_manager: Arc<KlugConfigManager>) -> Result<Self> {
        let config = config_manager.config();
        config.validate_for_server()?;

        let knowledge = connect_knowledge_base(&config).await?;

        let provider = config.llm_provider()?;
        tracing::info!(provider = provider.name(), model = %config.llm.model, "LLM client ready");
        let llm: Arc<dyn LLMClient> = Arc::from(provider.create_client()?);

        let slack = SlackClient::new(config.slack_bot_token()?, config.slack.api_base.clone());
        let slack = match config.slack.workspace_url.as_deref() {
            Some(url) => slack.with_workspace_url(url),
            None => slack.discover_workspace_url().await,
        };

        Ok(Self::new(
            config_manager.clone(),
            Arc::new(slack),
            knowledge,
            llm,
            config.chunker()?,
            SignatureVerifier::new(config.slack_signing_secret()?),
        ))
    }
}

/// Open the relational store, vector store and embedder named in `config`.
pub async fn connect_knowledge_base(config: &KlugConfig) -> Result<KnowledgeBase> {
    let store = config.database_provider().create_store().await?;
    let vectors = config.vector_provider().create_store().await?;
    let embedder = config.embedding_provider()?.create_embedder()?;

    tracing::info!(
        database = %config.database.url,
        vectors = vectors.provider_name(),
        embedding_model = embedder.model_name(),
        "Knowledge base connected"
    );

    Ok(KnowledgeBase::new(
        Arc::from(store),
        Arc::from(vectors),
        Arc::from(embedder),
    ))
}

/// The HTTP application with state attached.
pub fn router(state: AppState) -> axum::Router {
    let body_limit = state.config_manager.config().server.body_limit_bytes;
    api::routes::create_router(body_limit).with_state(state)
}
