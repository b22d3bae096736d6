//! Knowledge store abstraction
//!
//! This module provides the `KnowledgeStore` trait that abstracts over the
//! relational backends holding knowledge entries (in-memory SQLite,
//! file-based SQLite, remote Turso).
//!
//! # Example
//!
//! ```rust,ignore
//! use klugbot::db::{DatabaseProvider, KnowledgeStore};
//!
//! // Ephemeral store for tests
//! let store = DatabaseProvider::Memory.create_store().await?;
//!
//! // File-based SQLite
//! let store = DatabaseProvider::SQLite { path: "data/klugbot.db".into() }
//!     .create_store()
//!     .await?;
//! ```

use crate::types::{DeleteFilters, EntryUpdate, KnowledgeEntry, NewKnowledgeEntry, Result};
use async_trait::async_trait;
use uuid::Uuid;

/// Database provider configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatabaseProvider {
    /// In-memory SQLite database (ephemeral, lost on restart)
    #[default]
    Memory,
    /// File-based SQLite database
    SQLite {
        /// Path to the SQLite database file
        path: String,
    },
    /// Remote Turso database
    Turso {
        /// The Turso database URL (e.g., `libsql://your-db.turso.io`)
        url: String,
        /// Authentication token for the Turso database
        auth_token: String,
    },
}

impl DatabaseProvider {
    /// Create a knowledge store from this provider configuration
    pub async fn create_store(&self) -> Result<Box<dyn KnowledgeStore>> {
        match self {
            DatabaseProvider::Memory => {
                let client = super::turso::TursoClient::new_memory().await?;
                Ok(Box::new(client))
            }
            DatabaseProvider::SQLite { path } => {
                let client = super::turso::TursoClient::new_local(path).await?;
                Ok(Box::new(client))
            }
            DatabaseProvider::Turso { url, auth_token } => {
                let client =
                    super::turso::TursoClient::new_remote(url.clone(), auth_token.clone()).await?;
                Ok(Box::new(client))
            }
        }
    }

    /// Resolve the provider from a configured path and optional Turso credentials.
    ///
    /// Turso wins when both URL and token are non-empty; `:memory:` or an empty
    /// path selects the in-memory database.
    pub fn resolve(path: &str, turso_url: Option<String>, turso_token: Option<String>) -> Self {
        if let (Some(url), Some(auth_token)) = (turso_url, turso_token) {
            if !url.is_empty() && !auth_token.is_empty() {
                return DatabaseProvider::Turso { url, auth_token };
            }
        }

        if path.is_empty() || path == ":memory:" {
            DatabaseProvider::Memory
        } else {
            DatabaseProvider::SQLite {
                path: path.to_string(),
            }
        }
    }
}

/// Relational storage of knowledge entries.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Validate and persist a new entry, returning it with its generated id.
    async fn create(&self, entry: NewKnowledgeEntry) -> Result<KnowledgeEntry>;

    async fn get(&self, id: Uuid) -> Result<Option<KnowledgeEntry>>;

    /// Apply a partial update and refresh `updated_at`. `None` if the id is unknown.
    async fn update(&self, id: Uuid, update: EntryUpdate) -> Result<Option<KnowledgeEntry>>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Delete every entry matching all given filters.
    ///
    /// Returns the number of removed rows and their ids. Empty filters are rejected.
    async fn delete_where(&self, filters: &DeleteFilters) -> Result<(usize, Vec<String>)>;

    /// Entries sharing at least one tag with `tags`.
    async fn search_by_tags(&self, tags: &[String]) -> Result<Vec<KnowledgeEntry>>;
}
