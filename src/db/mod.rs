//! Database clients and vector stores.
//!
//! This module provides the two storage layers behind the knowledge base:
//! - **Turso/SQLite**: relational store of knowledge entries
//! - **Vector Stores**: the embedding collection queried at answer time
//!
//! # Vector Store Providers
//!
//! - `memory` - In-process store, nothing persisted
//! - `chromadb` - ChromaDB server over HTTP

#![allow(missing_docs)]

// Vector store abstraction layer
pub mod vectorstore;

// Provider implementations
pub mod chromadb;

// Relational database
pub mod traits;
pub mod turso;

// Re-exports
pub use chromadb::ChromaDBStore;
pub use traits::{DatabaseProvider, KnowledgeStore};
pub use turso::TursoClient;
pub use vectorstore::{InMemoryVectorStore, VectorStore, VectorStoreProvider};
