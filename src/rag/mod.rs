//! Retrieval Augmented Generation (RAG) Pipeline
//!
//! This module holds everything between a raw document and a grounded answer.
//!
//! # Module Structure
//!
//! - [`rag::chunker`](crate::rag::chunker) - Boundary-aware overlapping chunks
//! - [`rag::extract`](crate::rag::extract) - PDF/CSV/JSON/text normalisation
//! - [`rag::embeddings`](crate::rag::embeddings) - Embedding providers
//! - [`rag::knowledge`](crate::rag::knowledge) - Relational + vector writes kept in step
//! - [`rag::ingest`](crate::rag::ingest) - File and directory ingestion
//! - [`rag::query`](crate::rag::query) - Retrieval, prompting and reply formatting
//!
//! # RAG Pipeline
//!
//! 1. **Ingestion** - Files are extracted and chunked
//! 2. **Storage** - Each chunk becomes an entry plus an embedding
//! 3. **Retrieval** - The question is embedded, nearest entries retrieved
//! 4. **Generation** - The model answers from the retrieved entries only
//!
//! # Example
//!
//! ```ignore
//! use klugbot::rag::{ingest::FileIngestor, query::QueryHandler};
//!
//! let summary = ingestor.process_file(&path, &metadata, Some(10 * 1024 * 1024)).await?;
//! let answer = query_handler
//!     .process_query("When do we deploy?", &Default::default(), Default::default())
//!     .await?;
//! ```

pub mod chunker;
pub mod embeddings;
pub mod extract;
pub mod ingest;
pub mod knowledge;
pub mod query;
