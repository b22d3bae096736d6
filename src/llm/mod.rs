//! LLM Provider Clients and Abstractions
//!
//! Answers are written by a hosted generative model. This module hides the
//! provider behind the [`LLMClient`] trait so the query pipeline only deals
//! with structured [`ChatTurn`](crate::types::ChatTurn)s.
//!
//! # Supported Providers
//!
//! - Gemini (always available)
//! - `ollama` - Local Ollama server (Cargo feature)
//!
//! # Example
//!
//! ```ignore
//! use klugbot::llm::{GenerationParams, Provider};
//! use klugbot::types::ChatTurn;
//!
//! let client = Provider::Gemini {
//!     api_key,
//!     base_url: klugbot::llm::gemini::DEFAULT_BASE_URL.into(),
//!     model: "gemini-2.0-flash".into(),
//!     params: GenerationParams::default(),
//! }
//! .create_client()?;
//!
//! let answer = client.complete(&[ChatTurn::user("What is 2+2?")]).await?;
//! ```

/// Core LLM client trait and provider selection.
pub mod client;
/// Google Gemini REST client.
pub mod gemini;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use client::{GenerationParams, LLMClient, Provider};
