//! Slack integration.
//!
//! - [`events`] - Events API payloads received on the webhook
//! - [`signature`] - Request signing verification
//! - [`client`] - Web API client behind the [`ChatSurface`] trait
//! - [`images`] - Attachment preparation for multimodal prompts

pub mod client;
pub mod events;
pub mod images;
pub mod signature;

pub use client::{ChatSurface, SlackClient};
pub use events::{AppMentionEvent, EventEnvelope, SlackEvent, SlackFile, ThreadMessage};
pub use signature::SignatureVerifier;
