//! API request handlers.

/// Liveness probe.
pub mod health;
/// Slack Events API webhook.
pub mod slack;
