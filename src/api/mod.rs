//! HTTP API Handlers and Routes
//!
//! The HTTP surface is small: Slack pushes events to one webhook, and a
//! health probe answers load balancers.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! - `POST /slack/events` - Slack Events API (signed requests only)
//! - `GET /` and `GET /health` - Health check, `{"status": "healthy"}`
//!
//! # Authentication
//!
//! Slack signs every request with the app's signing secret:
//! ```text
//! X-Slack-Request-Timestamp: 1531420618
//! X-Slack-Signature: v0=<hex hmac-sha256 of "v0:{timestamp}:{body}">
//! ```
//! Unsigned, mis-signed or stale requests get `401`.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
