//! Slack Web API client.
//!
//! The bot only talks to Slack through the [`ChatSurface`] trait so that
//! handlers can be exercised without a workspace.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::events::{SlackFile, ThreadMessage};
use crate::types::{AppError, Result};

/// Public Slack Web API endpoint.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";
/// Used for permalinks when the workspace URL is unknown.
pub const FALLBACK_WORKSPACE_URL: &str = "https://slack.com/";

/// Everything the bot needs from the chat platform.
#[async_trait]
pub trait ChatSurface: Send + Sync {
    /// Post `text` as a reply in the thread of `thread_ts`.
    async fn post_reply(&self, channel: &str, thread_ts: &str, text: &str) -> Result<()>;

    /// Resolve full file details, including the private download URL.
    async fn file_info(&self, file_id: &str) -> Result<SlackFile>;

    /// Fetch a private file body with bot credentials.
    async fn download(&self, url: &str) -> Result<Vec<u8>>;

    /// All messages of a thread, parent first.
    async fn thread_messages(&self, channel: &str, thread_ts: &str) -> Result<Vec<ThreadMessage>>;

    /// Display name of a user, if Slack knows one.
    async fn user_real_name(&self, user_id: &str) -> Result<Option<String>>;

    /// Workspace base URL ending in `/`, used to build message permalinks.
    fn workspace_url(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Value,
}

/// Identity of the bot token, from `auth.test`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthInfo {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

pub struct SlackClient {
    client: reqwest::Client,
    bot_token: String,
    api_base: String,
    workspace_url: String,
}

impl SlackClient {
    pub fn new(bot_token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_token: bot_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            workspace_url: FALLBACK_WORKSPACE_URL.to_string(),
        }
    }

    /// Set the permalink base, normalised to end with `/`.
    pub fn with_workspace_url(mut self, url: &str) -> Self {
        self.workspace_url = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{}/", url)
        };
        self
    }

    /// Fill the workspace URL from `auth.test`, keeping the fallback on failure.
    pub async fn discover_workspace_url(self) -> Self {
        match self.auth_test().await {
            Ok(AuthInfo { url: Some(url), .. }) => {
                tracing::info!(workspace = %url, "Resolved Slack workspace URL");
                self.with_workspace_url(&url)
            }
            Ok(_) => self,
            Err(e) => {
                tracing::warn!(error = %e, "auth.test failed, using fallback workspace URL");
                self
            }
        }
    }

    pub async fn auth_test(&self) -> Result<AuthInfo> {
        let value = self.api_post("auth.test", &json!({})).await?;
        serde_json::from_value(value)
            .map_err(|e| AppError::Slack(format!("Invalid auth.test response: {}", e)))
    }

    async fn api_post(&self, method: &str, payload: &serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(format!("{}/{}", self.api_base, method))
            .bearer_auth(&self.bot_token)
            .header("Content-Type", "application/json; charset=utf-8")
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::Slack(format!("{} request failed: {}", method, e)))?;

        Self::unwrap_response(method, response).await
    }

    async fn api_get(&self, method: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(format!("{}/{}", self.api_base, method))
            .bearer_auth(&self.bot_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Slack(format!("{} request failed: {}", method, e)))?;

        Self::unwrap_response(method, response).await
    }

    async fn unwrap_response(method: &str, response: reqwest::Response) -> Result<serde_json::Value> {
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("?")
                .to_string();
            return Err(AppError::Slack(format!(
                "{} rate limited, retry after {}s",
                method, retry_after
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Slack(format!("{} failed: {}: {}", method, status, body)));
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| AppError::Slack(format!("Invalid {} response: {}", method, e)))?;

        if !envelope.ok {
            return Err(AppError::Slack(format!(
                "{} returned error: {}",
                method,
                envelope.error.unwrap_or_else(|| "unknown_error".into())
            )));
        }

        Ok(envelope.rest)
    }
}

#[async_trait]
impl ChatSurface for SlackClient {
    async fn post_reply(&self, channel: &str, thread_ts: &str, text: &str) -> Result<()> {
        self.api_post(
            "chat.postMessage",
            &json!({
                "channel": channel,
                "thread_ts": thread_ts,
                "text": text,
            }),
        )
        .await?;
        Ok(())
    }

    async fn file_info(&self, file_id: &str) -> Result<SlackFile> {
        let mut value = self.api_get("files.info", &[("file", file_id)]).await?;
        serde_json::from_value(value["file"].take())
            .map_err(|e| AppError::Slack(format!("Invalid files.info response: {}", e)))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.bot_token)
            .send()
            .await
            .map_err(|e| AppError::Slack(format!("File download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Slack(format!(
                "File download failed: {}",
                response.status()
            )));
        }

        // a missing files:read scope yields the HTML login page instead of the file
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/html"));
        if is_html {
            return Err(AppError::Slack(
                "File download returned HTML, check the files:read scope".into(),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Slack(format!("File download failed: {}", e)))?;
        Ok(bytes.to_vec())
    }

    async fn thread_messages(&self, channel: &str, thread_ts: &str) -> Result<Vec<ThreadMessage>> {
        let mut value = self
            .api_get(
                "conversations.replies",
                &[("channel", channel), ("ts", thread_ts), ("limit", "200")],
            )
            .await?;
        serde_json::from_value(value["messages"].take())
            .map_err(|e| AppError::Slack(format!("Invalid conversations.replies response: {}", e)))
    }

    async fn user_real_name(&self, user_id: &str) -> Result<Option<String>> {
        let value = self.api_get("users.info", &[("user", user_id)]).await?;
        let user = &value["user"];

        Ok(user["real_name"]
            .as_str()
            .or_else(|| user["profile"]["real_name"].as_str())
            .filter(|name| !name.is_empty())
            .map(str::to_string))
    }

    fn workspace_url(&self) -> &str {
        &self.workspace_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_url_normalised() {
        let client = SlackClient::new("xoxb-test", DEFAULT_API_BASE).with_workspace_url("https://acme.slack.com");
        assert_eq!(client.workspace_url(), "https://acme.slack.com/");

        let fallback = SlackClient::new("xoxb-test", DEFAULT_API_BASE);
        assert_eq!(fallback.workspace_url(), FALLBACK_WORKSPACE_URL);
    }
}
