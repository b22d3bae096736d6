//! Slack Events API payloads.
//!
//! Only what the bot reacts to is modelled: the URL verification handshake
//! and `app_mention` callbacks. Everything else deserialises to `Unknown`.

use serde::{Deserialize, Serialize};

/// Outer envelope posted to the events endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// Sent once when the request URL is configured.
    UrlVerification { challenge: String },
    /// A subscribed event.
    EventCallback {
        #[serde(default)]
        team_id: Option<String>,
        #[serde(default)]
        event_id: Option<String>,
        event: SlackEvent,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    /// The bot was @mentioned.
    AppMention(AppMentionEvent),
    #[serde(other)]
    Unknown,
}

/// Event payload for app mentions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppMentionEvent {
    /// User who mentioned the bot.
    #[serde(default)]
    pub user: String,
    /// Text of the message (including the mention).
    #[serde(default)]
    pub text: String,
    pub channel: String,
    pub ts: String,
    /// Parent message ts when the mention is a thread reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<SlackFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
}

impl AppMentionEvent {
    /// Whether the mention sits inside an existing thread.
    pub fn is_thread_reply(&self) -> bool {
        self.thread_ts
            .as_deref()
            .is_some_and(|thread_ts| thread_ts != self.ts)
    }
}

/// File attached to a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlackFile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub filetype: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub url_private: Option<String>,
    #[serde(default)]
    pub url_private_download: Option<String>,
}

impl SlackFile {
    pub fn is_image(&self) -> bool {
        self.mimetype
            .as_deref()
            .is_some_and(|m| m.starts_with("image/"))
    }

    /// Best URL to fetch the file body from.
    pub fn download_url(&self) -> Option<&str> {
        self.url_private_download
            .as_deref()
            .or(self.url_private.as_deref())
    }
}

/// A message returned by `conversations.replies`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadMessage {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    pub ts: String,
    #[serde(default)]
    pub files: Vec<SlackFile>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_verification() {
        let envelope: EventEnvelope = serde_json::from_str(
            r#"{"token":"t","challenge":"3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P","type":"url_verification"}"#,
        )
        .unwrap();

        match envelope {
            EventEnvelope::UrlVerification { challenge } => {
                assert!(challenge.starts_with("3eZbrw1a"))
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
    }

    #[test]
    fn test_app_mention_with_files() {
        let envelope: EventEnvelope = serde_json::from_str(
            r#"{
                "type": "event_callback",
                "team_id": "T123",
                "event_id": "Ev1",
                "event": {
                    "type": "app_mention",
                    "user": "U1",
                    "text": "<@UBOT> --learn",
                    "channel": "C1",
                    "ts": "1700000000.000200",
                    "thread_ts": "1700000000.000100",
                    "team": "T123",
                    "files": [{"id": "F1", "name": "notes.pdf", "mimetype": "application/pdf"}]
                }
            }"#,
        )
        .unwrap();

        let EventEnvelope::EventCallback { event, .. } = envelope else {
            panic!("expected event callback");
        };
        let SlackEvent::AppMention(mention) = event else {
            panic!("expected app mention");
        };
        assert_eq!(mention.files.len(), 1);
        assert!(!mention.files[0].is_image());
        assert!(mention.is_thread_reply());
    }

    #[test]
    fn test_unknown_event_types() {
        let envelope: EventEnvelope = serde_json::from_str(
            r#"{"type":"event_callback","event":{"type":"reaction_added","user":"U1"}}"#,
        )
        .unwrap();
        assert!(matches!(
            envelope,
            EventEnvelope::EventCallback {
                event: SlackEvent::Unknown,
                ..
            }
        ));

        let envelope: EventEnvelope =
            serde_json::from_str(r#"{"type":"app_rate_limited","minute_rate_limited":1}"#).unwrap();
        assert!(matches!(envelope, EventEnvelope::Unknown));
    }
}
