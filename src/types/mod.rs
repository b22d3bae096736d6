use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use uuid::Uuid;

/// Maximum number of tags a knowledge entry may carry.
pub const MAX_TAGS: usize = 3;

static KEBAB_CASE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("static regex is valid")
});

// ============= Knowledge Types =============

/// A stored fact, either taught directly in chat or imported from a file chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeEntry {
    pub id: Uuid,
    pub content: String,
    /// Slack user id of the author.
    pub slack_username: String,
    /// Slack message `ts` (or file mtime for offline imports).
    pub slack_timestamp: String,
    pub source_url: Option<String>,
    pub tags: Vec<String>,
    pub additional_metadata: serde_json::Map<String, serde_json::Value>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    /// Reads a string value out of `additional_metadata`.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.additional_metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Fields required to create a knowledge entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewKnowledgeEntry {
    pub content: String,
    pub slack_username: String,
    pub slack_timestamp: String,
    pub source_url: Option<String>,
    pub tags: Vec<String>,
    pub additional_metadata: serde_json::Map<String, serde_json::Value>,
}

impl NewKnowledgeEntry {
    /// Checks content and tag constraints before anything is persisted.
    pub fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(AppError::InvalidInput("Content must not be empty".into()));
        }
        validate_tags(&self.tags)
    }
}

/// Partial update of a knowledge entry. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    pub content: Option<String>,
    pub source_url: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub additional_metadata: Option<serde_json::Map<String, serde_json::Value>>,
    pub embedding: Option<Vec<f32>>,
}

impl EntryUpdate {
    pub fn embedding(embedding: Vec<f32>) -> Self {
        Self {
            embedding: Some(embedding),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.source_url.is_none()
            && self.tags.is_none()
            && self.additional_metadata.is_none()
            && self.embedding.is_none()
    }
}

/// Validates the tag list of an entry: at most three kebab-case tags.
pub fn validate_tags(tags: &[String]) -> Result<()> {
    if tags.len() > MAX_TAGS {
        return Err(AppError::InvalidInput("Maximum 3 tags allowed".into()));
    }
    for tag in tags {
        if !KEBAB_CASE.is_match(tag) {
            return Err(AppError::InvalidInput(format!(
                "Tag \"{}\" must be in kebab-case format",
                tag
            )));
        }
    }
    Ok(())
}

/// Exact-match filters used by bulk deletion. All present keys must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFilters {
    pub url: Option<String>,
    pub source: Option<String>,
    pub date: Option<String>,
}

impl DeleteFilters {
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.source.is_none() && self.date.is_none()
    }

    /// Filter pairs keyed the way vector metadata stores them (`url` lives under `source_url`).
    pub fn metadata_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(url) = &self.url {
            pairs.push(("source_url".to_string(), url.clone()));
        }
        if let Some(source) = &self.source {
            pairs.push(("source".to_string(), source.clone()));
        }
        if let Some(date) = &self.date {
            pairs.push(("date".to_string(), date.clone()));
        }
        pairs
    }

    /// Human readable form: `URL 'x', source 'y' and date 'z'`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(url) = &self.url {
            parts.push(format!("URL '{}'", url));
        }
        if let Some(source) = &self.source {
            parts.push(format!("source '{}'", source));
        }
        if let Some(date) = &self.date {
            parts.push(format!("date '{}'", date));
        }

        match parts.len() {
            0 => String::new(),
            1 => parts.remove(0),
            n => {
                let last = parts.remove(n - 1);
                format!("{} and {}", parts.join(", "), last)
            }
        }
    }
}

// ============= Vector Types =============

/// A record written to the vector index. The id equals the knowledge entry id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub document: String,
}

/// A ranked match returned from a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub document: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Cosine distance (`1 - similarity`), smaller is closer.
    pub distance: f32,
}

impl VectorMatch {
    pub fn source_url(&self) -> Option<&str> {
        self.metadata
            .get("source_url")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

// ============= LLM Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A base64 encoded image attached to a prompt turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: String,
}

impl EncodedImage {
    pub fn jpeg(data: String) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }
}

/// One turn of a model conversation, optionally carrying images.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub text: String,
    pub images: Vec<EncodedImage>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<EncodedImage>) -> Self {
        self.images = images;
        self
    }
}

// ============= Ingestion Types =============

/// Chunk counts reported after a file has been processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub total_chunks: usize,
    pub stored_chunks: usize,
    pub failed_chunks: usize,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Slack API error: {0}")]
    Slack(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Message shown to a chat user for errors that are their own doing.
    ///
    /// Returns `None` for failures whose details belong in the logs only.
    pub fn user_facing(&self) -> Option<String> {
        match self {
            AppError::InvalidInput(msg) | AppError::Unauthorized(msg) => Some(msg.clone()),
            AppError::UnsupportedFormat(_) | AppError::FileTooLarge { .. } => Some(self.to_string()),
            _ => None,
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_)
            | AppError::UnsupportedFormat(_)
            | AppError::FileTooLarge { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_validation() {
        assert!(validate_tags(&["rust".into(), "web-dev".into(), "v2".into()]).is_ok());

        let too_many = validate_tags(&["a".into(), "b".into(), "c".into(), "d".into()]);
        assert_eq!(
            too_many.unwrap_err().to_string(),
            "Invalid input: Maximum 3 tags allowed"
        );

        let bad = validate_tags(&["Web_Dev".into()]).unwrap_err();
        assert!(bad
            .to_string()
            .contains("Tag \"Web_Dev\" must be in kebab-case format"));
        assert!(validate_tags(&["trailing-".into()]).is_err());
    }

    #[test]
    fn test_delete_filter_description() {
        let filters = DeleteFilters {
            url: Some("https://example.com".into()),
            source: Some("offline".into()),
            date: Some("2025-02-22".into()),
        };
        assert_eq!(
            filters.describe(),
            "URL 'https://example.com', source 'offline' and date '2025-02-22'"
        );

        let single = DeleteFilters {
            source: Some("slack".into()),
            ..Default::default()
        };
        assert_eq!(single.describe(), "source 'slack'");
        assert_eq!(
            single.metadata_pairs(),
            vec![("source".to_string(), "slack".to_string())]
        );
    }

    #[test]
    fn test_url_filter_maps_to_source_url() {
        let filters = DeleteFilters {
            url: Some("https://a.b".into()),
            ..Default::default()
        };
        assert_eq!(filters.metadata_pairs()[0].0, "source_url");
    }

    #[test]
    fn test_file_too_large_message() {
        let err = AppError::FileTooLarge { size: 20, max: 10 };
        assert_eq!(err.to_string(), "File too large: 20 bytes (max: 10 bytes)");
        assert_eq!(err.user_facing().as_deref(), Some("File too large: 20 bytes (max: 10 bytes)"));
        assert!(AppError::Database("x".into()).user_facing().is_none());
    }
}
