//! Mention parsing.
//!
//! Messages arrive as `<@BOTID> ...`. Learn and delete are tried before the
//! catch-all question pattern, so no look-ahead is needed.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::{DeleteFilters, MAX_TAGS};

static LEARN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*<@[A-Z0-9]+>\s+--learn\b(?:\s+(?P<content>.+))?")
        .expect("static regex is valid")
});

static DELETE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*<@[A-Z0-9]+>\s+--delete\b(?:\s+(?P<filters>.+))?")
        .expect("static regex is valid")
});

static QUERY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*<@[A-Z0-9]+>\s+(?P<query>.+)").expect("static regex is valid")
});

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@[A-Za-z0-9]+>").expect("static regex is valid"));

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("static regex is valid"));

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("static regex is valid"));

static DELETE_FILTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(url|source|date):([^\s]+)").expect("static regex is valid")
});

const STOPWORDS: [&str; 7] = ["the", "a", "an", "in", "on", "at", "to"];

pub const HELP_TEXT: &str = "Here's how you can use me:\n\
• `@klug-bot --learn <content>`: teach me something new (attach a file to learn its contents)\n\
• `@klug-bot --delete url:<url> | source:<source> | date:<YYYY-MM-DD>`: remove matching entries\n\
• `@klug-bot <question>`: ask me anything I've learned\n\
Learning and deleting are limited to authorized users.";

pub const LEARN_USAGE: &str =
    "I couldn't understand what you want me to learn. Usage: @klug-bot --learn <content to learn>.";

pub const DELETE_HELP: &str = "Delete usage examples:\n\
• `@klug-bot --delete url:https://example.com`\n\
• `@klug-bot --delete source:slack`\n\
• `@klug-bot --delete date:2025-02-22`\n\
• `@klug-bot --delete source:offline date:2025-02-22`";

/// What a mention asks the bot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `--learn`, with the text after the flag (empty when only a file is attached).
    Learn { content: String },
    /// `--delete`, with the raw filter text.
    Delete { filters: String },
    Query { question: String },
    /// A bare mention.
    Help,
}

impl Command {
    pub fn parse(text: &str) -> Command {
        if let Some(caps) = LEARN_PATTERN.captures(text) {
            return Command::Learn {
                content: capture_trimmed(&caps, "content"),
            };
        }
        if let Some(caps) = DELETE_PATTERN.captures(text) {
            return Command::Delete {
                filters: capture_trimmed(&caps, "filters"),
            };
        }
        if let Some(caps) = QUERY_PATTERN.captures(text) {
            let question = capture_trimmed(&caps, "query");
            if !question.is_empty() {
                return Command::Query { question };
            }
        }
        Command::Help
    }
}

fn capture_trimmed(caps: &regex::Captures<'_>, name: &str) -> String {
    caps.name(name)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Remove `<@USER>` mentions and surrounding whitespace.
pub fn strip_mentions(text: &str) -> String {
    MENTION.replace_all(text, "").trim().to_string()
}

/// Up to three kebab-case tags from `#Hashtags`. Without hashtags the first
/// word is used unless it is a stopword.
pub fn extract_tags(content: &str) -> Vec<String> {
    let hashtags: Vec<String> = HASHTAG
        .captures_iter(content)
        .map(|caps| {
            CAMEL_BOUNDARY
                .replace_all(&caps[1], "$1-$2")
                .to_lowercase()
                .replace('_', "-")
        })
        .filter(|tag| {
            tag.split('-')
                .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric()))
        })
        .take(MAX_TAGS)
        .collect();

    if !hashtags.is_empty() {
        return hashtags;
    }

    content
        .split_whitespace()
        .next()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|word| !word.is_empty() && !STOPWORDS.contains(&word.as_str()))
        .into_iter()
        .collect()
}

/// Permalink to a message, when all parts are known.
pub fn message_link(
    workspace_url: &str,
    team: Option<&str>,
    channel: &str,
    ts: &str,
) -> Option<String> {
    if team.is_none_or(str::is_empty) || channel.is_empty() || ts.is_empty() {
        return None;
    }
    Some(format!(
        "{}archives/{}/p{}",
        workspace_url,
        channel,
        ts.replace('.', "")
    ))
}

/// Parse `url:`, `source:` and `date:` pairs. A bare link counts as `url:`.
pub fn parse_delete_filters(text: &str) -> DeleteFilters {
    let mut filters = DeleteFilters::default();

    for caps in DELETE_FILTER.captures_iter(text) {
        let value = caps[2].to_string();
        match caps[1].to_lowercase().as_str() {
            "url" => filters.url = Some(unwrap_slack_link(&value)),
            "source" => filters.source = Some(value),
            "date" => filters.date = Some(value),
            _ => {}
        }
    }

    if filters.is_empty() && (text.contains("http://") || text.contains("https://")) {
        filters.url = Some(unwrap_slack_link(text.trim()));
    }

    filters
}

/// Slack renders links as `<https://x>` or `<https://x|label>`.
fn unwrap_slack_link(value: &str) -> String {
    let inner = value.trim_start_matches('<').trim_end_matches('>');
    inner.split('|').next().unwrap_or(inner).to_string()
}
