//! TOML-based configuration for klugbot
//!
//! Everything is read from `klugbot.toml`. Secrets are never stored in the
//! file itself; each section names the environment variable that holds them.
//!
//! # Hot Reloading
//!
//! Changes to the file are picked up at runtime. The teachers list and the
//! query settings are read per request, so they apply without a restart.
//! Use [`KlugConfigManager`] for thread-safe access to the current config.

use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::db::{DatabaseProvider, VectorStoreProvider};
use crate::llm::{GenerationParams, Provider};
use crate::rag::chunker::{DEFAULT_MAX_CHARS, DEFAULT_OVERLAP_CHARS, TextChunker};
use crate::rag::embeddings::EmbeddingProvider;
use crate::rag::query::QuerySettings;

const GEMINI_BASE_URL: &str = crate::llm::gemini::DEFAULT_BASE_URL;

/// Root configuration structure loaded from klugbot.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KlugConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Largest accepted webhook body.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

// ============= Slack Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,

    #[serde(default = "default_signing_secret_env")]
    pub signing_secret_env: String,

    #[serde(default = "default_slack_api_base")]
    pub api_base: String,

    /// Permalink base such as `https://acme.slack.com/`. Discovered via
    /// `auth.test` when unset.
    #[serde(default)]
    pub workspace_url: Option<String>,

    /// Slack user ids allowed to learn and delete.
    #[serde(default)]
    pub teachers: Vec<String>,

    /// Upper bound for files attached to `--learn`, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_bot_token_env() -> String {
    "SLACK_BOT_TOKEN".to_string()
}

fn default_signing_secret_env() -> String {
    "SLACK_SIGNING_SECRET".to_string()
}

fn default_slack_api_base() -> String {
    crate::slack::client::DEFAULT_API_BASE.to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token_env: default_bot_token_env(),
            signing_secret_env: default_signing_secret_env(),
            api_base: default_slack_api_base(),
            workspace_url: None,
            teachers: Vec::new(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl SlackConfig {
    pub fn is_teacher(&self, user_id: &str) -> bool {
        self.teachers.iter().any(|t| t == user_id)
    }
}

// ============= Storage Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Local SQLite path, or `:memory:`.
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Env var holding a Turso URL; used instead of `url` when set.
    #[serde(default)]
    pub turso_url_env: Option<String>,

    #[serde(default)]
    pub turso_token_env: Option<String>,
}

fn default_database_url() -> String {
    "./data/klugbot.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            turso_url_env: None,
            turso_token_env: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Memory,
    Chromadb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    #[serde(default)]
    pub provider: VectorBackend,

    #[serde(default = "default_chroma_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_tenant")]
    pub tenant: String,

    #[serde(default = "default_chroma_database")]
    pub database: String,
}

fn default_chroma_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_collection() -> String {
    crate::db::vectorstore::DEFAULT_COLLECTION.to_string()
}

fn default_tenant() -> String {
    "default_tenant".to_string()
}

fn default_chroma_database() -> String {
    "default_database".to_string()
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            provider: VectorBackend::default(),
            url: default_chroma_url(),
            collection: default_collection(),
            tenant: default_tenant(),
            database: default_chroma_database(),
        }
    }
}

// ============= Model Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    #[default]
    Gemini,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmBackend,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    /// Defaults to the Gemini API, or `http://localhost:11434` for Ollama.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_llm_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    GenerationParams::default().temperature
}

fn default_max_output_tokens() -> u32 {
    GenerationParams::default().max_output_tokens
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmBackend::default(),
            model: default_llm_model(),
            api_key_env: default_gemini_key_env(),
            base_url: None,
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Gemini,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default)]
    pub provider: EmbeddingBackend,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::default(),
            model: default_embedding_model(),
            api_key_env: default_gemini_key_env(),
            base_url: None,
        }
    }
}

// ============= Retrieval Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Maximum cosine distance of a usable match. Unset keeps every match.
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
}

fn default_max_results() -> usize {
    QuerySettings::default().max_results
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            similarity_threshold: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

fn default_overlap_chars() -> usize {
    DEFAULT_OVERLAP_CHARS
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl From<ConfigError> for crate::types::AppError {
    fn from(e: ConfigError) -> Self {
        crate::types::AppError::Configuration(e.to_string())
    }
}

impl KlugConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// Environment variables are not checked here; see
    /// [`KlugConfig::validate_for_server`] and [`KlugConfig::validate_for_import`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: KlugConfig = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Internal consistency checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "ingest.max_chars must be positive".into(),
            ));
        }
        if self.ingest.overlap_chars >= self.ingest.max_chars {
            return Err(ConfigError::ValidationError(format!(
                "ingest.overlap_chars ({}) must be smaller than ingest.max_chars ({})",
                self.ingest.overlap_chars, self.ingest.max_chars
            )));
        }
        if self.query.max_results == 0 {
            return Err(ConfigError::ValidationError(
                "query.max_results must be positive".into(),
            ));
        }
        if let Some(threshold) = self.query.similarity_threshold {
            if !(0.0..=2.0).contains(&threshold) {
                return Err(ConfigError::ValidationError(format!(
                    "query.similarity_threshold must be a cosine distance in [0, 2], got {}",
                    threshold
                )));
            }
        }
        if self.slack.max_file_size == 0 {
            return Err(ConfigError::ValidationError(
                "slack.max_file_size must be positive".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "llm.temperature must be in [0, 2], got {}",
                self.llm.temperature
            )));
        }
        Ok(())
    }

    /// Everything `serve` needs: Slack credentials plus model keys.
    pub fn validate_for_server(&self) -> Result<(), ConfigError> {
        self.validate()?;
        self.validate_env_var(&self.slack.bot_token_env)?;
        self.validate_env_var(&self.slack.signing_secret_env)?;
        if self.llm.provider == LlmBackend::Gemini {
            self.validate_env_var(&self.llm.api_key_env)?;
        }
        self.validate_for_import()
    }

    /// Everything `import` needs: storage and embedding credentials.
    pub fn validate_for_import(&self) -> Result<(), ConfigError> {
        if self.embeddings.provider == EmbeddingBackend::Gemini {
            self.validate_env_var(&self.embeddings.api_key_env)?;
        }
        if let Some(ref env) = self.database.turso_url_env {
            self.validate_env_var(env)?;
        }
        if let Some(ref env) = self.database.turso_token_env {
            self.validate_env_var(env)?;
        }
        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.is_empty())
    }

    fn require_env(&self, env_name: &str) -> Result<String, ConfigError> {
        self.resolve_env(env_name)
            .ok_or_else(|| ConfigError::MissingEnvVar(env_name.to_string()))
    }

    pub fn slack_bot_token(&self) -> Result<String, ConfigError> {
        self.require_env(&self.slack.bot_token_env)
    }

    pub fn slack_signing_secret(&self) -> Result<String, ConfigError> {
        self.require_env(&self.slack.signing_secret_env)
    }

    pub fn database_provider(&self) -> DatabaseProvider {
        let turso_url = self
            .database
            .turso_url_env
            .as_deref()
            .and_then(|env| self.resolve_env(env));
        let turso_token = self
            .database
            .turso_token_env
            .as_deref()
            .and_then(|env| self.resolve_env(env));
        DatabaseProvider::resolve(&self.database.url, turso_url, turso_token)
    }

    pub fn vector_provider(&self) -> VectorStoreProvider {
        match self.vector.provider {
            VectorBackend::Memory => VectorStoreProvider::InMemory,
            VectorBackend::Chromadb => VectorStoreProvider::ChromaDB {
                url: self.vector.url.clone(),
                collection: self.vector.collection.clone(),
                tenant: self.vector.tenant.clone(),
                database: self.vector.database.clone(),
            },
        }
    }

    pub fn llm_provider(&self) -> Result<Provider, ConfigError> {
        Ok(match self.llm.provider {
            LlmBackend::Gemini => Provider::Gemini {
                api_key: self.require_env(&self.llm.api_key_env)?,
                base_url: self
                    .llm
                    .base_url
                    .clone()
                    .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
                model: self.llm.model.clone(),
                params: GenerationParams {
                    temperature: self.llm.temperature,
                    max_output_tokens: self.llm.max_output_tokens,
                },
            },
            LlmBackend::Ollama => Provider::Ollama {
                base_url: self
                    .llm
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string()),
                model: self.llm.model.clone(),
            },
        })
    }

    pub fn embedding_provider(&self) -> Result<EmbeddingProvider, ConfigError> {
        Ok(match self.embeddings.provider {
            EmbeddingBackend::Gemini => EmbeddingProvider::Gemini {
                api_key: self.require_env(&self.embeddings.api_key_env)?,
                base_url: self
                    .embeddings
                    .base_url
                    .clone()
                    .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
                model: self.embeddings.model.clone(),
            },
            EmbeddingBackend::Local => EmbeddingProvider::Local,
        })
    }

    pub fn query_settings(&self) -> QuerySettings {
        QuerySettings {
            max_results: self.query.max_results,
            similarity_threshold: self.query.similarity_threshold,
        }
    }

    pub fn chunker(&self) -> Result<TextChunker, ConfigError> {
        TextChunker::new(self.ingest.max_chars, self.ingest.overlap_chars)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct KlugConfigManager {
    config: Arc<ArcSwap<KlugConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
}

impl KlugConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = KlugConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
        })
    }

    /// Create a config manager directly from a config (useful for testing).
    /// It has no file watching capabilities.
    pub fn from_config(config: KlugConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("klugbot.toml"),
            watcher: RwLock::new(None),
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<KlugConfig> {
        self.config.load_full()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Replace the active configuration.
    pub fn store(&self, config: KlugConfig) {
        self.config.store(Arc::new(config));
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!(path = ?self.config_path, "Reloading configuration");

        let new_config = KlugConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);
        let watched_name = self.config_path.file_name().map(|n| n.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == watched_name);
                    if touches_config && (event.kind.is_modify() || event.kind.is_create()) {
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!(error = ?e, "Config watcher error");
                }
            }
        })?;

        // Editors often replace the file, so watch the directory
        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let mut last_reload: Option<std::time::Instant> = None;
            let debounce_duration = Duration::from_millis(500);

            while rx.recv().await.is_some() {
                if last_reload.is_some_and(|at| at.elapsed() < debounce_duration) {
                    continue;
                }

                // Let the writer finish
                tokio::time::sleep(Duration::from_millis(100)).await;

                match KlugConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                        last_reload = Some(std::time::Instant::now());
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to hot-reload config, keeping previous config");
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}

impl Clone for KlugConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
        }
    }
}
