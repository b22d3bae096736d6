//! Colored output helpers for the CLI
//!
//! Plain-text fallbacks are used with `--no-color` so output stays readable
//! in logs and CI.

use owo_colors::OwoColorize;

use crate::rag::ingest::ImportStats;
use crate::utils::toml_config::KlugConfig;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the startup banner
    pub fn banner(&self) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!(
                "\n   {} {}\n   {}\n",
                "klugbot".bright_cyan().bold(),
                version.dimmed(),
                "Slack knowledge assistant".bright_white()
            );
        } else {
            println!("\n   klugbot {}\n   Slack knowledge assistant\n", version);
        }
    }

    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message to stderr
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Counters printed after `klugbot import`.
    pub fn import_summary(&self, stats: &ImportStats) {
        self.header("Import summary");
        for (key, value) in import_rows(stats) {
            self.kv(key, &value.to_string());
        }

        if stats.failed_files == 0 && stats.failed_chunks == 0 {
            self.success("All files imported");
        } else {
            self.warning(&format!(
                "{} file(s) and {} chunk(s) failed, see the log for details",
                stats.failed_files, stats.failed_chunks
            ));
        }
    }

    /// Effective configuration, secrets shown by variable name only.
    pub fn config_summary(&self, config: &KlugConfig) {
        self.header("Server");
        self.kv("address", &format!("{}:{}", config.server.host, config.server.port));
        self.kv("log level", &config.server.log_level);

        self.header("Slack");
        self.kv("bot token", &config.slack.bot_token_env);
        self.kv("signing secret", &config.slack.signing_secret_env);
        self.kv(
            "workspace url",
            config.slack.workspace_url.as_deref().unwrap_or("(from auth.test)"),
        );
        self.kv("teachers", &config.slack.teachers.len().to_string());
        self.kv("max file size", &format!("{} bytes", config.slack.max_file_size));

        self.header("Storage");
        self.kv("database", &config.database.url);
        self.kv("vector store", &format!("{:?}", config.vector.provider).to_lowercase());
        self.kv("collection", &config.vector.collection);

        self.header("Models");
        self.kv(
            "llm",
            &format!("{:?}/{}", config.llm.provider, config.llm.model).to_lowercase(),
        );
        self.kv(
            "embeddings",
            &format!("{:?}/{}", config.embeddings.provider, config.embeddings.model)
                .to_lowercase(),
        );
        self.kv("max results", &config.query.max_results.to_string());
        self.kv(
            "chunking",
            &format!(
                "{} chars, {} overlap",
                config.ingest.max_chars, config.ingest.overlap_chars
            ),
        );
    }
}

fn import_rows(stats: &ImportStats) -> [(&'static str, usize); 6] {
    [
        ("total files", stats.total_files),
        ("processed files", stats.processed_files),
        ("failed files", stats.failed_files),
        ("total chunks", stats.total_chunks),
        ("stored chunks", stats.stored_chunks),
        ("failed chunks", stats.failed_chunks),
    ]
}
