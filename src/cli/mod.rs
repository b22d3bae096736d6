//! CLI module for klugbot
//!
//! Command-line parsing for the `klugbot` binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// klugbot - a Slack knowledge assistant
///
/// Learns facts and documents from authorized users and answers questions
/// grounded in what it has learned.
#[derive(Parser, Debug)]
#[command(
    name = "klugbot",
    version,
    about = "klugbot - Slack knowledge assistant with retrieval-augmented answers",
    after_help = "EXAMPLES:\n    \
                  klugbot serve                                   # Run the Slack webhook server\n    \
                  klugbot import -d ./docs -u https://wiki.example.com/docs\n    \
                  klugbot config --validate                       # Check klugbot.toml and secrets"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "klugbot.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the Slack events server
    Serve,

    /// Import a directory of documents into the knowledge base
    Import {
        /// Directory to walk recursively
        #[arg(short, long)]
        directory: PathBuf,

        /// Comma separated extensions to import
        #[arg(short, long, default_value = "txt,md,pdf")]
        formats: String,

        /// Base URL that relative file paths are appended to
        #[arg(short, long)]
        url_prefix: String,

        /// User id recorded as the author of imported entries
        #[arg(long, default_value = "LOCAL_IMPORT")]
        user_id: String,
    },

    /// Show configuration information
    Config {
        /// Also check that referenced environment variables are set
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The requested subcommand, `serve` when none was given.
    pub fn command(&self) -> &Commands {
        static SERVE: Commands = Commands::Serve;
        self.command.as_ref().unwrap_or(&SERVE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_serve() {
        let cli = Cli::try_parse_from(["klugbot"]).unwrap();
        assert_eq!(cli.command(), &Commands::Serve);
        assert_eq!(cli.config, PathBuf::from("klugbot.toml"));
    }

    #[test]
    fn test_import_arguments() {
        let cli = Cli::try_parse_from([
            "klugbot",
            "--config",
            "custom.toml",
            "import",
            "-d",
            "./docs",
            "-f",
            "md,pdf",
            "-u",
            "https://docs.example.com",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert_eq!(
            cli.command(),
            &Commands::Import {
                directory: PathBuf::from("./docs"),
                formats: "md,pdf".into(),
                url_prefix: "https://docs.example.com".into(),
                user_id: "LOCAL_IMPORT".into(),
            }
        );
    }

    #[test]
    fn test_import_requires_directory() {
        assert!(Cli::try_parse_from(["klugbot", "import", "-u", "https://x"]).is_err());
    }
}
