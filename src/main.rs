use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use klugbot::cli::{Cli, Commands, output::Output};
use klugbot::rag::ingest::{FileIngestor, parse_formats};
use klugbot::utils::toml_config::LogFormat;
use klugbot::{AppState, KlugConfig, KlugConfigManager, connect_knowledge_base};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let config_manager = match KlugConfigManager::new(&cli.config) {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            output.error(&e.to_string());
            output.hint("Create klugbot.toml or pass --config <path>");
            std::process::exit(1);
        }
    };

    init_tracing(&config_manager.config(), cli.verbose);

    match cli.command() {
        Commands::Serve => serve(config_manager, &output).await,
        Commands::Import {
            directory,
            formats,
            url_prefix,
            user_id,
        } => {
            import(
                &config_manager.config(),
                directory,
                formats,
                url_prefix,
                user_id,
                &output,
            )
            .await
        }
        Commands::Config { validate } => {
            show_config(&config_manager.config(), *validate, &output);
            Ok(())
        }
    }
}

fn init_tracing(config: &KlugConfig, verbose: bool) {
    let default_level = if verbose {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("klugbot={0},tower_http={0}", default_level)));

    let registry = tracing_subscriber::registry().with(filter);
    match config.server.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config_manager: Arc<KlugConfigManager>, output: &Output) -> anyhow::Result<()> {
    output.banner();

    let state = AppState::from_config(config_manager.clone())
        .await
        .context("failed to initialise services")?;

    if let Err(e) = config_manager.start_watching() {
        tracing::warn!(error = %e, "Config hot reload disabled");
    }

    let config = config_manager.config();
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    output.success(&format!("Listening on http://{}", addr));
    tracing::info!(address = %addr, "Server started");

    axum::serve(listener, klugbot::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    config_manager.stop_watching();
    tracing::info!("Server stopped");
    Ok(())
}

async fn import(
    config: &KlugConfig,
    directory: &Path,
    formats: &str,
    url_prefix: &str,
    user_id: &str,
    output: &Output,
) -> anyhow::Result<()> {
    config.validate_for_import()?;
    let formats = parse_formats(formats)?;

    output.info(&format!(
        "Importing {} from {}",
        formats
            .iter()
            .map(|f| f.extension())
            .collect::<Vec<_>>()
            .join(", "),
        directory.display()
    ));

    let knowledge = connect_knowledge_base(config).await?;
    let ingestor = FileIngestor::new(knowledge, config.chunker()?);
    let stats = ingestor
        .import_directory(directory, &formats, url_prefix, user_id)
        .await?;

    output.import_summary(&stats);
    Ok(())
}

fn show_config(config: &KlugConfig, validate: bool, output: &Output) {
    output.config_summary(config);

    if validate {
        match config.validate_for_server() {
            Ok(()) => output.success("Configuration and secrets are valid"),
            Err(e) => {
                output.error(&e.to_string());
                std::process::exit(1);
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
