//! Studydeck server - HTTP API for AI-generated study aids.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use studydeck_server::{app, config, logging, state};

use logging::{LogConfig, LogFormat, Verbosity};

/// Studydeck server - summaries, quizzes and flashcards from your notes.
#[derive(Parser, Debug)]
#[command(name = "studydeck-server")]
#[command(about = "HTTP server for AI-generated study aids")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override port from config
    #[arg(short, long)]
    port: Option<u16>,

    /// Override database path from config
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// More logging: -v for INFO everywhere, -vv for DEBUG, -vvv for TRACE
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Set the level for one target, e.g. "sync=debug" or "ai=trace".
    /// Repeatable; overrides the [logging] section of the config file.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    /// Log output format (defaults to the config file's, then text)
    #[arg(long = "log-format", value_name = "FORMAT")]
    log_format: Option<LogFormat>,
}

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let log_config = LogConfig::resolve(
        &config.logging,
        Verbosity::from_flags(cli.quiet, cli.verbose),
        cli.log_format,
        &cli.log_overrides,
    );
    logging::init(&log_config)?;

    // Apply CLI overrides
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    tracing::info!(
        target: "studydeck::startup",
        "Loaded configuration (port: {}, db: {})",
        config.port,
        config.db_path.display()
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = Arc::new(AppState::new(config)?);
    tracing::info!(target: "studydeck::startup", "Initialized application state");

    tracing::info!(target: "studydeck::startup", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
