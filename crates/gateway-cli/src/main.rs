//! LLM State Gateway CLI
//!
//! Operator tool for the state the gateway shares through its store:
//! circuit breakers, rate limit windows, conversation context and cached
//! responses.

use anyhow::{Context, Result};
use clap::Parser;
use gateway_config::{load_config, ConfigLoader, GatewayConfig, ENV_PREFIX};
use gateway_telemetry::{init_logging, verbosity_level, LogWriter};

mod cli;
mod commands;
mod context;
mod output;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = resolve_config(&cli).await?;

    let mut logging = config.logging.clone().with_writer(LogWriter::Stderr);
    logging.level = verbosity_level(cli.verbose, cli.quiet)
        .unwrap_or("warn")
        .to_string();
    init_logging(&logging).context("failed to initialize logging")?;

    cli.execute(&config).await
}

/// Configuration from `--config`, or the default search path, plus flag overrides
async fn resolve_config(cli: &Cli) -> Result<GatewayConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::new()
            .with_file(path.display().to_string())
            .with_env_prefix(ENV_PREFIX)
            .load()
            .await
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => load_config().await.context("failed to load configuration")?,
    };

    if let Some(url) = &cli.redis_url {
        config.store.url.clone_from(url);
    }
    Ok(config)
}
