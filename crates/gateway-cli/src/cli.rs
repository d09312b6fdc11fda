//! CLI argument definitions using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gateway_config::GatewayConfig;
use std::path::PathBuf;

use crate::commands;
use crate::output::OutputFormat;

/// LLM State Gateway - inspect and operate shared resilience state
#[derive(Parser, Debug)]
#[command(name = "state-gateway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, env = "CONFIG_PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Store URL, overriding the configuration
    #[arg(long, global = true)]
    pub redis_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the state store answers
    Health(commands::health::HealthArgs),

    /// Inspect or control a circuit breaker
    Circuit(commands::circuit::CircuitArgs),

    /// Inspect or reset a caller's rate limit window
    #[command(name = "rate-limit")]
    RateLimit(commands::rate_limit::RateLimitArgs),

    /// Inspect or clear a caller's conversation context
    Session(commands::session::SessionArgs),

    /// Derive, show or invalidate response cache entries
    Cache(commands::cache::CacheArgs),

    /// Show or validate configuration
    Config(commands::config::ConfigArgs),
}

impl Cli {
    /// Output format selected by the global flag.
    pub const fn output_format(&self) -> OutputFormat {
        OutputFormat::from_json_flag(self.json)
    }

    /// Execute the CLI command against a loaded configuration.
    pub async fn execute(self, config: &GatewayConfig) -> Result<()> {
        let format = self.output_format();
        match self.command {
            Commands::Health(args) => commands::health::execute(args, config, format).await,
            Commands::Circuit(args) => commands::circuit::execute(args, config, format).await,
            Commands::RateLimit(args) => commands::rate_limit::execute(args, config, format).await,
            Commands::Session(args) => commands::session::execute(args, config, format).await,
            Commands::Cache(args) => commands::cache::execute(args, config, format).await,
            Commands::Config(args) => commands::config::execute(args, config, format).await,
        }
    }
}
