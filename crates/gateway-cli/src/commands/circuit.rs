//! Circuit breaker inspection and control.

use anyhow::Result;
use clap::{Args, Subcommand};
use gateway_config::GatewayConfig;
use gateway_resilience::CircuitStats;
use serde::Serialize;

use crate::context::StoreSession;
use crate::output::{self, CommandResult, OutputFormat};

/// Arguments for the circuit command.
#[derive(Args, Debug)]
pub struct CircuitArgs {
    #[command(subcommand)]
    pub command: CircuitCommand,

    /// Service name (defaults to `circuit_breaker.service`)
    #[arg(short, long, global = true)]
    pub service: Option<String>,
}

/// Circuit subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitCommand {
    /// Show state, failure count and last failure time
    Status,

    /// Close the circuit and clear its failure history
    Reset,

    /// Force the circuit open
    Trip,
}

/// Circuit status for output.
#[derive(Debug, Serialize)]
pub struct CircuitOutput {
    #[serde(flatten)]
    pub stats: CircuitStats,
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
}

/// Execute the circuit command.
pub async fn execute(args: CircuitArgs, config: &GatewayConfig, format: OutputFormat) -> Result<()> {
    let service = args
        .service
        .unwrap_or_else(|| config.circuit_breaker.service.clone());

    let session = StoreSession::open(config).await?;
    let breaker = session.layer().breaker(service.as_str());

    let outcome = match args.command {
        CircuitCommand::Status => breaker.stats().await.map(Some),
        CircuitCommand::Reset => breaker.reset().await.map(|()| None),
        CircuitCommand::Trip => breaker.force_open().await.map(|()| None),
    };
    drop(breaker);
    session.close().await;

    match outcome? {
        Some(stats) => print_status(stats, config, format),
        None => {
            let message = if args.command == CircuitCommand::Reset {
                format!("Circuit for '{service}' reset to closed")
            } else {
                format!("Circuit for '{service}' forced open")
            };
            CommandResult::<()>::success_message(message).print(format)
        }
    }
}

fn print_status(stats: CircuitStats, config: &GatewayConfig, format: OutputFormat) -> Result<()> {
    let status = CircuitOutput {
        stats,
        failure_threshold: config.circuit_breaker.failure_threshold,
        recovery_timeout_secs: config.circuit_breaker.recovery_timeout.as_secs(),
    };

    match format {
        OutputFormat::Json => CommandResult::success(status).print(format),
        OutputFormat::Text => {
            output::section(&format!("Circuit: {}", status.stats.service));
            output::key_value("State", &output::circuit_state(status.stats.state));
            output::key_value(
                "Failures",
                &format!("{}/{}", status.stats.failures, status.failure_threshold),
            );
            output::key_value(
                "Last Failure",
                &status
                    .stats
                    .last_failure
                    .map_or_else(|| "never".to_string(), output::format_timestamp),
            );
            output::key_value(
                "Recovery Timeout",
                &output::format_duration(config.circuit_breaker.recovery_timeout),
            );
            Ok(())
        }
    }
}
