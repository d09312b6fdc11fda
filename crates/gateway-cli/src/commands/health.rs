//! Health check command.

use anyhow::Result;
use clap::Args;
use gateway_config::GatewayConfig;
use serde::Serialize;
use std::time::Instant;

use crate::context::StoreSession;
use crate::output::{self, CommandResult, OutputFormat};

/// Arguments for the health command.
#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Also print the effective component settings
    #[arg(short, long)]
    pub detailed: bool,
}

/// Health check result for output.
#[derive(Debug, Serialize)]
pub struct HealthOutput {
    pub status: &'static str,
    pub store: String,
    pub connect_time_ms: u64,
    pub ping_time_ms: u64,
    pub failure_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Execute the health command.
pub async fn execute(args: HealthArgs, config: &GatewayConfig, format: OutputFormat) -> Result<()> {
    let session = match StoreSession::open(config).await {
        Ok(session) => session,
        Err(e) => {
            let result: CommandResult<HealthOutput> =
                CommandResult::failure(format!("Store unreachable: {e:#}"));
            result.print(format)?;
            return Err(e);
        }
    };

    let started = Instant::now();
    let ping = session.layer().health_check().await;
    let ping_time = started.elapsed();

    let health = HealthOutput {
        status: if ping.is_ok() { "healthy" } else { "unhealthy" },
        store: session.url().to_string(),
        connect_time_ms: session.connect_time().as_millis() as u64,
        ping_time_ms: ping_time.as_millis() as u64,
        failure_mode: config.failure_mode.to_string(),
        details: if args.detailed {
            Some(serde_json::json!({
                "cache": config.cache,
                "circuit_breaker": config.circuit_breaker,
                "rate_limit": config.rate_limit,
                "session": config.session,
            }))
        } else {
            None
        },
    };
    session.close().await;

    match format {
        OutputFormat::Json => CommandResult::success(&health).print(format)?,
        OutputFormat::Text => {
            if ping.is_ok() {
                output::success("State store is healthy");
            } else {
                output::error("State store did not answer PING");
            }
            output::key_value("Store", &health.store);
            output::key_value("Connect Time", &format!("{}ms", health.connect_time_ms));
            output::key_value("Ping Time", &format!("{}ms", health.ping_time_ms));
            output::key_value("Failure Mode", &health.failure_mode);
            if let Some(details) = &health.details {
                output::section("Settings");
                println!("{}", serde_yaml::to_string(details)?);
            }
        }
    }

    ping.map_err(Into::into)
}
