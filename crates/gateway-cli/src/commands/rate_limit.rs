//! Rate limit window inspection and reset.

use anyhow::Result;
use clap::{Args, Subcommand};
use gateway_config::{GatewayConfig, RateLimitConfig};
use gateway_core::{ApiErrorResponse, GatewayError};
use serde::Serialize;

use crate::context::StoreSession;
use crate::output::{self, CommandResult, OutputFormat};

/// Arguments for the rate-limit command.
#[derive(Args, Debug)]
pub struct RateLimitArgs {
    #[command(subcommand)]
    pub command: RateLimitCommand,
}

/// Rate limit subcommands.
#[derive(Subcommand, Debug)]
pub enum RateLimitCommand {
    /// Show how much of the window a caller has used
    Status(WindowArgs),

    /// Drop a caller's window
    Reset(WindowArgs),
}

/// Window selection.
#[derive(Args, Debug)]
pub struct WindowArgs {
    /// Caller identity
    pub caller: String,

    /// Endpoint label (defaults to `rate_limit.endpoint`)
    #[arg(short, long)]
    pub endpoint: Option<String>,
}

/// Window usage for output.
#[derive(Debug, Serialize)]
pub struct UsageOutput {
    pub caller: String,
    pub endpoint: String,
    pub used: u64,
    pub limit: u32,
    pub remaining: u64,
    pub window_secs: u64,
    /// Longest wait before the window admits again, only while throttled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    /// Error the next request would receive, only while throttled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttled: Option<ApiErrorResponse>,
}

impl UsageOutput {
    /// Usage of one window against the configured limit
    pub fn new(caller: String, endpoint: String, used: u64, limits: &RateLimitConfig) -> Self {
        let remaining = u64::from(limits.max_requests).saturating_sub(used);
        let rejection =
            (remaining == 0).then(|| GatewayError::rate_limit(limits.max_requests, limits.window));

        Self {
            caller,
            endpoint,
            used,
            limit: limits.max_requests,
            remaining,
            window_secs: limits.window.as_secs(),
            retry_after_secs: rejection
                .as_ref()
                .and_then(GatewayError::retry_after)
                .map(|wait| wait.as_secs()),
            throttled: rejection.as_ref().map(ApiErrorResponse::from),
        }
    }
}

/// Execute the rate-limit command.
pub async fn execute(args: RateLimitArgs, config: &GatewayConfig, format: OutputFormat) -> Result<()> {
    let session = StoreSession::open(config).await?;
    let limiter = session.layer().rate_limiter();

    match args.command {
        RateLimitCommand::Status(window) => {
            let endpoint = window
                .endpoint
                .unwrap_or_else(|| config.rate_limit.endpoint.clone());
            let used = limiter.usage(&window.caller, &endpoint).await;
            session.close().await;
            let used = used?;

            let usage = UsageOutput::new(window.caller, endpoint, used, &config.rate_limit);
            print_usage(&usage, format)
        }
        RateLimitCommand::Reset(window) => {
            let endpoint = window
                .endpoint
                .unwrap_or_else(|| config.rate_limit.endpoint.clone());
            let existed = limiter.reset(&window.caller, &endpoint).await;
            session.close().await;

            let message = if existed? {
                format!("Window for '{}' on {endpoint} cleared", window.caller)
            } else {
                format!("No window recorded for '{}' on {endpoint}", window.caller)
            };
            CommandResult::<()>::success_message(message).print(format)
        }
    }
}

fn print_usage(usage: &UsageOutput, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => CommandResult::success(usage).print(format),
        OutputFormat::Text => {
            output::section(&format!("Rate limit: {} {}", usage.caller, usage.endpoint));
            output::key_value("Used", &format!("{}/{}", usage.used, usage.limit));
            output::key_value("Remaining", &usage.remaining.to_string());
            output::key_value("Window", &format!("{}s", usage.window_secs));
            if let Some(wait) = usage.retry_after_secs {
                output::key_value(
                    "Retry within",
                    &output::format_duration(std::time::Duration::from_secs(wait)),
                );
            }
            if let Some(rejection) = &usage.throttled {
                output::warning(&format!("Caller is currently throttled: {rejection}"));
            }
            Ok(())
        }
    }
}
