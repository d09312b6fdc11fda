//! Config command - inspect and validate configuration.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use gateway_config::{ConfigLoader, GatewayConfig, ENV_PREFIX};
use gateway_resilience::sanitize_url;
use serde::Serialize;
use std::path::PathBuf;

use crate::output::{self, CommandResult, OutputFormat};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show(ShowArgs),

    /// Load and validate a configuration file
    Validate(ValidateArgs),
}

/// Arguments for config show.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Show only a specific section
    #[arg(short, long)]
    pub section: Option<String>,
}

/// Arguments for config validate.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration file to validate
    pub file: PathBuf,

    /// Also apply environment overrides before validating
    #[arg(long)]
    pub with_env: bool,
}

/// Configuration output for JSON.
#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub content: serde_json::Value,
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs, config: &GatewayConfig, format: OutputFormat) -> Result<()> {
    match args.command {
        ConfigCommand::Show(show_args) => execute_show(show_args, config, format),
        ConfigCommand::Validate(validate_args) => execute_validate(validate_args, format).await,
    }
}

fn execute_show(args: ShowArgs, config: &GatewayConfig, format: OutputFormat) -> Result<()> {
    let mut shown = config.clone();
    shown.store.url = sanitize_url(&config.store.url);
    let mut content = serde_json::to_value(&shown)?;
    if let Some(section) = &args.section {
        match content.get(section) {
            Some(value) => content = value.clone(),
            None => bail!("Unknown configuration section '{section}'"),
        }
    }

    match format {
        OutputFormat::Json => CommandResult::success(ConfigOutput {
            section: args.section,
            content,
        })
        .print(format),
        OutputFormat::Text => {
            print!("{}", serde_yaml::to_string(&content)?);
            Ok(())
        }
    }
}

async fn execute_validate(args: ValidateArgs, format: OutputFormat) -> Result<()> {
    let mut loader = ConfigLoader::new().with_file(args.file.display().to_string());
    if args.with_env {
        loader = loader.with_env_prefix(ENV_PREFIX);
    }

    match loader.load().await {
        Ok(config) => {
            match format {
                OutputFormat::Json => {
                    let mut shown = config;
                    shown.store.url = sanitize_url(&shown.store.url);
                    CommandResult::success(shown).print(format)?;
                }
                OutputFormat::Text => {
                    output::success(&format!("{} is valid", args.file.display()));
                    output::key_value("Store", &sanitize_url(&config.store.url));
                    output::key_value("Failure Mode", &config.failure_mode.to_string());
                    output::key_value(
                        "Rate Limit",
                        &format!(
                            "{} per {}",
                            config.rate_limit.max_requests,
                            output::format_duration(config.rate_limit.window)
                        ),
                    );
                }
            }
            Ok(())
        }
        Err(e) => {
            CommandResult::<()>::failure(e.to_string()).print(format)?;
            Err(e.into())
        }
    }
}
