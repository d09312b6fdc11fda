//! Response cache key derivation and lookup.

use anyhow::Result;
use clap::{Args, Subcommand};
use gateway_config::GatewayConfig;
use gateway_core::request::DEFAULT_MODEL;
use gateway_resilience::CacheKey;
use serde::Serialize;

use crate::context::StoreSession;
use crate::output::{self, CommandResult, OutputFormat};

/// Arguments for the cache command.
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

/// Cache subcommands.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Print the key a request maps to, without touching the store
    Key(EntryArgs),

    /// Print the stored entry for a request
    Show(EntryArgs),

    /// Remove the stored entry for a request
    Invalidate(EntryArgs),
}

/// Request identifying a cache entry.
#[derive(Args, Debug)]
pub struct EntryArgs {
    /// Prompt text
    pub prompt: String,

    /// Model name
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Caller identity; ignored when `cache.per_caller` is off
    #[arg(long)]
    pub caller: Option<String>,
}

/// Cache entry for output.
#[derive(Debug, Serialize)]
pub struct EntryOutput {
    pub key: String,
    pub store_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// Execute the cache command.
pub async fn execute(args: CacheArgs, config: &GatewayConfig, format: OutputFormat) -> Result<()> {
    match args.command {
        CacheCommand::Key(entry) => {
            let key = derive_key(config, &entry);
            print_entry(
                &EntryOutput {
                    key: key.as_str().to_string(),
                    store_key: key.store_key(),
                    value: None,
                },
                format,
            )
        }
        CacheCommand::Show(entry) => {
            let key = derive_key(config, &entry);
            let session = StoreSession::open(config).await?;
            let raw = session.layer().cache().get_raw(&key).await;
            session.close().await;

            let Some(raw) = raw? else {
                return CommandResult::<()>::failure(format!("No cache entry under {}", key.store_key()))
                    .print(format);
            };
            let value = serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw));
            print_entry(
                &EntryOutput {
                    key: key.as_str().to_string(),
                    store_key: key.store_key(),
                    value: Some(value),
                },
                format,
            )
        }
        CacheCommand::Invalidate(entry) => {
            let session = StoreSession::open(config).await?;
            let existed = session
                .layer()
                .cache()
                .invalidate(&entry.prompt, &entry.model, entry.caller.as_deref())
                .await;
            session.close().await;

            let message = if existed? {
                "Cache entry removed"
            } else {
                "No cache entry to remove"
            };
            CommandResult::<()>::success_message(message).print(format)
        }
    }
}

/// Same derivation the gateway uses, including the `per_caller` switch
fn derive_key(config: &GatewayConfig, entry: &EntryArgs) -> CacheKey {
    let caller = if config.cache.per_caller {
        entry.caller.as_deref()
    } else {
        None
    };
    CacheKey::derive(&entry.prompt, &entry.model, caller)
}

fn print_entry(entry: &EntryOutput, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => CommandResult::success(entry).print(format),
        OutputFormat::Text => {
            output::key_value("Key", &entry.key);
            output::key_value("Store Key", &entry.store_key);
            if let Some(value) = &entry.value {
                output::section("Entry");
                println!("{}", serde_json::to_string_pretty(value)?);
            }
            Ok(())
        }
    }
}
