//! Conversation context inspection and removal.

use anyhow::Result;
use clap::{Args, Subcommand};
use gateway_config::GatewayConfig;
use gateway_core::ChatTurn;
use serde::Serialize;

use crate::context::StoreSession;
use crate::output::{self, CommandResult, OutputFormat};

/// Arguments for the session command.
#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

/// Session subcommands.
#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Print a caller's stored history and activity
    Show {
        /// Caller identity
        caller: String,

        /// Print only the most recent turns
        #[arg(short = 'n', long)]
        last: Option<usize>,
    },

    /// Remove a caller's history and activity marker
    Clear {
        /// Caller identity
        caller: String,
    },
}

/// Session contents for output.
#[derive(Debug, Serialize)]
pub struct SessionOutput {
    pub caller: String,
    pub active: bool,
    pub turns: usize,
    pub history: Vec<ChatTurn>,
}

/// Execute the session command.
pub async fn execute(args: SessionArgs, config: &GatewayConfig, format: OutputFormat) -> Result<()> {
    let session = StoreSession::open(config).await?;
    let sessions = session.layer().sessions();

    match args.command {
        SessionCommand::Show { caller, last } => {
            let history = sessions.get_context(&caller).await;
            let active = sessions.is_active(&caller).await;
            session.close().await;

            let mut history = history?;
            let turns = history.len();
            if let Some(last) = last {
                history = history.split_off(turns.saturating_sub(last));
            }
            let contents = SessionOutput {
                caller,
                active: active?,
                turns,
                history,
            };
            print_session(&contents, format)
        }
        SessionCommand::Clear { caller } => {
            let cleared = sessions.clear(&caller).await;
            session.close().await;
            cleared?;
            CommandResult::<()>::success_message(format!("Session for '{caller}' cleared"))
                .print(format)
        }
    }
}

fn print_session(contents: &SessionOutput, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => CommandResult::success(contents).print(format),
        OutputFormat::Text => {
            output::section(&format!("Session: {}", contents.caller));
            output::key_value("Active", if contents.active { "yes" } else { "no" });
            output::key_value("Stored Turns", &contents.turns.to_string());
            if contents.history.is_empty() {
                println!("  (no history)");
            }
            for turn in &contents.history {
                println!("  [{:?}] {}", turn.role, turn.content);
            }
            Ok(())
        }
    }
}
