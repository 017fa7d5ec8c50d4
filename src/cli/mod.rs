//! CLI module - command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod agent;
pub mod common;
pub mod config;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "arborclaw")]
#[command(version)]
#[command(about = "Agent orchestration core with branching conversation trees", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive agent mode
    Agent {
        /// Direct message to process (non-interactive mode)
        #[arg(short, long)]
        message: Option<String>,
        /// Name of the first session
        #[arg(long, default_value = "main")]
        session: String,
    },
    /// Validate configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and its values
    Check,
}

/// Parse arguments, set up logging and run the chosen command.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    match cli.command {
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
        Some(Commands::Agent { message, session }) => {
            agent::cmd_agent(message, &session).await
        }
        Some(Commands::Config { action }) => config::cmd_config(action).await,
        Some(Commands::Version) => {
            println!("arborclaw {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
