//! Mnemo - self-hosted memory service for AI coding assistants.
//!
//! Main entry point for the Mnemo CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{gateway, serve, token};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Mnemo - self-hosted memory service for AI coding assistants
#[derive(Parser)]
#[command(name = "mnemo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Memory Service REST API
    Serve(serve::ServeArgs),

    /// Start the MCP gateway
    Gateway(gateway::GatewayArgs),

    /// Authentication token management
    Token(token::TokenArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "mnemo=debug,mnemo_server=debug,mnemo_gateway=debug,mnemo_llm=debug,\
         mnemo_store=debug,mnemo_graph=debug,mnemo_auth=debug,info"
    } else {
        "mnemo=info,mnemo_server=info,mnemo_gateway=info,mnemo_llm=info,\
         mnemo_store=info,mnemo_graph=info,mnemo_auth=info,warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(true)
        .init();

    match cli.command {
        Commands::Serve(args) => serve::run(args).await,
        Commands::Gateway(args) => gateway::run(args).await,
        Commands::Token(args) => token::run(args).await,
    }
}
