//! Serve command - run the Memory Service.

use anyhow::{Context, Result};
use clap::Args;

use mnemo_config::MnemoConfig;
use mnemo_server::Server;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host to bind (overrides MEMORY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides MEMORY_PORT)
    #[arg(long)]
    pub port: Option<u16>,
}

/// Run the serve command.
pub async fn run(args: ServeArgs) -> Result<()> {
    let mut config = MnemoConfig::from_env().context("failed to resolve configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let addr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid bind address")?;

    let state = mnemo_server::build_state(&config).context("failed to assemble service state")?;

    Server::from_state(state)
        .run(addr)
        .await
        .context("memory service exited with an error")?;

    Ok(())
}
