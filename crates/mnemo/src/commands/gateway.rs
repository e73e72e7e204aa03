//! Gateway command - run the MCP gateway.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use mnemo_auth::AuthStore;
use mnemo_config::MnemoConfig;
use mnemo_gateway::Gateway;

/// Arguments for the gateway command.
#[derive(Args, Debug)]
pub struct GatewayArgs {
    /// Host to bind (overrides MCP_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides MCP_PORT)
    #[arg(long)]
    pub port: Option<u16>,
}

/// Run the gateway command.
pub async fn run(args: GatewayArgs) -> Result<()> {
    let mut config = MnemoConfig::from_env().context("failed to resolve configuration")?;
    if let Some(host) = args.host {
        config.gateway.host = host;
    }
    if let Some(port) = args.port {
        config.gateway.port = port;
    }

    if let Some(parent) = std::path::Path::new(&config.storage.auth_db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("cannot create auth store directory")?;
        }
    }
    let auth = Arc::new(
        AuthStore::open(&config.storage.auth_db_path).context("failed to open auth store")?,
    );

    let gateway =
        Gateway::new(config.gateway, auth).context("failed to wire the MCP gateway")?;

    gateway
        .run(config.chunker)
        .await
        .context("gateway exited with an error")?;

    Ok(())
}
