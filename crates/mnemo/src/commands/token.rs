//! Token command - manage MCP authentication tokens.

use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use clap::{Args, Subcommand};

use mnemo_auth::AuthStore;
use mnemo_config::MnemoConfig;

/// Arguments for the token command.
#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Create a new authentication token
    Create {
        /// User ID the token is bound to (email recommended)
        #[arg(long)]
        user_id: String,

        /// User email (defaults to the user id)
        #[arg(long)]
        email: Option<String>,

        /// Display name (e.g. "John Doe")
        #[arg(long)]
        name: Option<String>,

        /// Token expiry in days (default: never)
        #[arg(long)]
        expires_days: Option<i64>,

        /// Grant the admin capability
        #[arg(long)]
        admin: bool,
    },

    /// List tokens
    List {
        /// Filter by user ID
        #[arg(long)]
        user_id: Option<String>,

        /// Show full tokens instead of prefixes
        #[arg(long)]
        show_tokens: bool,
    },

    /// Revoke (disable) a token without deleting it
    Revoke {
        /// Token or unambiguous prefix
        token: String,
    },

    /// Re-enable a previously revoked token
    Enable {
        /// Token or unambiguous prefix
        token: String,
    },

    /// Permanently delete a token
    Delete {
        /// Token or unambiguous prefix
        token: String,
    },

    /// Show the authentication audit log
    Audit {
        /// Number of days to look back
        #[arg(long, default_value_t = 30)]
        days: i64,

        /// Filter by user ID
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Show statistics for a user
    Stats {
        /// User ID
        user_id: String,
    },
}

fn open_store() -> Result<AuthStore> {
    let config = MnemoConfig::from_env().context("failed to resolve configuration")?;
    if let Some(parent) = std::path::Path::new(&config.storage.auth_db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("cannot create auth store directory")?;
        }
    }
    AuthStore::open(&config.storage.auth_db_path).context("failed to open auth store")
}

/// Run the token command.
pub async fn run(args: TokenArgs) -> Result<()> {
    let store = open_store()?;

    match args.command {
        TokenCommand::Create {
            user_id,
            email,
            name,
            expires_days,
            admin,
        } => cmd_create(&store, user_id, email, name, expires_days, admin),
        TokenCommand::List {
            user_id,
            show_tokens,
        } => cmd_list(&store, user_id.as_deref(), show_tokens),
        TokenCommand::Revoke { token } => {
            let token = store.resolve_prefix(&token)?;
            store.revoke(&token)?;
            println!("Token {}... revoked", &token[..16]);
            Ok(())
        }
        TokenCommand::Enable { token } => {
            let token = store.resolve_prefix(&token)?;
            store.enable(&token)?;
            println!("Token {}... enabled", &token[..16]);
            Ok(())
        }
        TokenCommand::Delete { token } => {
            let token = store.resolve_prefix(&token)?;
            store.delete(&token)?;
            println!("Token {}... deleted permanently", &token[..16]);
            Ok(())
        }
        TokenCommand::Audit { days, user_id } => cmd_audit(&store, days, user_id.as_deref()),
        TokenCommand::Stats { user_id } => cmd_stats(&store, &user_id),
    }
}

fn cmd_create(
    store: &AuthStore,
    user_id: String,
    email: Option<String>,
    name: Option<String>,
    expires_days: Option<i64>,
    admin: bool,
) -> Result<()> {
    if user_id.trim().is_empty() {
        bail!("user id must not be empty");
    }

    let expires_at = expires_days.map(|days| Utc::now() + Duration::days(days));
    let permissions = if admin {
        vec!["admin".to_string()]
    } else {
        Vec::new()
    };

    let token = store.create_token(
        &user_id,
        name.as_deref(),
        Some(email.as_deref().unwrap_or(&user_id)),
        expires_at,
        &permissions,
    )?;

    // First line is machine-extractable: `mnemo token create ... | head -1 | cut -d' ' -f2`
    println!("token: {token}");
    println!("user id: {user_id}");
    if let Some(name) = name {
        println!("display name: {name}");
    }
    match expires_at {
        Some(at) => println!("expires: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("expires: never"),
    }
    if admin {
        println!("permissions: admin");
    }
    println!();
    println!("Configure your MCP client with:");
    println!("  X-MCP-Token: {token}");
    println!("  X-MCP-UserID: {user_id}");

    Ok(())
}

fn cmd_list(store: &AuthStore, user_id: Option<&str>, show_tokens: bool) -> Result<()> {
    let tokens = store.list(user_id)?;
    if tokens.is_empty() {
        println!("No tokens found.");
        return Ok(());
    }

    let now = Utc::now();
    println!(
        "{:<24} {:<28} {:<10} {:<12} {:<12}",
        "TOKEN", "USER", "STATUS", "CREATED", "EXPIRES"
    );
    for record in &tokens {
        let shown = if show_tokens {
            record.token.clone()
        } else {
            format!("{}...", &record.token[..16])
        };
        let status = if !record.enabled {
            "disabled"
        } else if record.is_expired(now) {
            "expired"
        } else {
            "active"
        };
        let expires = record
            .expires_at
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<24} {:<28} {:<10} {:<12} {:<12}",
            shown,
            record.user_id,
            status,
            record.created_at.format("%Y-%m-%d"),
            expires
        );
    }
    println!();
    println!("Total: {} token(s)", tokens.len());

    Ok(())
}

fn cmd_audit(store: &AuthStore, days: i64, user_id: Option<&str>) -> Result<()> {
    let events = store.audit(days, user_id)?;
    if events.is_empty() {
        println!("No audit log entries found.");
        return Ok(());
    }

    println!(
        "{:<20} {:<28} {:<12} {}",
        "TIMESTAMP", "USER", "ACTION", "MESSAGE"
    );
    for event in &events {
        println!(
            "{:<20} {:<28} {:<12} {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.user_id.as_deref().unwrap_or("-"),
            event.action.as_str(),
            event.error_message.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!("Showing last {} entries from past {} days", events.len(), days);

    Ok(())
}

fn cmd_stats(store: &AuthStore, user_id: &str) -> Result<()> {
    let stats = store.stats(user_id)?;

    println!("Statistics for {user_id}");
    println!("  total tokens:   {}", stats.total_tokens);
    println!("  active tokens:  {}", stats.active_tokens);
    match stats.last_activity {
        Some(at) => println!("  last activity:  {}", at.format("%Y-%m-%d %H:%M:%S")),
        None => println!("  last activity:  never"),
    }
    println!("  last 30 days:");
    println!("    successful:   {}", stats.logins_30d);
    println!("    failed:       {}", stats.failures_30d);

    Ok(())
}
