//! Toolgate CLI
//!
//! Inspect and administer provider connections, tool visibility and
//! per-connector permission grants.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use toolgate_app::bootstrap;
use toolgate_app::commands;
use toolgate_app::config::{Config, DEFAULT_CONFIG_PATH};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "toolgate")]
#[command(about = "Provider-aware tool registry and permission gate", long_about = None)]
struct Cli {
    /// Path to the YAML config
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List providers and whether the user has connected them
    Providers { user: String },

    /// Tool schemas the agent would see this turn
    Tools { user: String },

    /// Resolve a tool name against the user's connected providers
    Resolve { user: String, name: String },

    /// Resolve a tool name and check the user's permission for it
    Check { user: String, name: String },

    /// Set a per-connector tier (0 read only .. 3 full access)
    Grant {
        user: String,
        connector: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=3))]
        tier: u8,
    },

    /// Set the legacy global tier
    Global {
        user: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=3))]
        tier: u8,
    },

    /// Enable vacation mode for N days, or `off`
    Vacation { user: String, days: String },

    /// Store a provider credential read from stdin
    Connect { user: String, provider: String },

    /// Remove a stored provider credential
    Disconnect { user: String, provider: String },

    /// Effective tiers, settings and vacation status
    Summary { user: String },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("TOOLGATE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_secret() -> Result<String> {
    let mut secret = String::new();
    std::io::stdin()
        .read_to_string(&mut secret)
        .context("Failed to read credential from stdin")?;
    Ok(secret)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let master_key = bootstrap::master_key_from_env(&config)?;
    let services = bootstrap::build(&config, &master_key)?;

    let output = match cli.command {
        Commands::Providers { user } => commands::providers(&services, &user).await?,
        Commands::Tools { user } => commands::tools(&services, &user).await?,
        Commands::Resolve { user, name } => commands::resolve(&services, &user, &name).await?,
        Commands::Check { user, name } => commands::check(&services, &user, &name).await?,
        Commands::Grant {
            user,
            connector,
            tier,
        } => commands::grant(&services, &user, &connector, tier).await?,
        Commands::Global { user, tier } => commands::global(&services, &user, tier).await?,
        Commands::Vacation { user, days } => commands::vacation(&services, &user, &days).await?,
        Commands::Connect { user, provider } => {
            let secret = read_secret()?;
            commands::connect(&services, &user, &provider, &secret)?
        }
        Commands::Disconnect { user, provider } => {
            commands::disconnect(&services, &user, &provider)?
        }
        Commands::Summary { user } => commands::summary(&services, &user).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
