mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use odoo_task_sync::config::{ConfigOverrides, OdooConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let overrides = ConfigOverrides {
        url: cli.url,
        db: cli.db,
        user: cli.user,
        password: None,
    };
    let config = OdooConfig::load(cli.env_file.as_deref(), cli.config.as_deref(), &overrides)
        .context("Failed to load Odoo configuration")?;

    match cli.command {
        Commands::Export(args) => {
            commands::export(&config, &args).await?;
        }

        Commands::Import { input, allow, dry_run } => {
            commands::import(&config, &input, &allow, dry_run).await?;
        }

        Commands::Status { long } => {
            commands::status(&config, long).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("ODOO_SYNC_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))
}
