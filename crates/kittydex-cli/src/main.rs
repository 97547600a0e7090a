//! kittydex CLI - partitioned, idempotent harvesting of rendered records
//!
//! This is the main entry point for the kittydex command-line interface.
//! Command implementations live in [`commands`].

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod logging;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal; anything it sets is picked up by clap's env fallbacks.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::initialize_logging(&cli)?;

    execute_command(cli).await
}

async fn execute_command(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run { harvest, format } => {
            let config = commands::resolve_config(config_path, harvest)?;
            commands::run_harvest(config, format).await?;
        },
        Commands::Plan { harvest, format } => {
            let config = commands::resolve_config(config_path, harvest)?;
            commands::print_plan(&config, format)?;
        },
        Commands::Missing { harvest, format } => {
            let config = commands::resolve_config(config_path, harvest)?;
            commands::list_missing(&config, format).await?;
        },
        Commands::Show {
            id,
            harvest,
            format,
        } => {
            let config = commands::resolve_config(config_path, harvest)?;
            commands::show_record(&config, id, format).await?;
        },
    }
    Ok(())
}
