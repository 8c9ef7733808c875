//! Trading system CLI application.

mod bootstrap;
mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use trading_config::load_config;
use trading_monitor::{setup_logging, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets may live in a .env file next to the binary
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Strategies => return cli::commands::strategies::run(),
        Commands::ValidateConfig(args) => return cli::commands::validate::run(&cli.config, args),
        _ => {}
    }

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    let level = cli
        .log_level
        .map(|l| l.as_str().to_string())
        .unwrap_or_else(|| config.logging.level.clone());
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        config.logging.format.parse()?
    };
    setup_logging(&level, format)?;

    match cli.command {
        Commands::Ingest(args) => cli::commands::ingest::run(config, args).await,
        Commands::Analyze => cli::commands::analyze::run(config).await,
        Commands::Trade => cli::commands::trade::run(config).await,
        Commands::Manager => cli::commands::manager::run(config).await,
        Commands::All => cli::commands::all::run(config).await,
        Commands::Strategies | Commands::ValidateConfig(_) => Ok(()),
    }
}
