//! Validate configuration command.

use anyhow::{Context, Result};
use std::path::Path;
use trading_config::load_config;
use trading_strategies::StrategyRegistry;

use crate::cli::ValidateArgs;

pub fn run(config_path: &Path, args: ValidateArgs) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    let config = load_config(config_path).context("Configuration could not be loaded")?;
    if let Err(e) = config.validate(&StrategyRegistry::new()) {
        println!("Configuration error: {}", e);
        return Err(e.into());
    }

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Exchange: {:?}", config.exchange.kind);
    println!("Symbols: {}", config.market.symbols.join(", "));
    println!(
        "Buy ensemble: {} of {} strategies",
        config.strategies.buy.policy,
        config.strategies.buy.strategies.len()
    );
    println!(
        "Sell ensemble: {} of {} strategies",
        config.strategies.sell.policy,
        config.strategies.sell.strategies.len()
    );
    println!(
        "Take profit / stop loss: {} / {}",
        config.risk.take_profit, config.risk.stop_loss
    );
    println!(
        "Reconnect attempts: {}",
        config.supervisor.max_reconnect_attempts
    );

    if args.print {
        println!();
        println!("{}", toml::to_string_pretty(&config)?);
    }

    Ok(())
}
