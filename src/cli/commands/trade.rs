//! Trading process command.

use anyhow::Result;
use std::sync::Arc;
use trading_config::AppConfig;
use trading_engine::TradingHandler;

use crate::bootstrap;

pub async fn run(config: AppConfig) -> Result<()> {
    let pool = bootstrap::connect(&config).await?;
    let coordinator = bootstrap::coordinator(&config, &pool, bootstrap::exchange(&config)?);
    let handler = TradingHandler::new(Arc::new(coordinator));
    bootstrap::until_shutdown(bootstrap::supervise("trading", &config, &pool, handler)).await
}
