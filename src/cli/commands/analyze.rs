//! Analysis process command.

use anyhow::Result;
use std::sync::Arc;
use trading_config::AppConfig;
use trading_engine::AnalysisHandler;

use crate::bootstrap;

pub async fn run(config: AppConfig) -> Result<()> {
    let pool = bootstrap::connect(&config).await?;
    let pipeline = bootstrap::pipeline(&config, &pool, bootstrap::exchange(&config)?)?;
    let handler = AnalysisHandler::new(Arc::new(pipeline), config.market.symbols.clone());
    bootstrap::until_shutdown(bootstrap::supervise("analysis", &config, &pool, handler)).await
}
