//! Manager process command.

use anyhow::Result;
use trading_config::AppConfig;
use trading_engine::ManagerHandler;

use crate::bootstrap;

pub async fn run(config: AppConfig) -> Result<()> {
    let pool = bootstrap::connect(&config).await?;
    let handler = ManagerHandler::new(bootstrap::notifier(&config)?);
    bootstrap::until_shutdown(bootstrap::supervise("manager", &config, &pool, handler)).await
}
