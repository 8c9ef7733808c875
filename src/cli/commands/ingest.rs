//! Candle ingestion command.

use anyhow::Result;
use std::sync::Arc;
use trading_config::AppConfig;
use trading_engine::CandleIngestor;
use trading_store::{PgCandleRepository, PgEventBus};

use crate::bootstrap;
use crate::cli::IngestArgs;

pub async fn run(config: AppConfig, args: IngestArgs) -> Result<()> {
    let pool = bootstrap::connect(&config).await?;
    let ingestor = CandleIngestor::new(
        bootstrap::exchange(&config)?,
        Arc::new(PgCandleRepository::new(pool.clone())),
        Arc::new(PgEventBus::new(pool)),
        config.market.symbols.clone(),
        config.market.candle_unit,
        config.ingestion.candle_count,
    );

    if args.once {
        ingestor.tick().await;
        return Ok(());
    }
    bootstrap::until_shutdown(async {
        ingestor.run(config.ingestion.interval()).await;
        Ok(())
    })
    .await
}
