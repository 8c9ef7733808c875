//! Every process in one binary.
//!
//! Each process still gets its own store session and supervisor, so locks
//! and notifications behave as in a split deployment. The exchange client is
//! shared, which also lets a paper exchange see its own fills.

use anyhow::Result;
use std::sync::Arc;
use trading_config::AppConfig;
use trading_engine::{AnalysisHandler, CandleIngestor, ManagerHandler, TradingHandler};
use trading_store::{PgCandleRepository, PgEventBus};

use crate::bootstrap;

pub async fn run(config: AppConfig) -> Result<()> {
    let pool = bootstrap::connect(&config).await?;
    let exchange = bootstrap::exchange(&config)?;

    let manager = ManagerHandler::new(bootstrap::notifier(&config)?);
    let trading = TradingHandler::new(Arc::new(bootstrap::coordinator(
        &config,
        &pool,
        exchange.clone(),
    )));
    let analysis = AnalysisHandler::new(
        Arc::new(bootstrap::pipeline(&config, &pool, exchange.clone())?),
        config.market.symbols.clone(),
    );
    let ingestor = CandleIngestor::new(
        exchange,
        Arc::new(PgCandleRepository::new(pool.clone())),
        Arc::new(PgEventBus::new(pool.clone())),
        config.market.symbols.clone(),
        config.market.candle_unit,
        config.ingestion.candle_count,
    );

    bootstrap::until_shutdown(async {
        tokio::try_join!(
            bootstrap::supervise("manager", &config, &pool, manager),
            bootstrap::supervise("trading", &config, &pool, trading),
            bootstrap::supervise("analysis", &config, &pool, analysis),
            async {
                ingestor.run(config.ingestion.interval()).await;
                Ok::<(), anyhow::Error>(())
            },
        )?;
        Ok(())
    })
    .await
}
