//! Wiring shared by the process commands.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use trading_config::{AppConfig, ExchangeKind};
use trading_core::{Exchange, Side};
use trading_engine::{
    Alerter, ExecutionConfig, OrderExecutionCoordinator, PipelineConfig, SignalPipeline,
};
use trading_exchange::{PaperExchange, UpbitConfig, UpbitExchange};
use trading_monitor::{LogNotifier, Notifier, WebhookNotifier};
use trading_store::{
    connect_pool, ensure_schema, ConnectionSupervisor, EventHandler, PgCandleRepository,
    PgConnector, PgEventBus, PgPool, PgSignalRepository, PgTradeRepository, SupervisorConfig,
};
use trading_strategies::{StrategyEnsemble, StrategyRegistry};

/// Connect to the shared store and make sure its tables exist.
pub async fn connect(config: &AppConfig) -> Result<PgPool> {
    let db = &config.database;
    let pool = connect_pool(&db.url, db.max_connections, db.acquire_timeout())
        .await
        .context("Failed to connect to the database")?;
    ensure_schema(&pool).await?;
    Ok(pool)
}

pub fn exchange(config: &AppConfig) -> Result<Arc<dyn Exchange>> {
    let settings = &config.exchange;
    match settings.kind {
        ExchangeKind::Upbit => {
            let (access, secret) = settings.credentials()?;
            let upbit = UpbitExchange::new(
                UpbitConfig::new(access, secret)
                    .with_base_url(settings.base_url.clone())
                    .with_timeout(settings.timeout()),
            )?;
            info!(base_url = %settings.base_url, "Using Upbit");
            Ok(Arc::new(upbit))
        }
        ExchangeKind::Paper => {
            let quote = config
                .market
                .symbols
                .first()
                .map(|s| trading_core::quote_currency(s).to_string())
                .unwrap_or_else(|| "KRW".to_string());
            info!(%quote, balance = %settings.paper_quote_balance, "Using paper exchange");
            Ok(Arc::new(PaperExchange::new(&quote, settings.paper_quote_balance)))
        }
    }
}

pub fn notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>> {
    let settings = &config.notifier;
    match &settings.webhook_url {
        Some(url) if !url.is_empty() => Ok(Arc::new(WebhookNotifier::new(
            url.clone(),
            settings.username.clone(),
            settings.timeout(),
        )?)),
        _ => {
            info!("No webhook configured, notifications go to the log");
            Ok(Arc::new(LogNotifier))
        }
    }
}

pub fn pipeline(
    config: &AppConfig,
    pool: &PgPool,
    exchange: Arc<dyn Exchange>,
) -> Result<SignalPipeline> {
    let registry = StrategyRegistry::new();
    config.validate(&registry)?;
    let buy = StrategyEnsemble::from_spec(Side::Buy, &config.strategies.buy, &registry)?;
    let sell = StrategyEnsemble::from_spec(Side::Sell, &config.strategies.sell, &registry)?;
    for ensemble in [&buy, &sell] {
        info!(
            side = %ensemble.side(),
            policy = %ensemble.policy(),
            strategies = ensemble.len(),
            lookback = ensemble.lookback(),
            "Ensemble ready"
        );
    }
    Ok(SignalPipeline::new(
        exchange,
        Arc::new(PgCandleRepository::new(pool.clone())),
        Arc::new(PgSignalRepository::new(pool.clone())),
        Arc::new(PgEventBus::new(pool.clone())),
        buy,
        sell,
        PipelineConfig {
            limits: config.risk.clone(),
            max_pending_cycles: config.execution.max_pending_cycles,
        },
    ))
}

pub fn coordinator(
    config: &AppConfig,
    pool: &PgPool,
    exchange: Arc<dyn Exchange>,
) -> OrderExecutionCoordinator {
    let execution = &config.execution;
    OrderExecutionCoordinator::new(
        exchange,
        Arc::new(PgTradeRepository::new(pool.clone())),
        Arc::new(PgCandleRepository::new(pool.clone())),
        Alerter::new("trading", Arc::new(PgEventBus::new(pool.clone()))),
        &config.risk,
        ExecutionConfig {
            submit_attempts: execution.submit_attempts,
            poll_attempts: execution.poll_attempts,
            poll_delay: execution.poll_delay(),
        },
    )
}

/// Keep `handler` connected until the reconnect budget is spent.
pub async fn supervise<H: EventHandler>(
    process: &str,
    config: &AppConfig,
    pool: &PgPool,
    mut handler: H,
) -> Result<()> {
    let settings = &config.supervisor;
    let supervisor = ConnectionSupervisor::new(
        process,
        PgConnector::new(pool.clone()),
        Arc::new(PgEventBus::new(pool.clone())),
        SupervisorConfig {
            max_attempts: settings.max_reconnect_attempts,
            reconnect_delay: settings.reconnect_delay(),
            health_check_interval: settings.health_check_interval(),
        },
    );
    info!(process, "Starting");
    match supervisor.run(&mut handler).await {
        Ok(never) => match never {},
        Err(e) => Err(e.into()),
    }
}

/// Run `work` until it fails or ctrl-c arrives.
pub async fn until_shutdown(work: impl std::future::Future<Output = Result<()>>) -> Result<()> {
    tokio::select! {
        result = work => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            info!("Shutting down");
            Ok(())
        }
    }
}
