//! Configuration structures.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trading_core::TradingError;
use trading_risk::RiskLimits;
use trading_strategies::{EnsembleSpec, StrategyRegistry};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub ingestion: IngestionSettings,
    #[serde(default)]
    pub strategies: StrategiesConfig,
    #[serde(default)]
    pub risk: RiskLimits,
    #[serde(default)]
    pub supervisor: SupervisorSettings,
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

impl AppConfig {
    /// Check every section. Strategy members are built once to prove they exist.
    pub fn validate(&self, registry: &StrategyRegistry) -> Result<(), TradingError> {
        if self.market.symbols.is_empty() {
            return Err(config_err("market.symbols must not be empty"));
        }
        if let Some(bad) = self.market.symbols.iter().find(|s| s.split_once('-').is_none()) {
            return Err(config_err(format!("market symbol {bad} is not QUOTE-BASE")));
        }
        if self.market.candle_unit == 0 || self.ingestion.interval_secs == 0 {
            return Err(config_err("candle unit and ingestion interval must be positive"));
        }
        if self.ingestion.candle_count == 0 {
            return Err(config_err("ingestion.candle_count must be positive"));
        }

        self.strategies.buy.validate(registry)?;
        self.strategies.sell.validate(registry)?;
        self.risk.validate().map_err(config_err)?;

        if self.supervisor.max_reconnect_attempts == 0 {
            return Err(config_err("supervisor.max_reconnect_attempts must be positive"));
        }
        if self.execution.submit_attempts == 0 || self.execution.poll_attempts == 0 {
            return Err(config_err("execution retry limits must be positive"));
        }
        if self.database.max_connections == 0 {
            return Err(config_err("database.max_connections must be positive"));
        }
        Ok(())
    }
}

fn config_err(msg: impl Into<String>) -> TradingError {
    TradingError::Config(msg.into())
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "trading-system".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Shared Postgres store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/trading".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 10,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Upbit,
    Paper,
}

/// Exchange API configuration. Keys are read from the named environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub kind: ExchangeKind,
    pub base_url: String,
    pub access_key_env: String,
    pub secret_key_env: String,
    pub timeout_secs: u64,
    /// Starting quote balance of the paper exchange
    pub paper_quote_balance: Decimal,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            kind: ExchangeKind::Paper,
            base_url: "https://api.upbit.com".to_string(),
            access_key_env: "UPBIT_ACCESS_KEY".to_string(),
            secret_key_env: "UPBIT_SECRET_KEY".to_string(),
            timeout_secs: 10,
            paper_quote_balance: dec!(1000000),
        }
    }
}

impl ExchangeConfig {
    /// Read the key pair from the environment.
    pub fn credentials(&self) -> Result<(String, String), TradingError> {
        let read = |name: &str| {
            std::env::var(name).map_err(|_| config_err(format!("{name} not set")))
        };
        Ok((read(&self.access_key_env)?, read(&self.secret_key_env)?))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Traded markets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Market codes, `QUOTE-BASE`
    pub symbols: Vec<String>,
    /// Candle width in minutes
    pub candle_unit: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["KRW-BTC".to_string()],
            candle_unit: 60,
        }
    }
}

/// Candle ingestion schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    pub interval_secs: u64,
    /// Candles fetched per symbol and tick
    pub candle_count: usize,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            candle_count: 200,
        }
    }
}

impl IngestionSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Buy and sell ensembles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategiesConfig {
    #[serde(default = "EnsembleSpec::buy_default")]
    pub buy: EnsembleSpec,
    #[serde(default = "EnsembleSpec::sell_default")]
    pub sell: EnsembleSpec,
}

impl Default for StrategiesConfig {
    fn default() -> Self {
        Self {
            buy: EnsembleSpec::buy_default(),
            sell: EnsembleSpec::sell_default(),
        }
    }
}

/// Reconnect policy of every process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_secs: u64,
    pub health_check_secs: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            reconnect_delay_secs: 5,
            health_check_secs: 30,
        }
    }
}

impl SupervisorSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_secs)
    }
}

/// Order submission and fill confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    pub submit_attempts: u32,
    pub poll_attempts: u32,
    pub poll_delay_secs: u64,
    /// Analysis ticks to wait for a decided order to show in the balances
    pub max_pending_cycles: u32,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            submit_attempts: 2,
            poll_attempts: 3,
            poll_delay_secs: 3,
            max_pending_cycles: 3,
        }
    }
}

impl ExecutionSettings {
    pub fn poll_delay(&self) -> Duration {
        Duration::from_secs(self.poll_delay_secs)
    }
}

/// External notification sink. Log-only when no webhook is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub webhook_url: Option<String>,
    pub username: String,
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: "trading-bot".to_string(),
            timeout_secs: 10,
        }
    }
}

impl NotifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
