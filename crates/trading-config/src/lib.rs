//! Configuration management.

mod settings;

pub use settings::{
    AppConfig, AppSettings, DatabaseConfig, ExchangeConfig, ExchangeKind, ExecutionSettings,
    IngestionSettings, LoggingConfig, MarketConfig, NotifierConfig, StrategiesConfig,
    SupervisorSettings,
};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load configuration from file and environment.
///
/// Environment variables override the file: `TRADING__RISK__TAKE_PROFIT=0.04`,
/// `TRADING__MARKET__SYMBOLS=KRW-BTC,KRW-ETH`.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("TRADING")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("market.symbols")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading_strategies::{StrategyRegistry, VotePolicy};

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let path = std::env::temp_dir().join(format!("trading-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
                [market]
                symbols = ["KRW-ETH"]
                candle_unit = 15

                [risk]
                take_profit = "0.04"

                [strategies.buy]
                policy = "average"
                buy_threshold = 0.4
                sell_threshold = -0.4
                strategies = [{ name = "rsi", params = { period = 10 } }, { name = "volume", weight = 0.5 }]
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.market.symbols, vec!["KRW-ETH"]);
        assert_eq!(config.market.candle_unit, 15);
        assert_eq!(config.risk.take_profit, dec!(0.04));
        assert_eq!(config.risk.stop_loss, dec!(-0.03));
        assert_eq!(config.strategies.buy.policy, VotePolicy::Average);
        assert_eq!(config.strategies.buy.strategies[1].weight, 0.5);
        assert_eq!(config.strategies.sell.policy, VotePolicy::Majority);
        assert_eq!(config.supervisor.max_reconnect_attempts, 5);

        config.validate(&StrategyRegistry::new()).unwrap();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/trading.toml")).is_err());
    }
}
