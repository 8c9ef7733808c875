//! Strategy registry for building strategies by name.

use crate::{
    BollingerConfig, BollingerStrategy, MACrossoverConfig, MACrossoverStrategy, MacdConfig,
    MacdStrategy, RsiConfig, RsiStrategy, StochasticConfig, StochasticStrategy, VolumeConfig,
    VolumeStrategy,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trading_core::{error::StrategyError, traits::DynStrategy, types::StrategyKind};

/// Information about a registered strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Registry key
    pub name: String,
    /// Strategy description
    pub description: String,
    /// Default parameters as JSON
    pub default_config: serde_json::Value,
}

/// Registry for the available scoring strategies.
pub struct StrategyRegistry {
    strategies: BTreeMap<String, StrategyInfo>,
}

impl StrategyRegistry {
    /// Create a new strategy registry with all built-in strategies.
    pub fn new() -> Self {
        let mut registry = Self {
            strategies: BTreeMap::new(),
        };

        registry.register(
            StrategyKind::Rsi,
            "Scores RSI oversold/overbought distance plus momentum",
            RsiConfig::default(),
        );
        registry.register(
            StrategyKind::Macd,
            "Scores the MACD histogram relative to price and its growth",
            MacdConfig::default(),
        );
        registry.register(
            StrategyKind::Bollinger,
            "Scores price position within Bollinger Bands with breakout clamps",
            BollingerConfig::default(),
        );
        registry.register(
            StrategyKind::Stochastic,
            "Scores stochastic %K extremes plus the %K/%D crossover",
            StochasticConfig::default(),
        );
        registry.register(
            StrategyKind::MaCrossover,
            "Scores the short/long moving average spread and its trend",
            MACrossoverConfig::default(),
        );
        registry.register(
            StrategyKind::Volume,
            "Scores volume spikes in the direction of the latest candle",
            VolumeConfig::default(),
        );

        registry
    }

    fn register<C: Serialize>(&mut self, kind: StrategyKind, description: &str, defaults: C) {
        self.strategies.insert(
            kind.name().to_string(),
            StrategyInfo {
                name: kind.name().to_string(),
                description: description.to_string(),
                default_config: serde_json::to_value(defaults).unwrap_or_default(),
            },
        );
    }

    /// List all available strategies, ordered by name.
    pub fn list(&self) -> Vec<&StrategyInfo> {
        self.strategies.values().collect()
    }

    /// Get strategy info by name.
    pub fn get(&self, name: &str) -> Option<&StrategyInfo> {
        self.strategies.get(name)
    }

    /// Check if a strategy exists.
    pub fn exists(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Get all strategy names.
    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }

    /// Create a strategy instance from JSON parameters.
    ///
    /// Missing fields take their defaults; `null` means all defaults.
    pub fn create(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<Box<dyn DynStrategy>, StrategyError> {
        let kind: StrategyKind = name
            .parse()
            .map_err(|_| StrategyError::NotFound(name.to_string()))?;

        let strategy: Box<dyn DynStrategy> = match kind {
            StrategyKind::Rsi => Box::new(RsiStrategy::new(parse_params(params)?)?),
            StrategyKind::Macd => Box::new(MacdStrategy::new(parse_params(params)?)?),
            StrategyKind::Bollinger => Box::new(BollingerStrategy::new(parse_params(params)?)?),
            StrategyKind::Stochastic => Box::new(StochasticStrategy::new(parse_params(params)?)?),
            StrategyKind::MaCrossover => {
                Box::new(MACrossoverStrategy::new(parse_params(params)?)?)
            }
            StrategyKind::Volume => Box::new(VolumeStrategy::new(parse_params(params)?)?),
        };
        Ok(strategy)
    }

    /// Create a strategy with default configuration.
    pub fn create_default(&self, name: &str) -> Result<Box<dyn DynStrategy>, StrategyError> {
        self.create(name, serde_json::Value::Null)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_params<C: DeserializeOwned + Default>(params: serde_json::Value) -> Result<C, StrategyError> {
    if params.is_null() {
        return Ok(C::default());
    }
    serde_json::from_value(params).map_err(|e| StrategyError::InvalidConfig(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_list() {
        let registry = StrategyRegistry::new();
        assert_eq!(registry.list().len(), 6);
        assert_eq!(
            registry.names(),
            vec!["bollinger", "ma_crossover", "macd", "rsi", "stochastic", "volume"]
        );
    }

    #[test]
    fn test_registry_get() {
        let registry = StrategyRegistry::new();

        assert!(registry.get("ma_crossover").is_some());
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.get("rsi").unwrap().default_config["period"], 14);
    }

    #[test]
    fn test_create_default() {
        let registry = StrategyRegistry::new();
        for name in registry.names() {
            let strategy = registry.create_default(name).unwrap();
            assert_eq!(strategy.strategy_kind().name(), name);
        }
    }

    #[test]
    fn test_create_with_partial_params() {
        let registry = StrategyRegistry::new();

        let params = serde_json::json!({ "short_period": 3, "use_ema": true });
        let strategy = registry.create("ma_crossover", params).unwrap();
        assert_eq!(strategy.history_len(), 21);
    }

    #[test]
    fn test_create_rejects_bad_params() {
        let registry = StrategyRegistry::new();

        let params = serde_json::json!({ "oversold": 90.0 });
        assert!(matches!(
            registry.create("rsi", params),
            Err(StrategyError::InvalidConfig(_))
        ));

        let params = serde_json::json!({ "period": "fourteen" });
        assert!(registry.create("rsi", params).is_err());
    }

    #[test]
    fn test_create_unknown_strategy() {
        let registry = StrategyRegistry::new();
        assert!(matches!(
            registry.create_default("unknown"),
            Err(StrategyError::NotFound(_))
        ));
    }
}
