//! Exchange trait definition.

use crate::error::ExchangeError;
use crate::types::{Account, Candle, Order, OrderRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Trait for exchange integrations.
///
/// Exchanges report balances, serve candle history and execute orders.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Get all account balances.
    async fn get_account(&self) -> Result<Account, ExchangeError>;

    /// Get minute candles, oldest first.
    ///
    /// # Arguments
    /// * `symbol` - Market code
    /// * `unit` - Candle width in minutes
    /// * `count` - Number of candles
    /// * `to` - Exclusive end time, latest when `None`
    async fn get_candles(
        &self,
        symbol: &str,
        unit: u32,
        count: usize,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, ExchangeError>;

    /// Submit a new order.
    ///
    /// The request's `identifier` is forwarded to the exchange, which rejects a
    /// second order carrying the same identifier.
    async fn place_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError>;

    /// Get the status of an order by exchange id.
    async fn get_order(&self, uuid: &str) -> Result<Order, ExchangeError>;

    /// Look an order up by its client identifier.
    ///
    /// # Returns
    /// The order if the exchange knows the identifier, None otherwise
    async fn find_order(&self, identifier: &str) -> Result<Option<Order>, ExchangeError>;

    /// Get the exchange name.
    fn name(&self) -> &str;
}
