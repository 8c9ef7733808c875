//! Upbit REST client.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};
use trading_core::error::ExchangeError;
use trading_core::traits::Exchange;
use trading_core::types::{
    Account, Balance, Candle, Execution, Order, OrderRequest, OrderState, OrderType, Side,
};
use url::form_urlencoded;

use crate::auth::Credentials;

/// Largest page the candle endpoint serves.
const MAX_CANDLES: usize = 200;

/// Upbit client configuration.
#[derive(Debug, Clone)]
pub struct UpbitConfig {
    pub base_url: String,
    pub credentials: Credentials,
    pub timeout: Duration,
}

impl UpbitConfig {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.upbit.com".to_string(),
            credentials: Credentials::new(access_key, secret_key),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct AccountDto {
    currency: String,
    balance: String,
    locked: String,
    avg_buy_price: String,
}

#[derive(Debug, Deserialize)]
struct CandleDto {
    market: String,
    candle_date_time_utc: String,
    opening_price: f64,
    high_price: f64,
    low_price: f64,
    trade_price: f64,
    candle_acc_trade_volume: f64,
}

#[derive(Debug, Deserialize)]
struct TradeDto {
    uuid: String,
    price: String,
    volume: String,
    funds: String,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct OrderDto {
    uuid: String,
    side: String,
    ord_type: String,
    price: Option<String>,
    state: String,
    market: String,
    created_at: String,
    volume: Option<String>,
    executed_volume: Option<String>,
    paid_fee: Option<String>,
    identifier: Option<String>,
    #[serde(default)]
    trades: Vec<TradeDto>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

fn decimal(field: &str, value: &str) -> Result<Decimal, ExchangeError> {
    Decimal::from_str(value).map_err(|e| ExchangeError::Decode(format!("{field}={value}: {e}")))
}

fn opt_decimal(field: &str, value: Option<&str>) -> Result<Decimal, ExchangeError> {
    value.map_or(Ok(Decimal::ZERO), |v| decimal(field, v))
}

fn timestamp(value: &str) -> Result<DateTime<Utc>, ExchangeError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ExchangeError::Decode(format!("created_at={value}: {e}")))
}

impl AccountDto {
    fn into_balance(self) -> Result<Balance, ExchangeError> {
        Ok(Balance {
            balance: decimal("balance", &self.balance)?,
            locked: decimal("locked", &self.locked)?,
            avg_buy_price: decimal("avg_buy_price", &self.avg_buy_price)?,
            currency: self.currency,
        })
    }
}

impl CandleDto {
    fn into_candle(self) -> Result<Candle, ExchangeError> {
        let ts = NaiveDateTime::parse_from_str(&self.candle_date_time_utc, "%Y-%m-%dT%H:%M:%S")
            .map_err(|e| {
                ExchangeError::Decode(format!("candle_date_time_utc={}: {e}", self.candle_date_time_utc))
            })?
            .and_utc();
        Ok(Candle::new(
            self.market,
            ts,
            self.opening_price,
            self.high_price,
            self.low_price,
            self.trade_price,
            self.candle_acc_trade_volume,
        ))
    }
}

impl OrderDto {
    fn into_order(self) -> Result<Order, ExchangeError> {
        let side = Side::from_exchange_str(&self.side)
            .ok_or_else(|| ExchangeError::Decode(format!("side={}", self.side)))?;
        let order_type = OrderType::from_exchange_str(&self.ord_type)
            .ok_or_else(|| ExchangeError::Decode(format!("ord_type={}", self.ord_type)))?;
        let state = OrderState::from_exchange_str(&self.state)
            .ok_or_else(|| ExchangeError::Decode(format!("state={}", self.state)))?;

        let trades = self
            .trades
            .into_iter()
            .map(|t| -> Result<Execution, ExchangeError> {
                Ok(Execution {
                    price: decimal("trades.price", &t.price)?,
                    volume: decimal("trades.volume", &t.volume)?,
                    funds: decimal("trades.funds", &t.funds)?,
                    created_at: timestamp(&t.created_at)?,
                    uuid: t.uuid,
                })
            })
            .collect::<Result<Vec<_>, ExchangeError>>()?;

        Ok(Order {
            price: self.price.as_deref().map(|p| decimal("price", p)).transpose()?,
            volume: self.volume.as_deref().map(|v| decimal("volume", v)).transpose()?,
            paid_fee: opt_decimal("paid_fee", self.paid_fee.as_deref())?,
            executed_volume: opt_decimal("executed_volume", self.executed_volume.as_deref())?,
            created_at: timestamp(&self.created_at)?,
            uuid: self.uuid,
            identifier: self.identifier,
            symbol: self.market,
            side,
            order_type,
            state,
            trades,
        })
    }
}

/// Url-encoded order parameters, in the order they are hashed.
fn order_params(request: &OrderRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("market", request.symbol.clone()),
        ("side", request.side.as_exchange_str().to_string()),
    ];
    if let Some(volume) = request.volume {
        params.push(("volume", volume.normalize().to_string()));
    }
    if let Some(price) = request.price {
        params.push(("price", price.normalize().to_string()));
    }
    params.push(("ord_type", request.order_type.as_str().to_string()));
    params.push(("identifier", request.identifier.clone()));
    params
}

fn encode(params: &[(&str, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
        .finish()
}

/// Upbit exchange client.
pub struct UpbitExchange {
    config: UpbitConfig,
    client: Client,
}

impl UpbitExchange {
    pub fn new(config: UpbitConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExchangeError::Configuration(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn signed(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
    ) -> Result<RequestBuilder, ExchangeError> {
        let url = match query {
            Some(q) if method == Method::GET => format!("{}?{q}", self.url(path)),
            _ => self.url(path),
        };
        let auth = self.config.credentials.authorization(query)?;
        Ok(self.client.request(method, url).header("Authorization", auth))
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ExchangeError> {
        let resp = request
            .send()
            .await
            .map_err(|e| ExchangeError::Network(e.to_string()))?;
        let resp = check_status(resp).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ExchangeError::Decode(e.to_string()))
    }
}

async fn check_status(resp: Response) -> Result<Response, ExchangeError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let retry_after_secs = resp
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    let text = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| format!("{}: {}", b.error.name, b.error.message))
        .unwrap_or(text);

    Err(match status {
        StatusCode::UNAUTHORIZED => ExchangeError::Authentication(detail),
        StatusCode::NOT_FOUND => ExchangeError::OrderNotFound(detail),
        StatusCode::TOO_MANY_REQUESTS => ExchangeError::RateLimited { retry_after_secs },
        StatusCode::BAD_REQUEST => ExchangeError::OrderRejected(detail),
        s if s.is_server_error() => ExchangeError::Network(format!("{s}: {detail}")),
        s => ExchangeError::Api {
            status: s.as_u16(),
            message: detail,
        },
    })
}

#[async_trait]
impl Exchange for UpbitExchange {
    async fn get_account(&self) -> Result<Account, ExchangeError> {
        let request = self.signed(Method::GET, "/v1/accounts", None)?;
        let accounts: Vec<AccountDto> = self.send(request).await?;
        let balances = accounts
            .into_iter()
            .map(AccountDto::into_balance)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Account::new(balances))
    }

    async fn get_candles(
        &self,
        symbol: &str,
        unit: u32,
        count: usize,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, ExchangeError> {
        if count > MAX_CANDLES {
            warn!(count, max = MAX_CANDLES, "Candle request capped");
        }
        let mut params = vec![
            ("market", symbol.to_string()),
            ("count", count.min(MAX_CANDLES).to_string()),
        ];
        if let Some(to) = to {
            params.push(("to", to.format("%Y-%m-%dT%H:%M:%SZ").to_string()));
        }

        let url = format!("{}?{}", self.url(&format!("/v1/candles/minutes/{unit}")), encode(&params));
        let candles: Vec<CandleDto> = self.send(self.client.get(url)).await?;

        // Newest first on the wire.
        let mut candles = candles
            .into_iter()
            .map(CandleDto::into_candle)
            .collect::<Result<Vec<_>, _>>()?;
        candles.reverse();
        debug!(symbol, unit, fetched = candles.len(), "Fetched candles");
        Ok(candles)
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError> {
        let params = order_params(request);
        let query = encode(&params);
        let body: serde_json::Map<String, serde_json::Value> = params
            .into_iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
            .collect();

        let http = self
            .signed(Method::POST, "/v1/orders", Some(&query))?
            .json(&body);
        let order: OrderDto = self.send(http).await?;
        let order = order.into_order()?;
        debug!(uuid = %order.uuid, identifier = %request.identifier, "Order accepted");
        Ok(order)
    }

    async fn get_order(&self, uuid: &str) -> Result<Order, ExchangeError> {
        let query = encode(&[("uuid", uuid.to_string())]);
        let request = self.signed(Method::GET, "/v1/order", Some(&query))?;
        let order: OrderDto = self.send(request).await?;
        order.into_order()
    }

    async fn find_order(&self, identifier: &str) -> Result<Option<Order>, ExchangeError> {
        let query = encode(&[("identifier", identifier.to_string())]);
        let request = self.signed(Method::GET, "/v1/order", Some(&query))?;
        match self.send::<OrderDto>(request).await {
            Ok(order) => order.into_order().map(Some),
            Err(ExchangeError::OrderNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        "upbit"
    }
}
