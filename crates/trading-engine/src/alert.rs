//! Manager-topic alerts.

use std::sync::Arc;
use tracing::{error, warn};
use trading_core::{Event, TradingError};
use trading_store::EventBus;

/// Publishes `SEND:` messages for one process. Delivery is best effort.
#[derive(Clone)]
pub struct Alerter {
    process: &'static str,
    bus: Arc<dyn EventBus>,
}

impl Alerter {
    pub fn new(process: &'static str, bus: Arc<dyn EventBus>) -> Self {
        Self { process, bus }
    }

    /// Report an error, prefixed with its message key.
    pub async fn error(&self, symbol: Option<&str>, err: &TradingError) {
        warn!(process = self.process, symbol, key = err.key(), error = %err, "Reporting error");
        self.send(format_error(self.process, symbol, err)).await;
    }

    /// Report an informational message.
    pub async fn info(&self, text: impl Into<String>) {
        self.send(format!("{}: {}", self.process, text.into())).await;
    }

    async fn send(&self, text: String) {
        if let Err(e) = self.bus.emit(&Event::send(text)).await {
            error!(process = self.process, error = %e, "Could not reach manager");
        }
    }
}

/// `[key] process symbol: message`
pub fn format_error(process: &str, symbol: Option<&str>, err: &TradingError) -> String {
    match symbol {
        Some(symbol) => format!("[{}] {process} {symbol}: {err}", err.key()),
        None => format!("[{}] {process}: {err}", err.key()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trading_core::error::StoreError;
    use trading_core::Topic;
    use trading_store::MemoryStore;

    #[tokio::test]
    async fn test_errors_carry_their_key() {
        let store = MemoryStore::new();
        let alerter = Alerter::new("analysis", Arc::new(store.clone()));

        alerter
            .error(Some("KRW-BTC"), &StoreError::SessionLost.into())
            .await;
        alerter.info("started").await;

        assert_eq!(
            store.published_on(Topic::Manager),
            vec![
                "SEND:[store.session_lost] analysis KRW-BTC: Store error: Session lost",
                "SEND:analysis: started",
            ]
        );
    }
}
