//! Manager process: forwards `SEND:` messages to the notification sink.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, warn};
use trading_core::{Envelope, Event, Topic};
use trading_monitor::Notifier;
use trading_store::EventHandler;

pub struct ManagerHandler {
    notifier: Arc<dyn Notifier>,
}

impl ManagerHandler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl EventHandler for ManagerHandler {
    fn topics(&self) -> Vec<Topic> {
        vec![Topic::Manager]
    }

    async fn handle(&mut self, envelope: Envelope) {
        match envelope.event() {
            Ok(Event::Send { text }) => {
                if let Err(e) = self.notifier.send(&text).await {
                    error!(sink = self.notifier.name(), error = %e, "Notification not delivered");
                }
            }
            Ok(other) => warn!(?other, "Unexpected event on manager topic"),
            Err(e) => warn!(payload = %envelope.payload, error = %e, "Malformed notification"),
        }
    }
}
