//! Logging and outbound notifications.

mod logging;
mod notifier;

pub use logging::{setup_logging, LogFormat, LoggingError};
pub use notifier::{LogNotifier, Notifier, NotifyError, WebhookNotifier};
