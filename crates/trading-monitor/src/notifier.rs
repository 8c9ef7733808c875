//! External notification sink used by the manager process.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notifier setup failed: {0}")]
    Setup(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Sink rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers free-text messages to a human.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;

    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
    username: &'a str,
}

/// Posts `{"content", "username"}` JSON to a chat webhook.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    username: String,
}

impl WebhookNotifier {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Setup(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            username: username.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let message = WebhookMessage {
            content: text,
            username: &self.username,
        };
        let resp = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!(len = text.len(), "Webhook delivered");
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Writes messages to the log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        info!(message = %text, "Notification");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one request, answer with `status`, return the request body.
    async fn one_shot_server(status: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    return String::from_utf8_lossy(&buf).to_string();
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + length {
                        let response =
                            format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                        socket.write_all(response.as_bytes()).await.unwrap();
                        return text[end + 4..].to_string();
                    }
                }
            }
        });
        (url, handle)
    }

    #[tokio::test]
    async fn test_webhook_posts_content_and_username() {
        let (url, server) = one_shot_server("204 No Content").await;
        let notifier = WebhookNotifier::new(url, "bot", Duration::from_secs(5)).unwrap();

        notifier.send("filled KRW-BTC, fee 5").await.unwrap();

        let body: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(body["content"], "filled KRW-BTC, fee 5");
        assert_eq!(body["username"], "bot");
    }

    #[tokio::test]
    async fn test_webhook_surfaces_rejection() {
        let (url, _server) = one_shot_server("500 Internal Server Error").await;
        let notifier = WebhookNotifier::new(url, "bot", Duration::from_secs(5)).unwrap();

        let err = notifier.send("hello").await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.send("hello").await.is_ok());
    }
}
