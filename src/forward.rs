use crate::embed::WebhookMessage;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("webhook URL is not configured")]
    NotConfigured,
    #[error("webhook answered HTTP {0}")]
    Status(u16),
    #[error("webhook request failed: {0}")]
    Transport(String),
}

/// Delivers one sanitized message to a webhook URL.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, url: &str, message: &WebhookMessage) -> Result<(), ForwardError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpWebhookSender {
    client: Client,
}

impl HttpWebhookSender {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, url: &str, message: &WebhookMessage) -> Result<(), ForwardError> {
        // The URL embeds a token; only reqwest's error kind is logged, never the URL.
        let response = self
            .client
            .post(url)
            .json(message)
            .send()
            .await
            .map_err(|e| ForwardError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForwardError::Status(status.as_u16()));
        }
        debug!("Webhook accepted message with HTTP {}", status.as_u16());
        Ok(())
    }
}

/// Sends `message` to `url`, failing fast when no URL is configured.
pub async fn forward(
    sender: &dyn WebhookSender,
    url: Option<&str>,
    message: &WebhookMessage,
) -> Result<(), ForwardError> {
    let url = match url.map(str::trim) {
        Some(u) if !u.is_empty() => u,
        _ => {
            error!("Webhook URL is not configured");
            return Err(ForwardError::NotConfigured);
        }
    };

    sender.send(url, message).await.inspect_err(|e| {
        error!("Forwarding failed: {}", e);
    })
}
