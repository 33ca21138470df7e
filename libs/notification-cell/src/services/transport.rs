use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::{NotificationError, OutboundMessage};

/// Sends one message. Anything other than `Ok` counts as a failed attempt.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotificationError>;
}

/// JSON email API compatible with Resend's `POST /emails`.
pub struct HttpEmailTransport {
    client: Client,
    api_url: String,
    api_key: String,
    sender: String,
}

impl HttpEmailTransport {
    pub fn new(api_url: &str, api_key: &str, sender: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            sender: sender.to_string(),
        }
    }
}

#[async_trait]
impl DeliveryTransport for HttpEmailTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotificationError> {
        debug!("Sending email to {} via {}", message.to, self.api_url);

        let payload = json!({
            "from": self.sender,
            "to": [message.to],
            "subject": message.subject,
            "html": message.html,
            "text": message.text,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Email API rejected message to {}: {} {}", message.to, status, body);
            return Err(NotificationError::Delivery(format!("email API returned {}: {}", status, body)));
        }

        info!("Email sent to {}", message.to);
        Ok(())
    }
}

/// Logs messages instead of sending them. Used when no email API key is set.
#[derive(Debug, Default)]
pub struct TracingTransport;

#[async_trait]
impl DeliveryTransport for TracingTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotificationError> {
        info!(to = %message.to, subject = %message.subject, "Email delivery disabled, message logged only");
        Ok(())
    }
}

pub fn transport_from_config(config: &AppConfig) -> Arc<dyn DeliveryTransport> {
    if config.is_email_configured() {
        Arc::new(HttpEmailTransport::new(
            &config.email_api_url,
            &config.email_api_key,
            &config.sender_email,
        ))
    } else {
        warn!("Email API not configured, notifications will only be logged");
        Arc::new(TracingTransport)
    }
}
