use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::NotificationError;
use crate::models::EmailMessage;

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

/// Sends through a transactional email HTTP API (`POST {url}` with a bearer key).
pub struct HttpEmailSender {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpEmailSender {
    pub fn new(api_url: &str, api_key: &str, from: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        }
    }

    /// `None` when email delivery is not configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        config
            .is_email_configured()
            .then(|| Self::new(&config.email_api_url, &config.email_api_key, &config.email_from))
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        debug!("Sending email '{}' to {}", message.subject, message.to);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": message.to,
                "subject": message.subject,
                "text": message.text,
            }))
            .send()
            .await
            .map_err(|e| NotificationError::Email(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Email API error ({}): {}", status, body);
            return Err(NotificationError::Email(format!("{}: {}", status, body)));
        }

        Ok(())
    }
}

/// Used when no email provider is configured; every send succeeds without doing anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEmailSender;

#[async_trait]
impl EmailSender for DisabledEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        debug!("Email delivery disabled, dropping '{}' for {}", message.subject, message.to);
        Ok(())
    }
}
