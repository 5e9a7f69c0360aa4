use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("remote rejected the request: status {status}, body {body}")]
    Rejected { status: u16, body: String },
    #[error("channel is disabled: {0}")]
    Disabled(&'static str),
}

/// The conversational reply path back to the customer.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), ChannelError>;
    async fn send_typing_indicator(&self, recipient_id: &str) -> Result<(), ChannelError>;
    fn is_enabled(&self) -> bool;
}

/// Messenger Graph API client. Posts `{recipient, message}` envelopes with
/// the page access token carried as a query parameter.
pub struct GraphApiMessenger {
    client: Client,
    api_base: String,
    access_token: SecretString,
}

impl GraphApiMessenger {
    pub fn new(
        api_base: impl Into<String>,
        access_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_base: api_base.into(), access_token })
    }

    async fn post_envelope(&self, payload: serde_json::Value) -> Result<(), ChannelError> {
        let url = format!("{}/me/messages", self.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .query(&[("access_token", self.access_token.expose_secret())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected { status: status.as_u16(), body });
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingChannel for GraphApiMessenger {
    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), ChannelError> {
        debug!(recipient_id, "sending messenger reply");
        self.post_envelope(json!({
            "recipient": { "id": recipient_id },
            "message": { "text": text },
        }))
        .await
    }

    async fn send_typing_indicator(&self, recipient_id: &str) -> Result<(), ChannelError> {
        self.post_envelope(json!({
            "recipient": { "id": recipient_id },
            "sender_action": "typing_on",
        }))
        .await
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Stand-in used when no page access token is configured. Turns still
/// produce decisions; delivery is simply skipped and reported unhealthy.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledMessenger;

#[async_trait]
impl MessagingChannel for DisabledMessenger {
    async fn send_text(&self, _recipient_id: &str, _text: &str) -> Result<(), ChannelError> {
        Err(ChannelError::Disabled("messenger access token is not configured"))
    }

    async fn send_typing_indicator(&self, _recipient_id: &str) -> Result<(), ChannelError> {
        Err(ChannelError::Disabled("messenger access token is not configured"))
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelError, DisabledMessenger, MessagingChannel};

    #[tokio::test]
    async fn disabled_messenger_reports_itself() {
        let channel = DisabledMessenger;
        assert!(!channel.is_enabled());
        assert!(matches!(
            channel.send_text("user-1", "hola").await,
            Err(ChannelError::Disabled(_))
        ));
    }
}
