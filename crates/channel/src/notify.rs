//! Urgent lead alerts for the shop owner. Providers are tried in order and
//! the chain always falls through to a durable local log, so a captured
//! lead survives every network failure.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::messenger::ChannelError;

/// One captured lead, formatted for the owner-facing alert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeadAlert {
    pub phone: String,
    pub product_keys: Vec<String>,
    pub captured_at: DateTime<Utc>,
}

impl LeadAlert {
    fn body(&self) -> String {
        format!(
            "NUEVO LEAD CAPTURADO!\nCliente: {}\nProductos: {}\nHora: {}\nContactar al cliente ahora!",
            self.phone,
            self.product_keys.join(", "),
            self.captured_at.format("%H:%M %d/%m/%Y"),
        )
    }
}

#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, alert: &LeadAlert) -> Result<(), ChannelError>;
}

/// Primary provider: WhatsApp gateway taking a form-encoded POST with the
/// token in the body (ultramsg-style).
pub struct WhatsAppFormChannel {
    client: Client,
    instance: String,
    token: SecretString,
    owner_phone: String,
    api_base: String,
}

impl WhatsAppFormChannel {
    pub fn new(
        instance: impl Into<String>,
        token: SecretString,
        owner_phone: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            instance: instance.into(),
            token,
            owner_phone: owner_phone.into(),
            api_base: "https://api.ultramsg.com".to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl AlertChannel for WhatsAppFormChannel {
    fn name(&self) -> &'static str {
        "whatsapp-form"
    }

    async fn send(&self, alert: &LeadAlert) -> Result<(), ChannelError> {
        let url = format!("{}/{}/messages/chat", self.api_base.trim_end_matches('/'), self.instance);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("token", self.token.expose_secret()),
                ("to", self.owner_phone.trim_start_matches('+')),
                ("body", alert.body().as_str()),
            ])
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

/// Secondary provider: plain GET with the API key as a query parameter
/// (callmebot-style).
pub struct CallbackTextChannel {
    client: Client,
    api_key: SecretString,
    owner_phone: String,
    endpoint: String,
}

impl CallbackTextChannel {
    pub fn new(
        api_key: SecretString,
        owner_phone: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            owner_phone: owner_phone.into(),
            endpoint: "https://api.callmebot.com/whatsapp.php".to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl AlertChannel for CallbackTextChannel {
    fn name(&self) -> &'static str {
        "callback-text"
    }

    async fn send(&self, alert: &LeadAlert) -> Result<(), ChannelError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("phone", self.owner_phone.trim_start_matches('+')),
                ("text", alert.body().as_str()),
                ("apikey", self.api_key.expose_secret()),
            ])
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

/// Last-resort channel: append the alert to a local log file.
pub struct DurableLogChannel {
    path: PathBuf,
}

impl DurableLogChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn append(&self, alert: &LeadAlert) -> std::io::Result<()> {
        let line = format!(
            "{} - CLIENTE: {} - PRODUCTOS: {}\n",
            alert.captured_at.format("%H:%M %d/%m/%Y"),
            alert.phone,
            alert.product_keys.join(", "),
        );

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[async_trait]
impl AlertChannel for DurableLogChannel {
    fn name(&self) -> &'static str {
        "durable-log"
    }

    async fn send(&self, alert: &LeadAlert) -> Result<(), ChannelError> {
        self.append(alert).await.map_err(|err| {
            ChannelError::Rejected { status: 0, body: format!("lead log append failed: {err}") }
        })
    }
}

/// Ordered fallback chain over the configured providers plus the durable
/// log. Never fails the caller: the worst case is a loud error log carrying
/// every lead field, so the lead is still recoverable from the logs.
pub struct NotifierChain {
    providers: Vec<Box<dyn AlertChannel>>,
    durable_log: DurableLogChannel,
}

impl NotifierChain {
    pub fn new(providers: Vec<Box<dyn AlertChannel>>, durable_log: DurableLogChannel) -> Self {
        Self { providers, durable_log }
    }

    pub async fn notify(&self, alert: LeadAlert) {
        for provider in &self.providers {
            match provider.send(&alert).await {
                Ok(()) => {
                    info!(provider = provider.name(), phone = %alert.phone, "lead alert delivered");
                    return;
                }
                Err(err) => {
                    warn!(provider = provider.name(), error = %err, "lead alert provider failed");
                }
            }
        }

        if let Err(err) = self.durable_log.send(&alert).await {
            error!(
                error = %err,
                phone = %alert.phone,
                products = %alert.product_keys.join(", "),
                captured_at = %alert.captured_at,
                "lead alert lost every channel; recover it from this log line"
            );
        } else {
            info!(phone = %alert.phone, "lead alert appended to durable log");
        }
    }
}
