//! Report delivery
//!
//! Mail transport is an external collaborator: reports are handed to an HTTP
//! relay when one is configured, otherwise only logged.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use substats_common::{AnalyticsError, Result};
use tracing::{info, instrument};

/// A plain-text email ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub from_name: String,
    pub from_address: String,
    pub subject: String,
    pub body: String,
    pub content_type: String,
}

impl EmailMessage {
    pub fn plain_text(to: Vec<String>, subject: String, body: String) -> Self {
        Self {
            to,
            from_name: String::new(),
            from_address: String::new(),
            subject,
            body,
            content_type: "text/plain".to_string(),
        }
    }

    pub fn from(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.from_name = name.into();
        self.from_address = address.into();
        self
    }
}

/// Outbound mail transport
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Logs messages instead of sending them
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to = ?message.to,
            subject = %message.subject,
            bytes = message.body.len(),
            "No mail relay configured, report logged only"
        );
        Ok(())
    }
}

/// Posts messages as JSON to an HTTP mail relay
pub struct RelayMailer {
    http: reqwest::Client,
    url: String,
}

impl RelayMailer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalyticsError::Config(format!("Failed to build mail client: {}", e)))?;
        Ok(Self { http, url: url.into() })
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    #[instrument(skip(self, message), fields(subject = %message.subject))]
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| AnalyticsError::Mail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalyticsError::Mail(format!("relay returned {}", status)));
        }

        info!(recipients = message.to.len(), "Report handed to mail relay");
        Ok(())
    }
}

/// Records sent messages in memory
#[derive(Default)]
pub struct MemoryMailer {
    sent: RwLock<Vec<EmailMessage>>,
    failing: AtomicBool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.read().clone()
    }

    /// Make every following send fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AnalyticsError::Mail("delivery refused".into()));
        }
        self.sent.write().push(message.clone());
        Ok(())
    }
}
