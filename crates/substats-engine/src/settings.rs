//! Persisted preferences: report recipients and dashboard card order
//!
//! Both live in the cache store without expiry.

use crate::cache::CacheStore;
use std::sync::Arc;
use substats_common::Result;
use tracing::info;

const RECIPIENTS_KEY: &str = "settings:recipients";

fn card_order_key(user: &str) -> String {
    format!("card_order:{}", user)
}

/// Split a comma-separated recipient list, dropping blanks
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(String::from)
        .collect()
}

/// Site-wide and per-user settings
pub struct SettingsStore {
    store: Arc<dyn CacheStore>,
    default_recipients: Vec<String>,
}

impl SettingsStore {
    /// `default_recipients` applies until an admin saves a list
    pub fn new(store: Arc<dyn CacheStore>, default_recipients: Vec<String>) -> Self {
        Self {
            store,
            default_recipients,
        }
    }

    pub async fn recipients(&self) -> Result<Vec<String>> {
        match self.store.get(RECIPIENTS_KEY).await? {
            Some(raw) => Ok(parse_recipients(&raw)),
            None => Ok(self.default_recipients.clone()),
        }
    }

    /// Replace the recipient list; returns the parsed list
    pub async fn update_recipients(&self, raw: &str) -> Result<Vec<String>> {
        let recipients = parse_recipients(raw);
        self.store.set(RECIPIENTS_KEY, recipients.join(", "), None).await?;
        info!(count = recipients.len(), "Report recipients updated");
        Ok(recipients)
    }

    /// Saved card order for `user`, empty when never saved
    pub async fn card_order(&self, user: &str) -> Result<Vec<String>> {
        match self.store.get(&card_order_key(user)).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn save_card_order(&self, user: &str, order: &[String]) -> Result<()> {
        let json = serde_json::to_string(order)?;
        self.store.set(&card_order_key(user), json, None).await
    }
}
