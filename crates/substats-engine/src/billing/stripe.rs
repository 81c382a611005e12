//! Stripe REST client
//!
//! Implements [`BillingApi`] over `reqwest` against the Stripe v1 API.

use super::api::{BillingApi, InvoiceQuery, Page, SubscriptionQuery};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use substats_common::{AnalyticsError, InvoiceRecord, RemoteError, Result, SubscriptionRecord};
use tracing::{debug, instrument, warn};

/// Default Stripe API base URL
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe API client
pub struct StripeClient {
    http: Client,
    api_base: String,
    secret_key: String,
}

/// Stripe error envelope: `{"error": {"message": "..."}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl StripeClient {
    /// Create a client for the given secret key
    pub fn new(
        secret_key: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalyticsError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(String, String)]) -> Result<T> {
        let url = format!("{}/{}", self.api_base, path);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .query(params)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(path, "Rate limited by Stripe");
            return Err(RemoteError::RateLimited.into());
        }

        if !status.is_success() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or_else(|| {
                    status.canonical_reason().unwrap_or("unknown error").to_string()
                });
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()).into())
    }
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl BillingApi for StripeClient {
    #[instrument(skip(self), fields(status = ?query.status))]
    async fn list_subscriptions(
        &self,
        query: &SubscriptionQuery,
    ) -> Result<Page<SubscriptionRecord>> {
        let page: Page<SubscriptionRecord> = self.get("subscriptions", &query.to_params()).await?;
        debug!(count = page.data.len(), has_more = page.has_more, "Listed subscriptions");
        Ok(page)
    }

    #[instrument(skip(self), fields(customer = ?query.customer))]
    async fn list_invoices(&self, query: &InvoiceQuery) -> Result<Page<InvoiceRecord>> {
        let page: Page<InvoiceRecord> = self.get("invoices", &query.to_params()).await?;
        debug!(count = page.data.len(), has_more = page.has_more, "Listed invoices");
        Ok(page)
    }

    #[instrument(skip(self))]
    async fn retrieve_balance(&self) -> Result<()> {
        let _: serde_json::Value = self.get("balance", &[]).await?;
        debug!("Balance retrieved");
        Ok(())
    }
}
