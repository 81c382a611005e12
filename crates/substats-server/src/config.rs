//! Substats server configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use substats_engine::billing::DEFAULT_API_BASE;
use substats_engine::{parse_recipients, ServiceConfig};

/// Server configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen host
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Remote billing API settings
    pub stripe: StripeSettings,
    /// Cache settings
    pub cache: CacheSettings,
    /// Report and mail settings
    pub report: ReportSettings,
    /// Nonce and admin settings
    pub auth: AuthSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8086,
            stripe: StripeSettings::default(),
            cache: CacheSettings::default(),
            report: ReportSettings::default(),
            auth: AuthSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `.env` and the environment
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();

        // Platform PORT first, SUBSTATS_PORT overrides it
        if let Some(port) = get("PORT").and_then(|p| p.parse().ok()) {
            cfg.port = port;
        }
        if let Some(host) = get("SUBSTATS_HOST") {
            cfg.host = host;
        }
        if let Some(port) = get("SUBSTATS_PORT") {
            cfg.port = port
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid SUBSTATS_PORT {:?}: {}", port, e))?;
        }

        // Billing API
        cfg.stripe.secret_key = get("STRIPE_SECRET_KEY").filter(|key| !key.trim().is_empty());
        if let Some(base) = get("SUBSTATS_STRIPE_API_BASE") {
            cfg.stripe.api_base = base;
        }
        if let Some(ms) = get("SUBSTATS_PAGE_DELAY_MS") {
            cfg.stripe.page_delay_ms = ms
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid SUBSTATS_PAGE_DELAY_MS {:?}: {}", ms, e))?;
        }

        // Cache
        cfg.cache.redis_url = get("SUBSTATS_REDIS_URL").filter(|url| !url.is_empty());
        if let Some(ttl) = get("SUBSTATS_CACHE_TTL_SECS") {
            cfg.cache.ttl_secs = ttl
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid SUBSTATS_CACHE_TTL_SECS {:?}: {}", ttl, e))?;
        }

        // Reports
        if let Some(name) = get("SUBSTATS_SITE_NAME") {
            cfg.report.site_name = name;
        }
        if let Some(url) = get("SUBSTATS_DASHBOARD_URL") {
            cfg.report.dashboard_url = url;
        }
        cfg.report.mail_from = get("SUBSTATS_MAIL_FROM");
        cfg.report.mail_relay_url = get("SUBSTATS_MAIL_RELAY_URL").filter(|url| !url.is_empty());
        if let Some(raw) = get("SUBSTATS_REPORT_RECIPIENTS") {
            cfg.report.recipients = parse_recipients(&raw);
        }
        if let Some(flag) = get("SUBSTATS_WEEKLY_REPORT") {
            cfg.report.weekly_enabled = parse_flag(&flag)
                .ok_or_else(|| anyhow::anyhow!("Invalid SUBSTATS_WEEKLY_REPORT {:?}", flag))?;
        }

        // Auth
        cfg.auth.nonce_secret = get("SUBSTATS_NONCE_SECRET").filter(|s| !s.is_empty());
        cfg.auth.admin_token = get("SUBSTATS_ADMIN_TOKEN").filter(|s| !s.is_empty());

        Ok(cfg)
    }

    /// Engine-side report and cache settings
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            site_name: self.report.site_name.clone(),
            dashboard_url: self.report.dashboard_url.clone(),
            mail_from: self.report.sender_address(),
            cache_ttl: Duration::from_secs(self.cache.ttl_secs),
            default_recipients: self.report.recipients.clone(),
        }
    }
}

// Secrets stay out of logs
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("stripe_api_base", &self.stripe.api_base)
            .field("stripe_key_set", &self.stripe.secret_key.is_some())
            .field("page_delay_ms", &self.stripe.page_delay_ms)
            .field("cache", &self.cache)
            .field("report", &self.report)
            .field("admin_token_set", &self.auth.admin_token.is_some())
            .finish()
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Remote billing API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSettings {
    /// Secret API key; absent means the dashboard is not configured
    pub secret_key: Option<String>,
    pub api_base: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Delay between page requests in milliseconds
    pub page_delay_ms: u64,
}

impl Default for StripeSettings {
    fn default() -> Self {
        Self {
            secret_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: 30,
            page_delay_ms: 50,
        }
    }
}

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Redis URL; in-memory cache when absent
    pub redis_url: Option<String>,
    /// TTL of the stats and subscriber entries
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: 3600,
        }
    }
}

/// Report and mail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    pub site_name: String,
    pub dashboard_url: String,
    /// Sender address; derived from the dashboard host when absent
    pub mail_from: Option<String>,
    /// HTTP mail relay; reports are only logged when absent
    pub mail_relay_url: Option<String>,
    /// Initial report recipients
    pub recipients: Vec<String>,
    pub weekly_enabled: bool,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            site_name: "Subscription Analytics".to_string(),
            dashboard_url: "http://localhost:8086/dashboard".to_string(),
            mail_from: None,
            mail_relay_url: None,
            recipients: Vec::new(),
            weekly_enabled: true,
        }
    }
}

impl ReportSettings {
    pub fn sender_address(&self) -> String {
        if let Some(from) = &self.mail_from {
            return from.clone();
        }
        let without_scheme = self
            .dashboard_url
            .split_once("://")
            .map_or(self.dashboard_url.as_str(), |(_, rest)| rest);
        let host = without_scheme
            .split(|c| c == '/' || c == ':')
            .next()
            .filter(|host| !host.is_empty())
            .unwrap_or("localhost");
        format!("analytics@{}", host)
    }
}

/// Anti-forgery and admin settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Nonce signing secret; random per process when absent
    pub nonce_secret: Option<String>,
    /// Bearer token granting the admin capability
    pub admin_token: Option<String>,
}
