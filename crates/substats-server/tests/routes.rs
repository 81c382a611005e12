//! HTTP tests for the dashboard endpoints
//!
//! Each test serves the router on an ephemeral port backed by in-memory
//! billing, cache and mailer.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use prometheus::Registry;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use substats_common::{Clock, Customer, CustomerRef, SubscriptionRecord, SubscriptionStatus};
use substats_engine::{
    Aggregator, AnalyticsService, InMemoryBilling, InMemoryCache, MemoryMailer, ServiceConfig,
};
use substats_server::{router, AppState, NonceVerifier};

const ADMIN: &str = "admin-token";
const SESSION: &str = "session-1";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

fn subscription(id: &str, n: u32, status: SubscriptionStatus, age_days: i64) -> SubscriptionRecord {
    let started = now() - ChronoDuration::days(age_days);
    let ended =
        (status == SubscriptionStatus::Canceled).then(|| started + ChronoDuration::days(30));
    SubscriptionRecord {
        id: id.into(),
        status,
        customer: CustomerRef::Expanded(Customer {
            id: format!("cus_{:02}", n),
            email: Some(format!("customer{:02}@example.com", n)),
        }),
        created: started,
        start_date: Some(started),
        canceled_at: ended,
        ended_at: ended,
    }
}

struct TestServer {
    base: String,
    http: reqwest::Client,
    mailer: Arc<MemoryMailer>,
}

impl TestServer {
    async fn start(configured: bool) -> Self {
        let billing = Arc::new(InMemoryBilling::new(
            vec![
                subscription("sub_1", 1, SubscriptionStatus::Active, 10),
                subscription("sub_2", 2, SubscriptionStatus::Active, 100),
                subscription("sub_3", 3, SubscriptionStatus::Canceled, 200),
            ],
            Vec::new(),
        ));
        let aggregator = configured.then(|| {
            Aggregator::new(billing)
                .with_clock(Clock::Fixed(now()))
                .with_page_delay(Duration::ZERO)
        });

        let mailer = Arc::new(MemoryMailer::new());
        let config = ServiceConfig {
            default_recipients: vec!["owner@example.com".to_string()],
            ..ServiceConfig::default()
        };
        let store = Arc::new(InMemoryCache::new());
        let service = AnalyticsService::new(aggregator, store, mailer.clone(), config)
            .with_clock(Clock::Fixed(now()));

        let state = AppState {
            service: Arc::new(service),
            nonces: Arc::new(NonceVerifier::new(Some("test-secret"))),
            admin_token: Some(Arc::from(ADMIN)),
            registry: Registry::new(),
            clock: Clock::System,
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            http: reqwest::Client::new(),
            mailer,
        }
    }

    async fn nonce(&self) -> String {
        let body: Value = self
            .http
            .get(format!("{}/api/nonce", self.base))
            .header("x-session-id", SESSION)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["data"]["nonce"].as_str().unwrap().to_string()
    }

    async fn post(&self, path: &str, body: Value, admin: bool) -> (u16, Value) {
        let nonce = self.nonce().await;
        let mut request = self
            .http
            .post(format!("{}{}", self.base, path))
            .header("x-session-id", SESSION)
            .header("x-nonce", nonce)
            .json(&body);
        if admin {
            request = request.bearer_auth(ADMIN);
        }
        let response = request.send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_missing_nonce_rejected() {
    let server = TestServer::start(true).await;

    let response = server
        .http
        .post(format!("{}/api/stats", server.base))
        .header("x-session-id", SESSION)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["message"], "Security check failed");
}

#[tokio::test]
async fn test_stats_envelope() {
    let server = TestServer::start(true).await;

    let (status, body) = server.post("/api/stats", json!({ "force_refresh": true }), false).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);

    let data = &body["data"];
    assert_eq!(data["active_count"], 2);
    assert_eq!(data["total_cancelled"], 1);
    assert_eq!(data["retention_rate"], 67);
    assert_eq!(data["original_active"], 1);
    assert_eq!(data["avg_duration_days"], 55);
    assert_eq!(data["avg_duration"], "1 months, 25 days");
}

#[tokio::test]
async fn test_subscriber_table() {
    let server = TestServer::start(true).await;

    let (status, body) = server.post("/api/subscribers", json!({}), false).await;
    assert_eq!(status, 200);
    let rows = body["data"].as_array().unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_unconfigured_reports_notice() {
    let server = TestServer::start(false).await;

    let notices: Value = server
        .http
        .get(format!("{}/api/notices", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(notices["data"].as_array().unwrap().len(), 1);

    let (status, body) = server.post("/api/stats", json!({}), false).await;
    assert_eq!(status, 400);
    assert!(body["data"]["message"].as_str().unwrap().contains("STRIPE_SECRET_KEY"));
}

#[tokio::test]
async fn test_test_email_requires_admin() {
    let server = TestServer::start(true).await;

    let (status, _) = server.post("/api/test-email", json!({}), false).await;
    assert_eq!(status, 403);
    assert!(server.mailer.sent().is_empty());

    let (status, body) = server.post("/api/test-email", json!({}), true).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"], "Test email sent successfully to: owner@example.com");

    let sent = server.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.starts_with("Stripe Analytics Test Report"));
}

#[tokio::test]
async fn test_test_email_mail_failure() {
    let server = TestServer::start(true).await;
    server.mailer.set_failing(true);

    let (status, body) = server.post("/api/test-email", json!({}), true).await;
    assert_eq!(status, 502);
    assert_eq!(
        body["data"]["message"],
        "Failed to send email. Please check your mail configuration."
    );
}

#[tokio::test]
async fn test_card_order_per_session() {
    let server = TestServer::start(true).await;

    let (status, _) = server
        .post("/api/card-order", json!({ "order": ["retention", "active"] }), false)
        .await;
    assert_eq!(status, 200);

    let nonce = server.nonce().await;
    let body: Value = server
        .http
        .get(format!("{}/api/card-order", server.base))
        .header("x-session-id", SESSION)
        .header("x-nonce", nonce)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"], json!(["retention", "active"]));
}

#[tokio::test]
async fn test_update_recipients() {
    let server = TestServer::start(true).await;

    let (status, _) = server
        .post("/api/settings/recipients", json!({ "recipients": "a@example.com" }), false)
        .await;
    assert_eq!(status, 403);

    let (status, body) = server
        .post(
            "/api/settings/recipients",
            json!({ "recipients": "a@example.com, , b@example.com " }),
            true,
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["recipients"], json!(["a@example.com", "b@example.com"]));
}
