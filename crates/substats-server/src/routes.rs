//! HTTP action endpoints
//!
//! Every response uses the `{success, data}` envelope. Failures carry
//! `{message}` as data. Nonce and admin checks run before any work.

use crate::auth::{check_admin, NonceVerifier, SESSION_HEADER};
use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use substats_common::{AnalyticsError, Clock, MetricsSnapshot};
use substats_engine::format::{format_duration, format_subscriber_rows, UNAVAILABLE};
use substats_engine::AnalyticsService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AnalyticsService>,
    pub nonces: Arc<NonceVerifier>,
    pub admin_token: Option<Arc<str>>,
    pub registry: Registry,
    pub clock: Clock,
}

impl AppState {
    fn check_nonce(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        Ok(self.nonces.check(headers, self.clock.now())?)
    }

    fn check_admin(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        Ok(check_admin(headers, self.admin_token.as_deref())?)
    }
}

/// Error envelope with its HTTP status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        let status = match &err {
            AnalyticsError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AnalyticsError::NotConfigured(_) => StatusCode::BAD_REQUEST,
            AnalyticsError::Remote(_) | AnalyticsError::Mail(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match err {
            AnalyticsError::Unauthorized(message) | AnalyticsError::NotConfigured(message) => {
                message
            }
            other => other.to_string(),
        };
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "success": false, "data": { "message": self.message } });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn success(data: impl Serialize) -> ApiResult {
    let data = serde_json::to_value(data).map_err(|e| ApiError::from(AnalyticsError::from(e)))?;
    Ok(Json(json!({ "success": true, "data": data })))
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct CardOrderRequest {
    pub order: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecipientsRequest {
    pub recipients: String,
}

/// Snapshot plus its rendered average duration
#[derive(Serialize)]
struct StatsView<'a> {
    #[serde(flatten)]
    snapshot: &'a MetricsSnapshot,
    avg_duration: String,
}

/// Build the router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::HeaderName::from_static("x-nonce"),
            header::HeaderName::from_static("x-session-id"),
        ]);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/nonce", get(issue_nonce))
        .route("/api/notices", get(notices))
        .route("/api/stats", post(dashboard_stats))
        .route("/api/subscribers", post(subscriber_table))
        .route("/api/test-email", post(test_email))
        .route("/api/test-connection", post(test_connection))
        .route("/api/card-order", get(card_order).post(save_card_order))
        .route("/api/settings/recipients", get(recipients).post(update_recipients))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "version": substats_common::VERSION }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match TextEncoder::new().encode_to_string(&state.registry.gather()) {
        Ok(body) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn issue_nonce(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    let session = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|session| !session.is_empty())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "Missing x-session-id header"))?;
    success(json!({ "nonce": state.nonces.issue(session, state.clock.now()) }))
}

async fn notices(State(state): State<AppState>) -> ApiResult {
    success(state.service.notices())
}

async fn dashboard_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult {
    state.check_nonce(&headers)?;
    let force = body.map_or(false, |Json(req)| req.force_refresh);

    let snapshot = state.service.get_dashboard_stats(force).await?;
    let avg_duration = snapshot
        .avg_duration_days
        .map_or_else(|| UNAVAILABLE.to_string(), format_duration);
    success(StatsView {
        snapshot: &snapshot,
        avg_duration,
    })
}

async fn subscriber_table(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult {
    state.check_nonce(&headers)?;
    let force = body.map_or(false, |Json(req)| req.force_refresh);

    let rows = state.service.get_subscriber_table(force).await?;
    success(format_subscriber_rows(&rows))
}

async fn test_email(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    state.check_nonce(&headers)?;
    state.check_admin(&headers)?;

    match state.service.send_test_report().await {
        Ok(recipients) => success(format!(
            "Test email sent successfully to: {}",
            recipients.join(", ")
        )),
        Err(AnalyticsError::Mail(e)) => {
            warn!(error = %e, "Test report delivery failed");
            Err(ApiError::new(
                StatusCode::BAD_GATEWAY,
                "Failed to send email. Please check your mail configuration.",
            ))
        }
        Err(e @ AnalyticsError::NotConfigured(_)) => Err(e.into()),
        Err(e) => Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error sending test email: {}", e),
        )),
    }
}

async fn test_connection(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    state.check_nonce(&headers)?;
    state.check_admin(&headers)?;

    match state.service.test_connectivity().await {
        Ok(()) => success("Successfully connected to Stripe"),
        Err(e @ AnalyticsError::NotConfigured(_)) => Err(e.into()),
        Err(e) => Err(ApiError::new(
            StatusCode::BAD_GATEWAY,
            format!("Error connecting to Stripe: {}", e),
        )),
    }
}

async fn card_order(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    let session = state.check_nonce(&headers)?;
    success(state.service.card_order(&session).await?)
}

async fn save_card_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CardOrderRequest>,
) -> ApiResult {
    let session = state.check_nonce(&headers)?;
    state.service.save_card_order(&session, &req.order).await?;
    success("Card order saved")
}

async fn recipients(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    state.check_nonce(&headers)?;
    state.check_admin(&headers)?;
    success(state.service.recipients().await?)
}

async fn update_recipients(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RecipientsRequest>,
) -> ApiResult {
    state.check_nonce(&headers)?;
    state.check_admin(&headers)?;
    let recipients = state.service.update_recipients(&req.recipients).await?;
    success(json!({ "recipients": recipients }))
}
