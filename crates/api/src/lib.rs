mod rate_limit;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Form, Json, Path, State};
use axum::http::{header, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use yatra_agents::{build_assistant_from_env, BookingAssistant};
use yatra_core::StorageError;
use yatra_observability::{AppMetrics, MetricsSnapshot};
use yatra_storage::Store;

pub use crate::rate_limit::ClientRateLimiter;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct ApiState {
    pub assistant: Arc<BookingAssistant<Store>>,
    pub metrics: Arc<AppMetrics>,
    pub api_key: String,
    pub limiter: ClientRateLimiter,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    store: &'static str,
    metrics: MetricsSnapshot,
}

/// Messaging-provider webhook form. Field names follow the provider's casing.
#[derive(Debug, Deserialize)]
struct WebhookForm {
    #[serde(rename = "Body", default)]
    body: String,
    #[serde(rename = "From", default)]
    from: String,
}

#[derive(Debug, Deserialize)]
struct TurnRequest {
    user_id: String,
    text: String,
}

#[derive(Debug, Serialize)]
struct TurnResponse {
    user_id: String,
    reply: String,
}

pub async fn build_app() -> Result<Router> {
    let metrics = AppMetrics::shared();
    let assistant = build_assistant_from_env(metrics.clone())
        .await
        .context("failed to initialize booking assistant")?;

    let api_key = env::var("YATRA_API_KEY").unwrap_or_else(|_| "dev-yatra-key".to_string());
    let rate_limit_window = Duration::from_secs(
        env::var("YATRA_RATE_LIMIT_WINDOW_SECONDS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(60),
    );
    let rate_limit_max = env::var("YATRA_RATE_LIMIT_MAX")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(120);

    let state = ApiState {
        assistant: Arc::new(assistant),
        metrics,
        api_key,
        limiter: ClientRateLimiter::new(rate_limit_window, rate_limit_max),
    };

    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .route("/v1/turn", post(turn))
        .route("/v1/users/:user_id/stats", get(user_stats))
        .route("/v1/users/:user_id/reset", post(user_reset))
        .route("/v1/maintenance/purge", post(purge))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        store: state.assistant.store().backend_name(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn webhook(State(state): State<ApiState>, Form(form): Form<WebhookForm>) -> Response {
    let sender = form.from.trim();
    let sender = sender.strip_prefix("whatsapp:").unwrap_or(sender);

    let reply = state.assistant.handle_turn(sender, &form.body).await;

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        twiml_message(&reply),
    )
        .into_response()
}

async fn turn(State(state): State<ApiState>, Json(request): Json<TurnRequest>) -> Response {
    let reply = state
        .assistant
        .handle_turn(&request.user_id, &request.text)
        .await;

    (
        StatusCode::OK,
        Json(TurnResponse {
            user_id: request.user_id,
            reply,
        }),
    )
        .into_response()
}

async fn user_stats(State(state): State<ApiState>, Path(user_id): Path<String>) -> Response {
    match state.assistant.get_stats(&user_id).await {
        Ok(Some(stats)) => (StatusCode::OK, Json(stats)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "not_found",
                "message": "no active conversation for this user"
            })),
        )
            .into_response(),
        Err(err) => storage_failure(err),
    }
}

async fn user_reset(State(state): State<ApiState>, Path(user_id): Path<String>) -> Response {
    match state.assistant.reset(&user_id).await {
        Ok(removed) => (
            StatusCode::OK,
            Json(serde_json::json!({ "user_id": user_id, "removed": removed })),
        )
            .into_response(),
        Err(err) => storage_failure(err),
    }
}

async fn purge(State(state): State<ApiState>) -> Response {
    match state.assistant.purge_inactive().await {
        Ok(purged) => (StatusCode::OK, Json(serde_json::json!({ "purged": purged }))).into_response(),
        Err(err) => storage_failure(err),
    }
}

fn storage_failure(err: StorageError) -> Response {
    warn!(error = %err, "admin request failed on storage");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({
            "error": "storage_unavailable",
            "message": "context store is unavailable, retry later"
        })),
    )
        .into_response()
}

fn twiml_message(text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape_xml(text)
    )
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health" | "/webhook")
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if request.method() == Method::OPTIONS || is_public_endpoint(path.as_str()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if header_key != state.api_key {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "unauthorized",
                "message": "missing or invalid x-api-key"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let client = request_ip(&request);
    if !state.limiter.allow(&client) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "rate_limited",
                "message": "rate limit exceeded for this client"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .next()
                .unwrap_or("unknown")
                .trim()
                .to_string()
        })
        .unwrap_or_else(|| "local".to_string())
}
