//! Main axum router and HTTP request handlers.
//!
//! Routes:
//! - `GET  /_status`   - Sync status and live view set summary
//! - `POST /_refresh`  - Manual refresh (`?force=true` bypasses the staleness gate)
//! - `POST /webhook`   - Signed upstream change notification
//! - `GET  /healthz`   - Health check
//! - `GET  /metrics`   - Prometheus metrics
//! - `GET  /*`         - Published documents (see [`super::resolve`])

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use super::resolve::{resolve, NotFound};
use crate::metrics::WebhookResult;
use crate::sync::scheduler::spawn_refresh;
use crate::sync::webhook::{self, WebhookDecision};
use crate::sync::{RefreshOutcome, SyncStatus, Trigger};
use crate::views::Format;
use crate::AppState;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum [`Router`] with all HTTP routes and shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Operational endpoints
        .route("/_status", get(handle_status).fallback(method_not_allowed))
        .route("/_refresh", post(handle_refresh).fallback(method_not_allowed))
        .route("/webhook", post(handle_webhook).fallback(method_not_allowed))
        .route("/healthz", get(handle_health))
        .route("/metrics", get(handle_metrics))
        // Everything else is a published document
        .fallback(handle_view)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct RefreshQuery {
    #[serde(default)]
    force: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse<'a> {
    #[serde(flatten)]
    sync: &'a SyncStatus,
    building: bool,
    live: LiveViews<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LiveViews<'a> {
    generated_at: Option<DateTime<Utc>>,
    content_id: Option<&'a str>,
    entry_count: usize,
    document_count: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /{path}`
///
/// Resolves the undecoded request path against the live view set.  Both the
/// literal and the percent-encoded identifier forms are accepted.
#[instrument(skip_all, fields(path = %uri.path()))]
async fn handle_view(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if method != Method::GET && method != Method::HEAD {
        return Err(AppError::MethodNotAllowed);
    }

    let views = state.session.views();
    if views.is_empty() {
        return Err(AppError::NotReady);
    }

    let preferred = if accepts_html(&headers) {
        Format::Html
    } else {
        Format::Json
    };
    let resolved = resolve(
        &views,
        uri.path(),
        &state.config.views.base_path,
        &state.config.views.compat_prefixes,
        preferred,
    )
    .map_err(|e| {
        debug!(reason = %e, "no document for path");
        AppError::NotFound(e)
    })?;

    let doc = views
        .document(&resolved.key)
        .ok_or_else(|| AppError::NotFound(NotFound::Path))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, doc.format.content_type())],
        doc.body.clone(),
    )
        .into_response())
}

/// `GET /_status`
async fn handle_status(State(state): State<Arc<AppState>>) -> Response {
    let sync = state.session.status();
    let views = state.session.views();
    let body = StatusResponse {
        sync: &sync,
        building: state.session.is_building(),
        live: LiveViews {
            generated_at: (!views.is_empty()).then(|| views.generated_at()),
            content_id: views.content_id(),
            entry_count: views.entry_count(),
            document_count: views.document_count(),
        },
    };
    Json(body).into_response()
}

/// `POST /_refresh[?force=true]`
///
/// Runs a refresh on its own task and reports its outcome.  When a build is
/// already running this returns `skipped-in-progress` straight away; a
/// client that disconnects early does not interrupt the pass.
#[instrument(skip_all)]
async fn handle_refresh(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RefreshQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let outcome = state
        .coordinator
        .refresh_detached(Trigger::Manual, query.force)
        .await;
    info!(?outcome, force = query.force, "manual refresh finished");
    match outcome {
        RefreshOutcome::Failed { error } => Err(AppError::RefreshFailed(error)),
        other => Ok(Json(other).into_response()),
    }
}

/// `POST /webhook`
///
/// Verifies the body signature, then acknowledges pings, ignores refs that
/// are not tracked, and starts a background refresh for the tracked ref.
#[instrument(skip_all)]
async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let metrics = &state.metrics.metrics;
    if let Err(e) = webhook::verify_signature(state.webhook_secret.as_deref(), &headers, &body) {
        warn!(security = true, error = %e, "webhook signature verification failed");
        metrics.record_webhook(WebhookResult::Rejected);
        return Err(AppError::WebhookAuth(e.to_string()));
    }

    let tracked_ref = &state.coordinator.settings().tracked_ref;
    let response = match webhook::classify(&headers, &body, tracked_ref) {
        WebhookDecision::Ping => {
            metrics.record_webhook(WebhookResult::Ping);
            (StatusCode::OK, Json(json!({"result": "pong"})))
        }
        WebhookDecision::Ignored { reason } => {
            debug!(%reason, "ignoring webhook delivery");
            metrics.record_webhook(WebhookResult::Ignored);
            (
                StatusCode::OK,
                Json(json!({"result": "ignored", "reason": reason})),
            )
        }
        WebhookDecision::Refresh { git_ref } => {
            info!(%git_ref, "webhook reports tracked ref moved; refreshing");
            metrics.record_webhook(WebhookResult::Accepted);
            spawn_refresh(&state.coordinator, Trigger::Webhook);
            (
                StatusCode::ACCEPTED,
                Json(json!({"result": "accepted", "ref": git_ref})),
            )
        }
    };
    Ok(response.into_response())
}

/// `GET /healthz`
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    crate::health::health_handler(&state.session)
}

/// `GET /metrics`
///
/// Returns Prometheus metrics collected by the service.
async fn handle_metrics(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let buf = state
        .metrics
        .encode()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("metrics encoding failed: {e}")))?;

    Ok((
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        buf,
    )
        .into_response())
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Browsers ask for HTML first; API clients get JSON.
fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .and_then(|accept| accept.split(',').next())
        .is_some_and(|first| first.trim().starts_with("text/html"))
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Application-level error type that maps cleanly to HTTP responses.  Every
/// variant renders as `{"error": {"kind": ..., "message": ...}}`.
#[derive(Debug)]
pub enum AppError {
    NotFound(NotFound),
    BadRequest(String),
    /// Missing or invalid webhook signature.
    WebhookAuth(String),
    MethodNotAllowed,
    /// Nothing has been published yet.
    NotReady,
    RefreshFailed(String),
    /// An unexpected internal error.
    Internal(anyhow::Error),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::NotFound(e) => (StatusCode::NOT_FOUND, "not-found", e.to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad-request", msg.clone()),
            Self::WebhookAuth(msg) => (StatusCode::FORBIDDEN, "webhook-auth", msg.clone()),
            Self::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "method-not-allowed",
                "method not allowed".to_string(),
            ),
            Self::NotReady => (
                StatusCode::SERVICE_UNAVAILABLE,
                "not-ready",
                "no view set has been published yet".to_string(),
            ),
            Self::RefreshFailed(msg) => (StatusCode::BAD_GATEWAY, "refresh-failed", msg.clone()),
            Self::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                format!("{err:#}"),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = self.parts();
        if let Self::Internal(err) = &self {
            error!(error = %err, "internal server error");
        }
        let body = json!({"error": {"kind": kind, "message": message}});
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}
