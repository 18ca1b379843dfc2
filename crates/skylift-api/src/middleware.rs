//! Request middleware: identity, limits, telemetry, recovery.
//!
//! Ordering is set in [`crate::build_router`]; each middleware here is a
//! plain async function for `axum::middleware::from_fn`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequest, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use skylift_metrics::MetricsRegistry;

use crate::ApiState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request ID assigned at the edge, available to every handler as an
/// extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Honor a caller-supplied `X-Request-ID` or mint a UUID, then echo it
/// on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(RequestId(id.clone()));

    let mut resp = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        resp.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    resp
}

pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "x-xss-protection",
        HeaderValue::from_static("1; mode=block"),
    );
    resp
}

/// Count every request, maintain the active gauge, and fold the request
/// latency into the decaying average.
pub async fn track_metrics(
    State(state): State<ApiState>,
    req: Request,
    next: Next,
) -> Response {
    state.metrics.incr_requests();
    let _in_flight = InFlight::enter(Arc::clone(&state.metrics));
    next.run(req).await
}

/// Active-request slot, released on drop.
///
/// [`recover`] sits outside [`track_metrics`] in the stack, so a panic
/// unwinds through this frame before it is caught; the drop keeps the
/// gauge balanced on that path too.
struct InFlight {
    metrics: Arc<MetricsRegistry>,
    entered: std::time::Instant,
}

impl InFlight {
    fn enter(metrics: Arc<MetricsRegistry>) -> Self {
        metrics.incr_active();
        Self {
            metrics,
            entered: std::time::Instant::now(),
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.metrics.record_latency(self.entered.elapsed());
        self.metrics.decr_active();
    }
}

pub async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let client = client_key(&req);
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let started = std::time::Instant::now();

    let resp = next.run(req).await;

    info!(
        %method,
        path = %path,
        status = resp.status().as_u16(),
        client = %client,
        request_id = %request_id,
        elapsed = ?started.elapsed(),
        "request completed"
    );
    resp
}

/// Sliding-window admission per client key. A rejected request is never
/// recorded against the window.
pub async fn rate_limit(
    State(state): State<ApiState>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_key(&req);
    if !state.gate.allow(&client) {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default();
        warn!(client = %client, request_id = %request_id, "request rejected by rate limit");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "success": false,
                "error": "rate limit exceeded",
                "request_id": request_id,
            })),
        )
            .into_response();
    }
    next.run(req).await
}

/// Convert a handler panic into a 500 instead of tearing down the
/// connection task.
pub async fn recover(req: Request, next: Next) -> Response {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    match std::panic::AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(resp) => resp,
        Err(panic) => {
            let detail = if let Some(msg) = panic.downcast_ref::<&str>() {
                (*msg).to_string()
            } else if let Some(msg) = panic.downcast_ref::<String>() {
                msg.clone()
            } else {
                "unknown panic".to_string()
            };
            error!(request_id = %request_id, panic = %detail, "handler panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "internal server error",
                    "request_id": request_id,
                })),
            )
                .into_response()
        }
    }
}

/// Request body collected under the configured size limit.
///
/// Axum's built-in `Bytes` rejection answers in plain text; this wrapper
/// maps it onto the JSON error shape the rest of the API speaks, request
/// ID included. A body over `max_request_bytes` still yields 413.
pub struct LimitedBody(pub Bytes);

impl<S> FromRequest<S> for LimitedBody
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default();
        match Bytes::from_request(req, state).await {
            Ok(bytes) => Ok(Self(bytes)),
            Err(rejection) => {
                let status = rejection.status();
                warn!(
                    request_id = %request_id,
                    status = status.as_u16(),
                    "request body rejected"
                );
                Err((
                    status,
                    Json(json!({
                        "success": false,
                        "error": rejection.body_text(),
                        "request_id": request_id,
                    })),
                )
                    .into_response())
            }
        }
    }
}

/// Client key for rate limiting and logs: first `X-Forwarded-For` hop,
/// then `X-Real-IP`, then the peer address.
pub(crate) fn client_key(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = req
        .headers()
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
    {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
