//! REST API handlers.
//!
//! Each handler runs the synchronous admission path only; deployments
//! execute later on the worker pool. Responses are JSON throughout.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, info};

use skylift_core::DeployRequest;

use crate::ApiState;
use crate::middleware::{LimitedBody, RequestId};

/// Successful admission response for `POST /api/v1/lander`.
#[derive(Debug, serde::Serialize)]
pub struct LanderResponse {
    pub success: bool,
    pub message: String,
    pub subdomain: String,
    pub url: String,
    pub request_id: String,
    /// Admission-path latency only; the deployment itself runs later.
    pub duration: String,
}

fn error_response(message: &str, request_id: &str, status: StatusCode) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": message,
            "request_id": request_id,
        })),
    )
        .into_response()
}

// ── Deployments ────────────────────────────────────────────────

/// POST /api/v1/lander
pub async fn create_lander(
    State(state): State<ApiState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    LimitedBody(body): LimitedBody,
) -> impl IntoResponse {
    let started = Instant::now();
    info!(
        request_id = %request_id,
        endpoint = "/api/v1/lander",
        "new lander deployment request"
    );

    let mut request: DeployRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            error!(request_id = %request_id, error = %err, "failed to parse JSON");
            return error_response("Invalid JSON format", &request_id, StatusCode::BAD_REQUEST);
        }
    };
    request.request_id = request_id.clone();

    if let Err(err) = request.validate() {
        error!(request_id = %request_id, error = %err, "validation failed");
        return error_response(&err.to_string(), &request_id, StatusCode::BAD_REQUEST);
    }

    info!(
        request_id = %request_id,
        campaign_id = %request.campaign_id,
        landing_page_id = %request.landing_page_id,
        subdomain = %request.subdomain,
        "deploying lander with configuration"
    );

    let full_domain = request.full_domain(&state.config.deploy.base_domain);
    if let Err(err) = state.queue.enqueue(request) {
        error!(request_id = %request_id, error = %err, "deployment rejected");
        return error_response(
            &err.to_string(),
            &request_id,
            StatusCode::SERVICE_UNAVAILABLE,
        );
    }
    state.metrics.incr_deployments();

    let duration = format!("{:.3}ms", started.elapsed().as_secs_f64() * 1000.0);
    info!(
        request_id = %request_id,
        domain = %full_domain,
        queued = state.queue.depth(),
        duration = %duration,
        "deployment queued"
    );

    let response = LanderResponse {
        success: true,
        message: "lander deployment queued".to_string(),
        url: format!("https://{full_domain}"),
        subdomain: full_domain,
        request_id,
        duration: duration.clone(),
    };
    let mut resp = Json(response).into_response();
    if let Ok(value) = HeaderValue::from_str(&duration) {
        resp.headers_mut().insert("x-response-time", value);
    }
    resp
}

/// GET /api/v1/landers
pub async fn list_landers(
    State(state): State<ApiState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> impl IntoResponse {
    info!(request_id = %request_id, "listing deployed landers");
    match state.catalog.list() {
        Ok(sites) => Json(json!({
            "success": true,
            "request_id": request_id,
            "total_count": sites.len(),
            "sites": sites,
        }))
        .into_response(),
        Err(err) => {
            error!(request_id = %request_id, error = %format!("{err:#}"), "failed to list sites");
            error_response(
                "failed to read sites directory",
                &request_id,
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    }
}

/// GET /api/v1/status/{request_id}
///
/// Placeholder: no per-deployment terminal state is persisted, so every
/// known ID reports completed.
pub async fn deployment_status(
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(deployment_id): Path<String>,
) -> impl IntoResponse {
    info!(
        request_id = %request_id,
        deployment_id = %deployment_id,
        "checking deployment status"
    );
    Json(json!({
        "success": true,
        "request_id": request_id,
        "deployment_id": deployment_id,
        "status": "completed",
        "message": "deployment completed",
        "checked_at": epoch_secs(),
    }))
}

// ── Service endpoints ──────────────────────────────────────────

/// GET /
pub async fn home(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({
        "service": "skylift",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "operational",
        "description": "landing page deployment service",
        "endpoints": {
            "GET /": "service description and endpoint index",
            "GET /health": "service health",
            "GET /metrics": "metrics snapshot",
            "POST /api/v1/lander": "validate and enqueue a deployment",
            "GET /api/v1/landers": "list provisioned sites",
            "GET /api/v1/status/{request_id}": "deployment status by request id",
        },
        "uptime_secs": state.metrics.uptime().as_secs(),
    }))
}

/// GET /health
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "skylift",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": epoch_secs(),
        "uptime_secs": state.metrics.uptime().as_secs(),
    }))
}

/// GET /metrics
pub async fn metrics_snapshot(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Current Unix epoch in seconds.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Bytes;
    use skylift_core::ServiceConfig;
    use skylift_deploy::SiteCatalog;
    use skylift_gate::RateLimiter;
    use skylift_metrics::MetricsRegistry;
    use skylift_queue::{JobReceiver, deploy_queue};
    use tempfile::TempDir;

    fn test_state(queue_capacity: usize, sites_dir: &std::path::Path) -> (ApiState, Arc<JobReceiver>) {
        let (queue, jobs) = deploy_queue(queue_capacity);
        let state = ApiState {
            config: Arc::new(ServiceConfig::default()),
            gate: Arc::new(RateLimiter::new(100, Duration::from_secs(60))),
            metrics: Arc::new(MetricsRegistry::new()),
            queue,
            catalog: SiteCatalog::new(sites_dir, "example.com"),
        };
        (state, jobs)
    }

    fn rid(id: &str) -> Extension<RequestId> {
        Extension(RequestId(id.to_string()))
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn create_lander_queues_and_responds() {
        let tmp = TempDir::new().unwrap();
        let (state, _jobs) = test_state(4, tmp.path());
        let body = Bytes::from(
            r#"{"campaign_id":"cmp1","landing_page_id":"lp1","subdomain":"promo"}"#,
        );

        let resp = create_lander(State(state.clone()), rid("req-1"), LimitedBody(body))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("x-response-time"));

        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["subdomain"], "promo.example.com");
        assert_eq!(json["url"], "https://promo.example.com");
        assert_eq!(json["request_id"], "req-1");

        assert_eq!(state.queue.depth(), 1);
        assert_eq!(state.metrics.snapshot().total_deployments, 1);
    }

    #[tokio::test]
    async fn create_lander_rejects_malformed_json() {
        let tmp = TempDir::new().unwrap();
        let (state, _jobs) = test_state(4, tmp.path());

        let resp = create_lander(
            State(state),
            rid("req-1"),
            LimitedBody(Bytes::from("{not json")),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json = body_json(resp).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Invalid JSON format");
        assert_eq!(json["request_id"], "req-1");
    }

    #[tokio::test]
    async fn create_lander_rejects_missing_fields() {
        let tmp = TempDir::new().unwrap();
        let (state, _jobs) = test_state(4, tmp.path());

        let resp = create_lander(
            State(state),
            rid("req-1"),
            LimitedBody(Bytes::from(r#"{"landing_page_id":"lp1","subdomain":"promo"}"#)),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json = body_json(resp).await;
        assert_eq!(json["error"], "campaign_id is required and cannot be empty");
    }

    #[tokio::test]
    async fn create_lander_rejects_bad_subdomain() {
        let tmp = TempDir::new().unwrap();
        let (state, _jobs) = test_state(4, tmp.path());

        let resp = create_lander(
            State(state),
            rid("req-1"),
            LimitedBody(Bytes::from(
                r#"{"campaign_id":"c","landing_page_id":"l","subdomain":"bad_sub"}"#,
            )),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json = body_json(resp).await;
        assert_eq!(json["error"], "invalid subdomain format");
    }

    #[tokio::test]
    async fn create_lander_sheds_load_when_queue_is_full() {
        let tmp = TempDir::new().unwrap();
        let (state, _jobs) = test_state(1, tmp.path());
        let body = r#"{"campaign_id":"c","landing_page_id":"l","subdomain":"promo"}"#;

        let resp = create_lander(
            State(state.clone()),
            rid("req-1"),
            LimitedBody(Bytes::from(body)),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = create_lander(
            State(state.clone()),
            rid("req-2"),
            LimitedBody(Bytes::from(body)),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let json = body_json(resp).await;
        assert_eq!(json["error"], "queue full");
        // The rejected request still counts no deployment.
        assert_eq!(state.metrics.snapshot().total_deployments, 1);
    }

    #[tokio::test]
    async fn create_lander_rejects_after_close() {
        let tmp = TempDir::new().unwrap();
        let (state, _jobs) = test_state(4, tmp.path());
        state.queue.close();

        let resp = create_lander(
            State(state),
            rid("req-1"),
            LimitedBody(Bytes::from(
                r#"{"campaign_id":"c","landing_page_id":"l","subdomain":"promo"}"#,
            )),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let json = body_json(resp).await;
        assert_eq!(json["error"], "queue closed");
    }

    #[tokio::test]
    async fn list_landers_returns_catalog_entries() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("promo.example.com"), "server {}").unwrap();
        std::fs::write(tmp.path().join("unrelated"), "server {}").unwrap();
        let (state, _jobs) = test_state(4, tmp.path());

        let resp = list_landers(State(state), rid("req-1")).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["total_count"], 1);
        assert_eq!(json["sites"][0]["domain"], "promo.example.com");
    }

    #[tokio::test]
    async fn list_landers_reports_directory_errors() {
        let tmp = TempDir::new().unwrap();
        let (state, _jobs) = test_state(4, &tmp.path().join("absent"));

        let resp = list_landers(State(state), rid("req-1")).await.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(resp).await;
        assert_eq!(json["error"], "failed to read sites directory");
    }

    #[tokio::test]
    async fn deployment_status_always_reports_completed() {
        let resp = deployment_status(rid("req-9"), Path("dep-1".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["status"], "completed");
        assert_eq!(json["deployment_id"], "dep-1");
        assert_eq!(json["request_id"], "req-9");
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let tmp = TempDir::new().unwrap();
        let (state, _jobs) = test_state(4, tmp.path());

        let resp = health(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "skylift");
    }

    #[tokio::test]
    async fn home_lists_endpoints() {
        let tmp = TempDir::new().unwrap();
        let (state, _jobs) = test_state(4, tmp.path());

        let resp = home(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["service"], "skylift");
        assert!(json["endpoints"]["POST /api/v1/lander"].is_string());
    }

    #[tokio::test]
    async fn metrics_snapshot_serializes_counters() {
        let tmp = TempDir::new().unwrap();
        let (state, _jobs) = test_state(4, tmp.path());
        state.metrics.incr_requests();

        let resp = metrics_snapshot(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["request_count"], 1);
    }
}
