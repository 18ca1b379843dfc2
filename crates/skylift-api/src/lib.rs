//! skylift-api — REST API for the lander deployment service.
//!
//! Provides the axum router, handlers, and middleware chain. Handlers
//! only run the synchronous admission path; accepted deployments are
//! handed to the queue and the response goes out before any work runs.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/lander` | Validate and enqueue a deployment |
//! | GET | `/api/v1/landers` | List provisioned sites |
//! | GET | `/api/v1/status/{request_id}` | Deployment status (placeholder) |
//! | GET | `/health` | Service health |
//! | GET | `/metrics` | Metrics snapshot |
//! | GET | `/` | Service description and endpoint index |

pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};

use skylift_core::ServiceConfig;
use skylift_deploy::SiteCatalog;
use skylift_gate::RateLimiter;
use skylift_metrics::MetricsRegistry;
use skylift_queue::DeployQueue;

/// Shared state for API handlers and middleware.
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<ServiceConfig>,
    pub gate: Arc<RateLimiter>,
    pub metrics: Arc<MetricsRegistry>,
    pub queue: DeployQueue,
    pub catalog: SiteCatalog,
}

/// Build the complete router with the full middleware chain.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/lander", post(handlers::create_lander))
        .route("/landers", get(handlers::list_landers))
        .route("/status/{request_id}", get(handlers::deployment_status))
        .with_state(state.clone());

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .route("/", get(handlers::home).with_state(state.clone()))
        .route("/health", get(handlers::health).with_state(state.clone()))
        .route("/metrics", get(handlers::metrics_snapshot).with_state(state.clone()));

    apply_middleware(router, state)
}

/// Wrap `router` in the production middleware stack.
///
/// Layers added last run first, so this reads inner-to-outer: the
/// request passes security headers -> request id -> body limit ->
/// recovery -> metrics -> logging -> rate limit -> handler.
pub(crate) fn apply_middleware(router: Router, state: ApiState) -> Router {
    let max_body = state.config.server.max_request_bytes;
    router
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit))
        .layer(from_fn(middleware::log_requests))
        .layer(from_fn_with_state(state, middleware::track_metrics))
        .layer(from_fn(middleware::recover))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(from_fn(middleware::request_id))
        .layer(from_fn(middleware::security_headers))
}
