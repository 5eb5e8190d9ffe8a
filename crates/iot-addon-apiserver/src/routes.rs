//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, nodes, pods, raw};
use crate::state::ApiState;

/// Create the API server router with all routes and middleware.
///
/// # Routes
///
/// ## Local
/// - `GET /health` - Liveness, answered locally
/// - `GET /ready` - Readiness, checks the backing server's `/readyz`
///
/// ## Nodes (backed by `IotDevice`)
/// - `GET /api/v1/nodes` - List nodes (`?watch=true` to watch)
/// - `POST /api/v1/nodes` - Create node
/// - `GET /api/v1/nodes/:name` - Get node
/// - `PUT /api/v1/nodes/:name` - Replace node
/// - `PATCH /api/v1/nodes/:name` - Patch node
/// - `GET /api/v1/watch/nodes` - Watch nodes
///
/// ## Pods (backed by `IotPod`)
/// - `GET /api/v1/pods` - List pods in all namespaces
/// - `GET /api/v1/namespaces/:namespace/pods` - List pods
/// - `POST /api/v1/namespaces/:namespace/pods` - Create pod
/// - `GET /api/v1/namespaces/:namespace/pods/:name` - Get pod
/// - `PUT /api/v1/namespaces/:namespace/pods/:name` - Replace pod
/// - `PATCH /api/v1/namespaces/:namespace/pods/:name` - Patch pod
/// - `GET /api/v1/watch/pods` - Watch pods in all namespaces
/// - `GET /api/v1/watch/namespaces/:namespace/pods` - Watch pods
///
/// ## Everything else
/// Relayed verbatim to the backing API server.
pub fn create_router(state: ApiState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let state = Arc::new(state);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        // Nodes
        .route("/api/v1/nodes", get(nodes::list_nodes).post(nodes::create_node))
        .route(
            "/api/v1/nodes/:name",
            get(nodes::get_node)
                .put(nodes::replace_node)
                .patch(nodes::patch_node),
        )
        // Pods
        .route("/api/v1/pods", get(pods::list_all_pods))
        .route(
            "/api/v1/namespaces/:namespace/pods",
            get(pods::list_pods).post(pods::create_pod),
        )
        .route(
            "/api/v1/namespaces/:namespace/pods/:name",
            get(pods::get_pod).put(pods::replace_pod).patch(pods::patch_pod),
        )
        // Watches (the timeout covers the response head, not the event stream)
        .route("/api/v1/watch/nodes", get(nodes::watch_nodes))
        .route("/api/v1/watch/pods", get(pods::watch_all_pods))
        .route("/api/v1/watch/namespaces/:namespace/pods", get(pods::watch_pods))
        // Everything else
        .fallback(raw::relay)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
