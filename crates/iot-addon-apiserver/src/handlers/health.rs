//! Liveness and readiness endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, Uri};
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::error::ApiError;
use crate::proxy::{ProxyRequest, ResourceDescriptor};
use crate::state::ApiState;

const READYZ: &str = "/readyz";

/// Liveness and readiness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `ready`.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// The backing API server requests are relayed to.
    pub apiserver_url: String,
}

impl HealthResponse {
    fn new(status: &'static str, state: &ApiState) -> Self {
        Self {
            status,
            version: env!("CARGO_PKG_VERSION"),
            apiserver_url: state.proxy.server_address().to_string(),
        }
    }
}

/// Liveness: answers locally without touching the backing API server.
///
/// ```text
/// GET /health
///
/// Response: 200 OK
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "apiserver_url": "http://127.0.0.1:8001"
/// }
/// ```
pub async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse::new("healthy", &state))
}

/// Readiness: the backing API server answers its own `/readyz`.
///
/// # Errors
///
/// Returns `Unavailable` (503) when the backing server is unreachable or
/// reports itself not ready.
pub async fn ready(State(state): State<Arc<ApiState>>) -> Result<Json<HealthResponse>, ApiError> {
    let req = ProxyRequest::new(Method::GET, Uri::from_static(READYZ), Bytes::new());

    let response = state
        .proxy
        .get(&req, &ResourceDescriptor::raw(READYZ))
        .await
        .map_err(|e| {
            warn!(error = %e, "Backing API server unreachable");
            ApiError::Unavailable(format!("backing API server unreachable: {e}"))
        })?;

    if !response.status.is_success() {
        warn!(status = %response.status, "Backing API server not ready");
        return Err(ApiError::Unavailable(format!(
            "backing API server answered {}",
            response.status
        )));
    }

    Ok(Json(HealthResponse::new("ready", &state)))
}
