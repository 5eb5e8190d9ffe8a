//! Raw relay for every path without a dedicated handler.
//!
//! Version, event and service requests from device agents land here and are
//! forwarded with their own method and path, bodies untouched.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, Method, Uri};
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::proxy::ProxyRequest;
use crate::state::ApiState;

/// Forward the request verbatim and return the upstream status and body.
///
/// # Errors
///
/// Returns `BadGateway` if the backing server cannot be reached.
pub async fn relay(
    State(state): State<Arc<ApiState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req = ProxyRequest::new(method, uri, body);
    let response = state.proxy.relay(&req).await?;
    Ok((
        response.status,
        [(header::CONTENT_TYPE, "application/json")],
        response.body,
    )
        .into_response())
}
