//! `Pod` endpoints, backed by `IotPod` resources.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::Method;
use axum::response::Response;
use iot_addon_core::IotKind;
use tracing::debug;

use super::{converted_response, iot_path, rewrite_request, watch_response, ListQuery};
use crate::error::ApiError;
use crate::proxy::ResourceDescriptor;
use crate::state::ApiState;

fn pods_path(state: &ApiState, namespace: Option<&str>, name: Option<&str>) -> String {
    iot_path(state.converter.group(), IotKind::Pod, namespace, name)
}

async fn list(state: &ApiState, query: &ListQuery, namespace: Option<&str>) -> Result<Response, ApiError> {
    if query.is_watch() {
        return Ok(watch(state, query, namespace));
    }

    let req = rewrite_request(&state.converter, Method::GET, &pods_path(state, namespace, None), Bytes::new())?;
    let response = state.proxy.list(&req, &ResourceDescriptor::pods()).await?;
    converted_response(&state.converter, response)
}

fn watch(state: &ApiState, query: &ListQuery, namespace: Option<&str>) -> Response {
    let resource = IotKind::Pod.api_resource(state.converter.group());
    let params = query.list_params(namespace);
    debug!(namespace = ?namespace, fields = ?params.field_selector, "Watching pods");
    watch_response(state.converter.clone(), state.proxy.watch(&resource, &params))
}

/// List pods across all namespaces, or watch them with `?watch=true`.
///
/// # Errors
///
/// Returns `BadGateway` for upstream failures.
pub async fn list_all_pods(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    list(&state, &query, None).await
}

/// List pods of one namespace, or watch them with `?watch=true`.
///
/// # Errors
///
/// Returns `BadGateway` for upstream failures.
pub async fn list_pods(
    State(state): State<Arc<ApiState>>,
    Path(namespace): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    list(&state, &query, Some(namespace.as_str())).await
}

/// Watch pods across all namespaces (`/api/v1/watch/pods`).
pub async fn watch_all_pods(State(state): State<Arc<ApiState>>, Query(query): Query<ListQuery>) -> Response {
    watch(&state, &query, None)
}

/// Watch pods of one namespace.
pub async fn watch_pods(
    State(state): State<Arc<ApiState>>,
    Path(namespace): Path<String>,
    Query(query): Query<ListQuery>,
) -> Response {
    watch(&state, &query, Some(namespace.as_str()))
}

/// Create a pod from a `Pod` body.
///
/// # Errors
///
/// Returns `BadRequest` for an invalid body and `BadGateway` for upstream failures.
pub async fn create_pod(
    State(state): State<Arc<ApiState>>,
    Path(namespace): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let path = pods_path(&state, Some(namespace.as_str()), None);
    let req = rewrite_request(&state.converter, Method::POST, &path, body)?;
    let response = state.proxy.post(&req, &ResourceDescriptor::pods()).await?;
    converted_response(&state.converter, response)
}

/// Get a single pod.
///
/// # Errors
///
/// Returns `BadGateway` for upstream failures.
pub async fn get_pod(
    State(state): State<Arc<ApiState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let path = pods_path(&state, Some(namespace.as_str()), Some(name.as_str()));
    let req = rewrite_request(&state.converter, Method::GET, &path, Bytes::new())?;
    let response = state.proxy.get(&req, &ResourceDescriptor::pods()).await?;
    converted_response(&state.converter, response)
}

/// Replace a pod.
///
/// # Errors
///
/// Returns `BadRequest` for an invalid body and `BadGateway` for upstream failures.
pub async fn replace_pod(
    State(state): State<Arc<ApiState>>,
    Path((namespace, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let path = pods_path(&state, Some(namespace.as_str()), Some(name.as_str()));
    let req = rewrite_request(&state.converter, Method::PUT, &path, body)?;
    let response = state.proxy.put(&req, &ResourceDescriptor::pods()).await?;
    converted_response(&state.converter, response)
}

/// Patch a pod (status updates from the device agents arrive here).
///
/// # Errors
///
/// Returns `BadGateway` for upstream failures.
pub async fn patch_pod(
    State(state): State<Arc<ApiState>>,
    Path((namespace, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let path = pods_path(&state, Some(namespace.as_str()), Some(name.as_str()));
    let req = rewrite_request(&state.converter, Method::PATCH, &path, body)?;
    let response = state.proxy.patch(&req, &ResourceDescriptor::pods()).await?;
    converted_response(&state.converter, response)
}
