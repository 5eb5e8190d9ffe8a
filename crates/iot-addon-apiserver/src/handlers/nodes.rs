//! `Node` endpoints, backed by `IotDevice` resources.
//!
//! Devices are namespaced while nodes are not: collection reads span every
//! namespace, object reads and writes target the configured device namespace.

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

fn collection_path(state: &ApiState) -> String {
    iot_path(state.converter.group(), IotKind::Device, None, None)
}

fn object_path(state: &ApiState, name: &str) -> String {
    iot_path(
        state.converter.group(),
        IotKind::Device,
        Some(state.config.device_namespace.as_str()),
        Some(name),
    )
}

/// List nodes, or watch them with `?watch=true`.
///
/// # Errors
///
/// Returns `BadGateway` if the backing server cannot be reached or answers
/// with an undecodable device.
pub async fn list_nodes(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    if query.is_watch() {
        return Ok(watch(&state, &query));
    }

    let req = rewrite_request(&state.converter, Method::GET, &collection_path(&state), Bytes::new())?;
    let response = state.proxy.list(&req, &ResourceDescriptor::nodes()).await?;
    converted_response(&state.converter, response)
}

/// Watch nodes (`/api/v1/watch/nodes`).
pub async fn watch_nodes(State(state): State<Arc<ApiState>>, Query(query): Query<ListQuery>) -> Response {
    watch(&state, &query)
}

/// Create a node from a `Node` body.
///
/// # Errors
///
/// Returns `BadRequest` for an invalid body and `BadGateway` for upstream failures.
pub async fn create_node(State(state): State<Arc<ApiState>>, body: Bytes) -> Result<Response, ApiError> {
    let path = iot_path(
        state.converter.group(),
        IotKind::Device,
        Some(state.config.device_namespace.as_str()),
        None,
    );
    let req = rewrite_request(&state.converter, Method::POST, &path, body)?;
    let response = state.proxy.post(&req, &ResourceDescriptor::nodes()).await?;
    converted_response(&state.converter, response)
}

/// Get a single node.
///
/// # Errors
///
/// Returns `BadGateway` for upstream failures.
pub async fn get_node(State(state): State<Arc<ApiState>>, Path(name): Path<String>) -> Result<Response, ApiError> {
    let req = rewrite_request(&state.converter, Method::GET, &object_path(&state, &name), Bytes::new())?;
    let response = state.proxy.get(&req, &ResourceDescriptor::nodes()).await?;
    converted_response(&state.converter, response)
}

/// Replace a node.
///
/// # Errors
///
/// Returns `BadRequest` for an invalid body and `BadGateway` for upstream failures.
pub async fn replace_node(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req = rewrite_request(&state.converter, Method::PUT, &object_path(&state, &name), body)?;
    let response = state.proxy.put(&req, &ResourceDescriptor::nodes()).await?;
    converted_response(&state.converter, response)
}

/// Patch a node. Patch bodies are forwarded unchanged.
///
/// # Errors
///
/// Returns `BadGateway` for upstream failures.
pub async fn patch_node(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req = rewrite_request(&state.converter, Method::PATCH, &object_path(&state, &name), body)?;
    let response = state.proxy.patch(&req, &ResourceDescriptor::nodes()).await?;
    converted_response(&state.converter, response)
}

fn watch(state: &ApiState, query: &ListQuery) -> Response {
    let resource = IotKind::Device.api_resource(state.converter.group());
    let params = query.list_params(None);
    debug!(labels = ?params.label_selector, "Watching nodes");
    watch_response(state.converter.clone(), state.proxy.watch(&resource, &params))
}
