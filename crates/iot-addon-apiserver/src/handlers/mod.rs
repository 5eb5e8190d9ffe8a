//! HTTP request handlers.
//!
//! Node and pod handlers rewrite the inbound path onto the matching IoT
//! resource, convert the body, relay through the proxy and convert the
//! upstream answer back. Everything else goes through [`raw::relay`].

pub mod health;
pub mod nodes;
pub mod pods;
pub mod raw;

use axum::body::{Body, Bytes};
use axum::http::{header, Method, Uri};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use iot_addon_core::{labels, IotKind, ResourceEvent, UntypedDoc, IOT_VERSION};
use kube::api::ListParams;
use serde::Deserialize;
use tracing::warn;

use crate::convert::Converter;
use crate::error::{ApiError, ProxyError};
use crate::proxy::{ProxyRequest, ProxyResponse, WatchStream};

const APPLICATION_JSON: &str = "application/json";

/// Query parameters understood on collection endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// `true` turns the list into a watch.
    #[serde(default)]
    pub watch: Option<String>,
    /// Label selector passed to the watch.
    #[serde(default)]
    pub label_selector: Option<String>,
    /// Field selector passed to the watch.
    #[serde(default)]
    pub field_selector: Option<String>,
    /// Server-side watch timeout.
    #[serde(default)]
    pub timeout_seconds: Option<u32>,
}

impl ListQuery {
    /// Whether the client asked for a watch.
    #[must_use]
    pub fn is_watch(&self) -> bool {
        self.watch
            .as_deref()
            .and_then(labels::parse_bool)
            .unwrap_or(false)
    }

    /// Watch parameters, restricted to `namespace` when given.
    #[must_use]
    pub fn list_params(&self, namespace: Option<&str>) -> ListParams {
        let mut params = ListParams::default();
        if let Some(labels) = &self.label_selector {
            params = params.labels(labels);
        }

        let namespace_field = namespace.map(|ns| format!("metadata.namespace={ns}"));
        let fields = match (&self.field_selector, namespace_field) {
            (Some(fields), Some(ns)) => Some(format!("{fields},{ns}")),
            (Some(fields), None) => Some(fields.clone()),
            (None, ns) => ns,
        };
        if let Some(fields) = &fields {
            params = params.fields(fields);
        }

        if let Some(timeout) = self.timeout_seconds {
            params = params.timeout(timeout);
        }
        params
    }
}

/// REST path of an IoT resource collection or object.
#[must_use]
pub fn iot_path(group: &str, kind: IotKind, namespace: Option<&str>, name: Option<&str>) -> String {
    let mut path = format!("/apis/{group}/{IOT_VERSION}");
    if let Some(namespace) = namespace {
        path.push_str("/namespaces/");
        path.push_str(namespace);
    }
    path.push('/');
    path.push_str(kind.plural());
    if let Some(name) = name {
        path.push('/');
        path.push_str(name);
    }
    path
}

/// Build a proxied request for `path`, converting a generic body to its IoT form.
pub(crate) fn rewrite_request(
    converter: &Converter,
    method: Method,
    path: &str,
    body: Bytes,
) -> Result<ProxyRequest, ApiError> {
    let uri: Uri = path
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid path {path:?}: {e}")))?;

    let body = converter
        .inbound(&body)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
        .map_or(body, Bytes::from);

    Ok(ProxyRequest::new(method, uri, body))
}

/// Turn an upstream answer into a response, converting IoT documents.
pub(crate) fn converted_response(converter: &Converter, response: ProxyResponse) -> Result<Response, ApiError> {
    let body = match converter.outbound(&response.body) {
        Ok(Some(bytes)) => Bytes::from(bytes),
        Ok(None) => response.body,
        Err(e) => {
            warn!(status = %response.status, error = %e, "Upstream returned an undecodable IoT document");
            return Err(ApiError::BadGateway(format!("undecodable upstream object: {e}")));
        }
    };

    Ok((response.status, [(header::CONTENT_TYPE, APPLICATION_JSON)], body).into_response())
}

/// Stream a proxied watch as newline-delimited generic events.
pub(crate) fn watch_response(converter: Converter, stream: WatchStream) -> Response {
    let frames = stream.map(move |item| watch_frame(&converter, item));
    ([(header::CONTENT_TYPE, APPLICATION_JSON)], Body::from_stream(frames)).into_response()
}

fn watch_frame(
    converter: &Converter,
    item: Result<ResourceEvent<UntypedDoc>, ProxyError>,
) -> Result<Bytes, ProxyError> {
    let event = item.unwrap_or_else(|e| {
        warn!(error = %e, "Proxied watch failed");
        ResourceEvent::Error(e.to_string())
    });

    let frame = match converter.watch_frame(&event) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(event = %event.kind(), error = %e, "Dropping undecodable watch object");
            converter.watch_frame(&ResourceEvent::Error(e.to_string()))?
        }
    };
    Ok(Bytes::from(frame))
}
