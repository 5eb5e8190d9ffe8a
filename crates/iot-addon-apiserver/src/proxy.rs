//! Forwarding proxy to the backing API server.
//!
//! The five request verbs relay a request unchanged: the query string is
//! dropped, the path is appended to the backing server's address and the body
//! is sent as is. The raw upstream body comes back together with the upstream
//! status. Converting between IoT kinds and generic kinds is the handlers' job,
//! never the proxy's.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, Uri};
use futures::stream::BoxStream;
use futures::{future, StreamExt};
use iot_addon_core::{ResourceEvent, UntypedDoc, WatchTranslator};
use kube::api::{Api, ApiResource, DynamicObject, ListParams};
use kube::runtime::watcher::{watcher, Config as WatcherConfig};
use tracing::{debug, info};

use crate::error::ProxyError;

/// Inbound request as received at the aggregation boundary.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// HTTP method of the inbound request.
    pub method: Method,
    /// Path and query of the inbound request.
    pub uri: Uri,
    /// Raw request body.
    pub body: Bytes,
}

impl ProxyRequest {
    /// Create a request descriptor.
    #[must_use]
    pub fn new(method: Method, uri: Uri, body: Bytes) -> Self {
        Self { method, uri, body }
    }
}

/// The resource a request targets, named for request logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// REST plural name (e.g., "nodes").
    pub name: String,
}

impl ResourceDescriptor {
    /// Descriptor for the generic `Node` resource.
    #[must_use]
    pub fn nodes() -> Self {
        Self {
            name: "nodes".to_string(),
        }
    }

    /// Descriptor for the generic `Pod` resource.
    #[must_use]
    pub fn pods() -> Self {
        Self {
            name: "pods".to_string(),
        }
    }

    /// Descriptor for anything else, taken from the last path segment.
    #[must_use]
    pub fn raw(path: &str) -> Self {
        Self {
            name: path.rsplit('/').next().unwrap_or_default().to_string(),
        }
    }
}

/// Upstream status and raw body.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// Upstream status code.
    pub status: StatusCode,
    /// Upstream body, unmodified.
    pub body: Bytes,
}

/// Stream of events from a proxied watch.
pub type WatchStream = BoxStream<'static, Result<ResourceEvent<UntypedDoc>, ProxyError>>;

/// Relays requests to the backing API server.
#[derive(Clone)]
pub struct ServerProxy {
    http: reqwest::Client,
    server_address: String,
    kube: kube::Client,
}

impl ServerProxy {
    /// Create a proxy for `server_address`, using `kube` for watches.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(server_address: impl Into<String>, kube: kube::Client, timeout: Duration) -> Result<Self, ProxyError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            server_address: server_address.into().trim_end_matches('/').to_string(),
            kube,
        })
    }

    /// The backing server's base address.
    #[must_use]
    pub fn server_address(&self) -> &str {
        &self.server_address
    }

    /// Relay a GET for a single object.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream exchange fails.
    pub async fn get(&self, req: &ProxyRequest, resource: &ResourceDescriptor) -> Result<ProxyResponse, ProxyError> {
        self.forward(Method::GET, req, resource).await
    }

    /// Relay a GET for a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream exchange fails.
    pub async fn list(&self, req: &ProxyRequest, resource: &ResourceDescriptor) -> Result<ProxyResponse, ProxyError> {
        self.forward(Method::GET, req, resource).await
    }

    /// Relay a POST.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream exchange fails.
    pub async fn post(&self, req: &ProxyRequest, resource: &ResourceDescriptor) -> Result<ProxyResponse, ProxyError> {
        self.forward(Method::POST, req, resource).await
    }

    /// Relay a PUT.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream exchange fails.
    pub async fn put(&self, req: &ProxyRequest, resource: &ResourceDescriptor) -> Result<ProxyResponse, ProxyError> {
        self.forward(Method::PUT, req, resource).await
    }

    /// Relay a PATCH.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream exchange fails.
    pub async fn patch(&self, req: &ProxyRequest, resource: &ResourceDescriptor) -> Result<ProxyResponse, ProxyError> {
        self.forward(Method::PATCH, req, resource).await
    }

    /// Relay a request keeping its own method.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream exchange fails.
    pub async fn relay(&self, req: &ProxyRequest) -> Result<ProxyResponse, ProxyError> {
        let resource = ResourceDescriptor::raw(strip_query(&req.uri));
        self.forward(req.method.clone(), req, &resource).await
    }

    /// Upstream URL for an inbound request.
    #[must_use]
    pub fn target_url(&self, uri: &Uri) -> String {
        format!("{}{}", self.server_address, strip_query(uri))
    }

    async fn forward(
        &self,
        method: Method,
        req: &ProxyRequest,
        resource: &ResourceDescriptor,
    ) -> Result<ProxyResponse, ProxyError> {
        let url = self.target_url(&req.uri);
        debug!(
            method = %method,
            url = %url,
            resource = %resource.name,
            body = %String::from_utf8_lossy(&req.body),
            "Proxy request"
        );

        let mut builder = self.http.request(method.clone(), &url);
        if !req.body.is_empty() {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, content_type(&method))
                .body(req.body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!(
            method = %method,
            url = %url,
            status = %status,
            body = %String::from_utf8_lossy(&body),
            "Proxy response"
        );

        Ok(ProxyResponse { status, body })
    }

    /// Open a cluster-wide watch over an IoT kind.
    ///
    /// Existing objects arrive first as `Added`. The stream ends after the
    /// first error it yields.
    #[must_use]
    pub fn watch(&self, resource: &ApiResource, params: &ListParams) -> WatchStream {
        let api: Api<DynamicObject> = Api::all_with(self.kube.clone(), resource);
        let mut translator = WatchTranslator::new(resource.clone());

        info!(kind = %resource.kind, labels = ?params.label_selector, "Opening proxied watch");

        watcher(api, watcher_config(params))
            .filter_map(move |event| {
                future::ready(translator.translate(event).map(|item| item.map_err(ProxyError::from)))
            })
            .scan(false, |ended, item| future::ready(end_after_error(ended, item)))
            .boxed()
    }
}

/// Pass `item` through unless the stream already ended, ending it on errors.
fn end_after_error(
    ended: &mut bool,
    item: Result<ResourceEvent<UntypedDoc>, ProxyError>,
) -> Option<Result<ResourceEvent<UntypedDoc>, ProxyError>> {
    if *ended {
        return None;
    }
    *ended = matches!(item, Err(_) | Ok(ResourceEvent::Error(_)));
    Some(item)
}

/// Drop everything after `?`.
#[must_use]
pub fn strip_query(uri: &Uri) -> &str {
    uri.path()
}

fn content_type(method: &Method) -> &'static str {
    if method == Method::PATCH {
        "application/merge-patch+json"
    } else {
        "application/json"
    }
}

fn watcher_config(params: &ListParams) -> WatcherConfig {
    let mut config = WatcherConfig::default();
    if let Some(labels) = &params.label_selector {
        config = config.labels(labels);
    }
    if let Some(fields) = &params.field_selector {
        config = config.fields(fields);
    }
    if let Some(timeout) = params.timeout {
        config = config.timeout(timeout);
    }
    config
}
