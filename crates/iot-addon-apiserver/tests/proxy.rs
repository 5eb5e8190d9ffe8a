//! Forwarding proxy against a stub backing server.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, Uri};
use iot_addon_apiserver::{ProxyRequest, ResourceDescriptor, ServerProxy};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn proxy_for(server: &MockServer) -> ServerProxy {
    let cluster_url: Uri = server.uri().parse().unwrap();
    let kube = kube::Client::try_from(kube::Config::new(cluster_url)).unwrap();
    ServerProxy::new(format!("{}/", server.uri()), kube, Duration::from_secs(5)).unwrap()
}

fn request(method: Method, uri: &str, body: &'static [u8]) -> ProxyRequest {
    ProxyRequest::new(method, uri.parse().unwrap(), Bytes::from_static(body))
}

#[tokio::test]
async fn get_strips_query_and_returns_raw_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/nodes/dev-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"kind":"Node"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let proxy = proxy_for(&server);
    assert_eq!(proxy.server_address(), server.uri());

    let req = request(Method::GET, "/api/v1/nodes/dev-1?resourceVersion=7&timeout=30s", b"");
    let response = proxy.get(&req, &ResourceDescriptor::nodes()).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, Bytes::from_static(br#"{"kind":"Node"}"#));

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].url.query(), None);
}

#[tokio::test]
async fn post_forwards_body_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/namespaces/edge/events"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "kind": "Event" })))
        .expect(1)
        .mount(&server)
        .await;

    let body = br#"{"kind":"Event","reason":"Started"}"#;
    let req = request(Method::POST, "/api/v1/namespaces/edge/events", body);
    let response = proxy_for(&server)
        .post(&req, &ResourceDescriptor::raw("/api/v1/namespaces/edge/events"))
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::CREATED);
    let received = server.received_requests().await.unwrap();
    assert_eq!(received[0].body, body.to_vec());
}

#[tokio::test]
async fn verbs_are_preserved() {
    let server = MockServer::start().await;
    for verb in ["PUT", "PATCH", "DELETE"] {
        Mock::given(method(verb))
            .and(path("/api/v1/namespaces/edge/pods/p-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(verb))
            .mount(&server)
            .await;
    }

    let proxy = proxy_for(&server);
    let pods = ResourceDescriptor::pods();
    let uri = "/api/v1/namespaces/edge/pods/p-1";

    let put = proxy.put(&request(Method::PUT, uri, b"{}"), &pods).await.unwrap();
    let patch = proxy
        .patch(&request(Method::PATCH, uri, br#"{"status":{}}"#), &pods)
        .await
        .unwrap();
    let delete = proxy.relay(&request(Method::DELETE, uri, b"")).await.unwrap();

    assert_eq!(put.body, Bytes::from_static(b"PUT"));
    assert_eq!(patch.body, Bytes::from_static(b"PATCH"));
    assert_eq!(delete.body, Bytes::from_static(b"DELETE"));

    let received = server.received_requests().await.unwrap();
    let patch_request = received
        .iter()
        .find(|r| r.method.as_str() == "PATCH")
        .unwrap();
    assert_eq!(
        patch_request.headers.get("content-type").unwrap(),
        "application/merge-patch+json"
    );
}

#[tokio::test]
async fn upstream_errors_keep_their_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/nodes/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "code": 404
        })))
        .mount(&server)
        .await;

    let req = request(Method::GET, "/api/v1/nodes/missing", b"");
    let response = proxy_for(&server)
        .list(&req, &ResourceDescriptor::nodes())
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let status: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(status["code"], 404);
}

#[tokio::test]
async fn unreachable_upstream_is_an_error() {
    let kube = kube::Client::try_from(kube::Config::new(Uri::from_static("http://127.0.0.1:1"))).unwrap();
    let proxy = ServerProxy::new("http://127.0.0.1:1", kube, Duration::from_secs(1)).unwrap();

    let req = request(Method::GET, "/version", b"");
    assert!(proxy.relay(&req).await.is_err());
}
