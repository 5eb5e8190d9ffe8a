//! IoT addon API server
//!
//! Serves the generic Node and Pod API on top of the IoT resources of the
//! backing cluster.
//!
//! # Configuration
//!
//! - `LISTEN_ADDR` - bind address (default `0.0.0.0:8080`)
//! - `APISERVER_URL` - backing API server for relayed requests
//!   (default `http://127.0.0.1:8001`, a `kubectl proxy`)
//! - `IOT_DOMAIN` - API group of the IoT resources
//! - `DEVICE_NAMESPACE` - namespace of devices created as nodes
//!
//! Watches use the in-cluster or kubeconfig credentials.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iot_addon_apiserver::{create_router, ApiServerConfig, ApiState, ServerProxy};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,iot_addon=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting IoT addon API server");

    let config = ApiServerConfig::from_env();
    tracing::info!(
        listen_addr = %config.listen_addr,
        apiserver_url = %config.apiserver_url,
        iot_domain = %config.iot_domain,
        device_namespace = %config.device_namespace,
        "API server configuration loaded"
    );

    let kube = kube::Client::try_default().await?;
    let proxy = ServerProxy::new(&config.apiserver_url, kube, config.request_timeout())?;
    let listen_addr = config.listen_addr.clone();

    let app = create_router(ApiState::new(proxy, config));

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
