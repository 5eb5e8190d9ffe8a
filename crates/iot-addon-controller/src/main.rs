//! iot-addon controller
//!
//! Watches `IotDevice` and `IotDaemonSet` resources and keeps one pod per
//! matching (daemon set, device) pair.
//!
//! # Environment
//!
//! - `IOT_DOMAIN` - API group of the IoT resources
//! - `WATCH_MAX_RETRIES` - consecutive reconnects before giving up (0 = never)
//! - `WATCH_INITIAL_BACKOFF_MS`, `WATCH_MAX_BACKOFF_MS` - reconnect backoff
//! - `RUST_LOG` - log filter

use std::sync::Arc;

use iot_addon_controller::{Controller, ControllerConfig, KubeClusterClient};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

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

    tracing::info!("Starting iot-addon controller");

    let config = ControllerConfig::from_env()?;
    tracing::info!(
        iot_domain = %config.iot_domain,
        max_retries = config.retry.max_attempts,
        "Loaded controller configuration"
    );

    let client = Arc::new(KubeClusterClient::new(&config).await?);
    tracing::info!("Connected to Kubernetes cluster");

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received shutdown signal");
            }
            cancel.cancel();
        });
    }

    let controller = Controller::new(client, config.retry);
    controller.run(cancel).await?;

    tracing::info!("Controller stopped");
    Ok(())
}
