//! Aggregated API server for the iot-addon.
//!
//! Device agents speak the generic cluster API. This crate sits in front of
//! the backing API server and presents `IotDevice` resources as `Node`s and
//! `IotPod` resources as `Pod`s:
//!
//! - Node and pod requests are rewritten onto the IoT resources, relayed
//!   through the [`ServerProxy`] and their answers converted back
//! - Watches are opened with the cluster client and streamed as
//!   newline-delimited generic events
//! - Every other path is relayed verbatim
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Device agents                           │
//! │              (generic Node / Pod API, HTTP)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    iot-addon-apiserver                       │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐   │
//! │  │   Router    │ │  Converter  │ │    ServerProxy      │   │
//! │  │  + Handlers │ │ (core xlate)│ │  (HTTP + watches)   │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                   ┌─────────────────────┐
//!                   │ Backing API server  │
//!                   │ (IotDevice, IotPod) │
//!                   └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use iot_addon_apiserver::{create_router, ApiServerConfig, ApiState, ServerProxy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiServerConfig::from_env();
//! let kube = kube::Client::try_default().await?;
//! let proxy = ServerProxy::new(&config.apiserver_url, kube, config.request_timeout())?;
//!
//! let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
//! let app = create_router(ApiState::new(proxy, config));
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod convert;
pub mod error;
pub mod handlers;
pub mod proxy;
pub mod routes;
pub mod state;

pub use config::ApiServerConfig;
pub use convert::Converter;
pub use error::{ApiError, ProxyError};
pub use proxy::{ProxyRequest, ProxyResponse, ResourceDescriptor, ServerProxy, WatchStream};
pub use routes::create_router;
pub use state::ApiState;
