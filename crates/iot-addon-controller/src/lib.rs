//! Device and daemon set reconcilers for the iot-addon.
//!
//! This crate keeps one pod running per (daemon set, device) pair:
//!
//! - [`DeviceReconciler`] reacts to device changes, deleting the pods of
//!   devices labelled `unschedulable` and creating missing pods otherwise
//! - [`DaemonSetReconciler`] fans a newly added daemon set out to every
//!   matching schedulable device
//! - [`Controller`] runs both behind supervised watch loops that reconnect
//!   with backoff instead of exiting
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Kubernetes API Server                        │
//! └─────────────────────────────────────────────────────────────────┘
//!                    ▲                            │ watch
//!   list/create/     │                            ▼
//!   delete           │          ┌─────────────────────────────────┐
//! ┌──────────────────┴────────┐ │   Controller (one task / kind)  │
//! │   KubeClusterClient       │ │  ┌───────────┐  ┌────────────┐  │
//! │   (ClusterClient)         │◀┼──│  Device   │  │ DaemonSet  │  │
//! └───────────────────────────┘ │  │ Reconciler│  │ Reconciler │  │
//!                               │  └─────┬─────┘  └──────┬─────┘  │
//!                               │        └──▶ PodCreator ◀┘       │
//!                               └─────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use iot_addon_controller::{Controller, ControllerConfig, KubeClusterClient};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ControllerConfig::from_env()?;
//! let client = Arc::new(KubeClusterClient::new(&config).await?);
//!
//! let controller = Controller::new(client, config.retry.clone());
//! controller.run(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature to reconcile against an in-memory cluster:
//!
//! ```ignore
//! use std::sync::Arc;
//! use iot_addon_controller::{DeviceReconciler, MockClusterClient, PodCreator};
//!
//! let client = Arc::new(MockClusterClient::new());
//! let reconciler = DeviceReconciler::new(Arc::new(PodCreator::new(client.clone())));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod daemonset;
pub mod device;
pub mod error;
pub mod k8s;
pub mod pod;
pub mod retry;
pub mod types;
pub mod watch;

pub use client::{ClusterClient, EventStream};
pub use daemonset::DaemonSetReconciler;
pub use device::DeviceReconciler;
pub use error::{ControllerError, Result};
pub use k8s::KubeClusterClient;
pub use pod::{build_pod, PodCreator};
pub use retry::{Backoff, RetryConfig};
pub use types::{ControllerConfig, EventOutcome, ReconcileSummary};
pub use watch::{run_watch_loop, Controller, EventHandler, WatchTarget};

#[cfg(any(test, feature = "test-utils"))]
pub use client::mock::MockClusterClient;
