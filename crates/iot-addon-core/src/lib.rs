//! Core types and resource translation for the iot-addon.
//!
//! This crate provides the pieces shared by the controller and the API server:
//!
//! - **Resources**: `IotDevice`, `IotPod` and `IotDaemonSet`, built from the
//!   generic Kubernetes field types
//! - **Labels**: the correlation labels stamped on created pods and the
//!   `unschedulable` device marker
//! - **Translation**: `IotDevice` <-> `Node` and `IotPod` <-> `Pod`, plus the
//!   untyped document path used at the aggregation boundary
//! - **Watch**: runtime watcher events as untyped resource events
//!
//! # Example
//!
//! ```
//! use iot_addon_core::{DeviceTranslator, Projection, UntypedDoc};
//!
//! let translator = DeviceTranslator::new("iot.example.com");
//! let doc = UntypedDoc::from_json(br#"{
//!     "apiVersion": "iot.example.com/v1",
//!     "kind": "IotDevice",
//!     "metadata": { "name": "dev-1", "namespace": "edge" }
//! }"#).unwrap();
//!
//! let node = translator.from_untyped(&doc).unwrap();
//! assert_eq!(node.metadata.name.as_deref(), Some("dev-1"));
//! assert_eq!(node.metadata.namespace, None);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod event;
pub mod labels;
pub mod resources;
pub mod translate;
pub mod untyped;
pub mod watch;

pub use error::{Result, TranslationError};
pub use event::{EventKind, ResourceEvent};
pub use resources::{
    IotDaemonSet, IotDaemonSetList, IotDaemonSetSpec, IotDevice, IotDeviceList, IotKind,
    IotObject, IotPod, IotPodList, DEFAULT_IOT_DOMAIN, IOT_VERSION,
};
pub use translate::{DeviceTranslator, PodTranslator, Projection};
pub use untyped::{Document, TypedDoc, UntypedDoc};
pub use watch::{object_key, untyped_from_dynamic, WatchTranslator};
