//! Domain resource types.
//!
//! The IoT kinds reuse the generic Kubernetes field types (`NodeSpec`,
//! `PodSpec`, ...) so that projecting them onto Nodes and Pods is a structural
//! copy. Only the type metadata differs.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{NodeSpec, NodeStatus, PodSpec, PodStatus, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ListMeta, ObjectMeta};
use kube::core::{ApiResource, GroupVersionKind, TypeMeta};
use serde::{Deserialize, Serialize};

/// Default API group of the IoT kinds.
pub const DEFAULT_IOT_DOMAIN: &str = "iot.fest-research.io";

/// API version shared by all IoT kinds.
pub const IOT_VERSION: &str = "v1";

/// The domain resource kinds served by the addon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IotKind {
    /// `IotDevice`, projected as a Node.
    Device,
    /// `IotPod`, projected as a Pod.
    Pod,
    /// `IotDaemonSet`, the per-device pod template.
    DaemonSet,
}

impl IotKind {
    /// All kinds, in dependency order.
    pub const ALL: [Self; 3] = [Self::Device, Self::Pod, Self::DaemonSet];

    /// The `kind` discriminator used in documents.
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::Device => "IotDevice",
            Self::Pod => "IotPod",
            Self::DaemonSet => "IotDaemonSet",
        }
    }

    /// The REST plural used in resource paths.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Device => "iotdevices",
            Self::Pod => "iotpods",
            Self::DaemonSet => "iotdaemonsets",
        }
    }

    /// Look up a kind by its `kind` discriminator.
    #[must_use]
    pub fn from_kind(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.kind() == kind)
    }

    /// The `apiVersion` string for this kind within `group`.
    #[must_use]
    pub fn api_version(group: &str) -> String {
        format!("{group}/{IOT_VERSION}")
    }

    /// Type metadata for this kind within `group`.
    #[must_use]
    pub fn type_meta(self, group: &str) -> TypeMeta {
        TypeMeta {
            api_version: Self::api_version(group),
            kind: self.kind().to_string(),
        }
    }

    /// Dynamic API descriptor for this kind within `group`.
    #[must_use]
    pub fn api_resource(self, group: &str) -> ApiResource {
        let gvk = GroupVersionKind::gvk(group, IOT_VERSION, self.kind());
        ApiResource::from_gvk_with_plural(&gvk, self.plural())
    }
}

/// A physical or virtual device, scheduled like a cluster node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IotDevice {
    /// Kind and API version.
    #[serde(flatten)]
    pub types: TypeMeta,
    /// Object metadata; labels carry the `unschedulable` marker.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Capacity and taints, opaque to the addon.
    #[serde(default)]
    pub spec: NodeSpec,
    /// Conditions reported for the device.
    #[serde(default)]
    pub status: NodeStatus,
}

/// A list of devices.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IotDeviceList {
    /// Kind and API version.
    #[serde(flatten)]
    pub types: TypeMeta,
    /// List metadata.
    #[serde(default)]
    pub metadata: ListMeta,
    /// The devices.
    #[serde(default)]
    pub items: Vec<IotDevice>,
}

/// A workload unit bound to a device.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IotPod {
    /// Kind and API version.
    #[serde(flatten)]
    pub types: TypeMeta,
    /// Object metadata; labels carry the correlation labels.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Containers and policies.
    #[serde(default)]
    pub spec: PodSpec,
    /// Observed status.
    #[serde(default)]
    pub status: PodStatus,
}

/// A list of pods.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IotPodList {
    /// Kind and API version.
    #[serde(flatten)]
    pub types: TypeMeta,
    /// List metadata.
    #[serde(default)]
    pub metadata: ListMeta,
    /// The pods.
    #[serde(default)]
    pub items: Vec<IotPod>,
}

/// Daemon-set-like template: one pod per matching device.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IotDaemonSet {
    /// Kind and API version; the API version is stamped on created pods.
    #[serde(flatten)]
    pub types: TypeMeta,
    /// Object metadata; name and namespace are stamped on created pods.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Selection and pod template.
    #[serde(default)]
    pub spec: IotDaemonSetSpec,
}

/// Spec of an [`IotDaemonSet`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IotDaemonSetSpec {
    /// Devices this daemon set applies to. `None` selects every device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
    /// Template for the per-device pods.
    #[serde(default)]
    pub template: PodTemplateSpec,
}

/// A list of daemon sets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IotDaemonSetList {
    /// Kind and API version.
    #[serde(flatten)]
    pub types: TypeMeta,
    /// List metadata.
    #[serde(default)]
    pub metadata: ListMeta,
    /// The daemon sets.
    #[serde(default)]
    pub items: Vec<IotDaemonSet>,
}

/// Convenience accessors shared by the IoT kinds.
pub trait IotObject {
    /// Object metadata.
    fn meta(&self) -> &ObjectMeta;

    /// The object name, or `""` when unset.
    fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    /// The object namespace, or `""` when unset.
    fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    /// Look up a single label.
    fn label(&self, key: &str) -> Option<&str> {
        self.meta()
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }

    /// All labels (empty map when unset).
    fn labels(&self) -> BTreeMap<String, String> {
        self.meta().labels.clone().unwrap_or_default()
    }
}

impl IotObject for IotDevice {
    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl IotObject for IotPod {
    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl IotObject for IotDaemonSet {
    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }
}
