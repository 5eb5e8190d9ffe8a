//! Resource Translator: IoT kinds to and from generic cluster kinds.
//!
//! - `IotDevice` <-> `Node`: structural copy, namespace cleared on the way to
//!   a Node (nodes are cluster scoped) and not inferred on the way back.
//! - `IotPod` <-> `Pod`: structural copy; the generic direction applies the
//!   write-time defaults the node agents expect. The defaults are idempotent.
//!
//! The untyped path goes through the domain form: `to_untyped` marshals the
//! domain object for a generic one, `from_untyped` decodes the domain object
//! and projects it back to the generic kind.

use k8s_openapi::api::core::v1::{Node, Pod, PodSpec, PodStatus};
use k8s_openapi::List;

type NodeList = List<Node>;
type PodList = List<Pod>;
use serde::Serialize;

use crate::error::{Result, TranslationError};
use crate::event::ResourceEvent;
use crate::resources::{IotDevice, IotDeviceList, IotKind, IotPod, IotPodList, DEFAULT_IOT_DOMAIN};
use crate::untyped::{Document, UntypedDoc};

/// Image pull policy forced on every container of a generic pod.
pub const PULL_POLICY_ALWAYS: &str = "Always";
/// Restart policy of a generic pod.
pub const RESTART_POLICY_ALWAYS: &str = "Always";
/// DNS policy of a generic pod.
pub const DNS_POLICY_CLUSTER_FIRST: &str = "ClusterFirst";
/// Initial phase of a generic pod.
pub const PHASE_PENDING: &str = "Pending";
/// QoS class of a generic pod.
pub const QOS_BEST_EFFORT: &str = "BestEffort";

/// A bidirectional mapping between a domain kind and a generic kind.
pub trait Projection {
    /// The IoT kind.
    type Domain: Document;
    /// The generic cluster kind.
    type Generic: Serialize;

    /// Project a domain object onto the generic kind.
    fn to_generic(&self, domain: &Self::Domain) -> Self::Generic;

    /// Project a generic object back onto the domain kind.
    fn to_domain(&self, generic: &Self::Generic) -> Self::Domain;

    /// Marshal the domain form of a generic object into an untyped document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_untyped(&self, generic: &Self::Generic) -> Result<UntypedDoc> {
        UntypedDoc::encode(&self.to_domain(generic))
    }

    /// Decode a domain document and project it onto the generic kind.
    ///
    /// # Errors
    ///
    /// Returns a [`TranslationError`] naming the offending field.
    fn from_untyped(&self, doc: &UntypedDoc) -> Result<Self::Generic> {
        let domain = doc.decode::<Self::Domain>()?;
        Ok(self.to_generic(&domain))
    }

    /// Decode a domain document and return the generic form as JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`TranslationError`] if decoding or serialization fails.
    fn to_bytes(&self, doc: &UntypedDoc) -> Result<Vec<u8>> {
        let generic = self.from_untyped(doc)?;
        serde_json::to_vec(&generic).map_err(|e| TranslationError::Malformed(e.to_string()))
    }

    /// Rewrite a domain watch event into a generic one.
    fn transform_event(&self, event: ResourceEvent<Self::Domain>) -> ResourceEvent<Self::Generic> {
        event.map(|domain| self.to_generic(&domain))
    }
}

/// Translator between `IotDevice` and `Node`.
#[derive(Debug, Clone)]
pub struct DeviceTranslator {
    group: String,
}

impl DeviceTranslator {
    /// Create a translator stamping devices with `group`.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self { group: group.into() }
    }

    /// Project a device onto a Node, clearing the namespace.
    #[must_use]
    pub fn device_to_node(&self, device: &IotDevice) -> Node {
        let mut metadata = device.metadata.clone();
        metadata.namespace = None;

        Node {
            metadata,
            spec: Some(device.spec.clone()),
            status: Some(device.status.clone()),
        }
    }

    /// Project a Node back onto a device. No namespace is inferred.
    #[must_use]
    pub fn node_to_device(&self, node: &Node) -> IotDevice {
        IotDevice {
            types: IotKind::Device.type_meta(&self.group),
            metadata: node.metadata.clone(),
            spec: node.spec.clone().unwrap_or_default(),
            status: node.status.clone().unwrap_or_default(),
        }
    }

    /// Project a device list onto a Node list.
    #[must_use]
    pub fn to_node_list(&self, devices: &IotDeviceList) -> NodeList {
        NodeList {
            metadata: devices.metadata.clone(),
            items: devices.items.iter().map(|d| self.device_to_node(d)).collect(),
        }
    }
}

impl Default for DeviceTranslator {
    fn default() -> Self {
        Self::new(DEFAULT_IOT_DOMAIN)
    }
}

impl Projection for DeviceTranslator {
    type Domain = IotDevice;
    type Generic = Node;

    fn to_generic(&self, domain: &IotDevice) -> Node {
        self.device_to_node(domain)
    }

    fn to_domain(&self, generic: &Node) -> IotDevice {
        self.node_to_device(generic)
    }
}

/// Translator between `IotPod` and `Pod`.
#[derive(Debug, Clone)]
pub struct PodTranslator {
    group: String,
}

impl PodTranslator {
    /// Create a translator stamping pods with `group`.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self { group: group.into() }
    }

    /// Project a domain pod onto a generic pod, applying write-time defaults.
    #[must_use]
    pub fn pod_to_generic(&self, pod: &IotPod) -> Pod {
        let mut spec = pod.spec.clone();
        let mut status = pod.status.clone();
        apply_pod_defaults(&mut spec, &mut status);

        Pod {
            metadata: pod.metadata.clone(),
            spec: Some(spec),
            status: Some(status),
        }
    }

    /// Project a generic pod back onto a domain pod, without defaulting.
    #[must_use]
    pub fn generic_to_pod(&self, pod: &Pod) -> IotPod {
        IotPod {
            types: IotKind::Pod.type_meta(&self.group),
            metadata: pod.metadata.clone(),
            spec: pod.spec.clone().unwrap_or_default(),
            status: pod.status.clone().unwrap_or_default(),
        }
    }

    /// Project a domain pod list onto a generic pod list.
    #[must_use]
    pub fn to_pod_list(&self, pods: &IotPodList) -> PodList {
        PodList {
            metadata: pods.metadata.clone(),
            items: pods.items.iter().map(|p| self.pod_to_generic(p)).collect(),
        }
    }
}

impl Default for PodTranslator {
    fn default() -> Self {
        Self::new(DEFAULT_IOT_DOMAIN)
    }
}

impl Projection for PodTranslator {
    type Domain = IotPod;
    type Generic = Pod;

    fn to_generic(&self, domain: &IotPod) -> Pod {
        self.pod_to_generic(domain)
    }

    fn to_domain(&self, generic: &Pod) -> IotPod {
        self.generic_to_pod(generic)
    }
}

/// Apply the generic pod write-time defaults in place.
pub fn apply_pod_defaults(spec: &mut PodSpec, status: &mut PodStatus) {
    for container in &mut spec.containers {
        container.image_pull_policy = Some(PULL_POLICY_ALWAYS.to_string());
    }
    spec.restart_policy = Some(RESTART_POLICY_ALWAYS.to_string());
    spec.dns_policy = Some(DNS_POLICY_CLUSTER_FIRST.to_string());

    status.phase = Some(PHASE_PENDING.to_string());
    status.qos_class = Some(QOS_BEST_EFFORT.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, NodeCondition, NodeSpec, NodeStatus, Taint};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    const GROUP: &str = "iot.example.com";

    fn device(namespace: Option<&str>) -> IotDevice {
        IotDevice {
            types: IotKind::Device.type_meta(GROUP),
            metadata: ObjectMeta {
                name: Some("dev-1".to_string()),
                namespace: namespace.map(String::from),
                labels: Some(BTreeMap::from([("zone".to_string(), "a".to_string())])),
                ..Default::default()
            },
            spec: NodeSpec {
                taints: Some(vec![Taint {
                    key: "iot".to_string(),
                    effect: "NoSchedule".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            status: NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: "True".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            },
        }
    }

    fn pod() -> IotPod {
        IotPod {
            types: IotKind::Pod.type_meta(GROUP),
            metadata: ObjectMeta {
                name: Some("agent-1".to_string()),
                namespace: Some("edge".to_string()),
                ..Default::default()
            },
            spec: PodSpec {
                containers: vec![
                    Container {
                        name: "a".to_string(),
                        image: Some("busybox".to_string()),
                        image_pull_policy: Some("IfNotPresent".to_string()),
                        ..Default::default()
                    },
                    Container {
                        name: "b".to_string(),
                        ..Default::default()
                    },
                ],
                restart_policy: Some("Never".to_string()),
                ..Default::default()
            },
            status: PodStatus::default(),
        }
    }

    #[test]
    fn device_to_node_clears_namespace() {
        let translator = DeviceTranslator::new(GROUP);
        let node = translator.device_to_node(&device(Some("edge")));

        assert_eq!(node.metadata.namespace, None);
        assert_eq!(node.metadata.name.as_deref(), Some("dev-1"));
        assert_eq!(node.spec, Some(device(None).spec));
        assert_eq!(node.status, Some(device(None).status));
    }

    #[test]
    fn device_round_trip_drops_only_namespace() {
        let translator = DeviceTranslator::new(GROUP);
        let original = device(Some("edge"));

        let back = translator.node_to_device(&translator.device_to_node(&original));
        assert_eq!(back, device(None));

        let clean = device(None);
        assert_eq!(translator.node_to_device(&translator.device_to_node(&clean)), clean);
    }

    #[test]
    fn pod_to_generic_applies_defaults() {
        let generic = PodTranslator::new(GROUP).pod_to_generic(&pod());
        let spec = generic.spec.unwrap();
        let status = generic.status.unwrap();

        assert!(spec
            .containers
            .iter()
            .all(|c| c.image_pull_policy.as_deref() == Some(PULL_POLICY_ALWAYS)));
        assert_eq!(spec.restart_policy.as_deref(), Some(RESTART_POLICY_ALWAYS));
        assert_eq!(spec.dns_policy.as_deref(), Some(DNS_POLICY_CLUSTER_FIRST));
        assert_eq!(status.phase.as_deref(), Some(PHASE_PENDING));
        assert_eq!(status.qos_class.as_deref(), Some(QOS_BEST_EFFORT));
    }

    #[test]
    fn pod_round_trip_is_fixed_point() {
        let translator = PodTranslator::new(GROUP);
        let once = translator.generic_to_pod(&translator.pod_to_generic(&pod()));
        let twice = translator.generic_to_pod(&translator.pod_to_generic(&once));

        assert_eq!(once, twice);
        assert_eq!(once.metadata, pod().metadata);
        assert_eq!(once.spec.containers[0].image, Some("busybox".to_string()));
        assert_eq!(
            translator.pod_to_generic(&once),
            translator.pod_to_generic(&pod())
        );
    }

    #[test]
    fn generic_to_pod_does_not_default() {
        let translator = PodTranslator::new(GROUP);
        let generic = Pod {
            metadata: ObjectMeta {
                name: Some("p".to_string()),
                ..Default::default()
            },
            spec: None,
            status: None,
        };
        let domain = translator.generic_to_pod(&generic);
        assert_eq!(domain.spec.restart_policy, None);
        assert_eq!(domain.status.phase, None);
        assert_eq!(domain.types.kind, "IotPod");
        assert_eq!(domain.types.api_version, "iot.example.com/v1");
    }

    #[test]
    fn untyped_device_round_trip() {
        let translator = DeviceTranslator::new(GROUP);
        let node = translator.device_to_node(&device(None));

        let doc = translator.to_untyped(&node).unwrap();
        assert_eq!(doc.kind(), Some("IotDevice"));
        assert_eq!(doc.api_version(), Some("iot.example.com/v1"));
        assert_eq!(translator.from_untyped(&doc).unwrap(), node);
    }

    #[test]
    fn untyped_pod_round_trip_modulo_defaults() {
        let translator = PodTranslator::new(GROUP);
        let generic = Pod {
            metadata: pod().metadata,
            spec: Some(pod().spec),
            status: Some(PodStatus::default()),
        };

        let doc = translator.to_untyped(&generic).unwrap();
        let back = translator.from_untyped(&doc).unwrap();
        assert_eq!(back, translator.pod_to_generic(&pod()));

        let again = translator.from_untyped(&translator.to_untyped(&back).unwrap()).unwrap();
        assert_eq!(again, back);
    }

    #[test]
    fn to_bytes_emits_generic_kind() {
        let translator = DeviceTranslator::new(GROUP);
        let doc = UntypedDoc::encode(&device(Some("edge"))).unwrap();

        let bytes = translator.to_bytes(&doc).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["kind"], "Node");
        assert_eq!(value["apiVersion"], "v1");
        assert!(value["metadata"].get("namespace").is_none());
    }

    #[test]
    fn from_untyped_propagates_errors() {
        let translator = PodTranslator::new(GROUP);
        let doc = UntypedDoc::from_value(serde_json::json!({
            "apiVersion": "iot.example.com/v1",
            "kind": "IotPod",
            "metadata": {}
        }))
        .unwrap();

        let err = translator.from_untyped(&doc).unwrap_err();
        assert_eq!(err.path(), Some("metadata.name"));
    }

    #[test]
    fn lists_and_events() {
        let translator = DeviceTranslator::new(GROUP);
        let list = IotDeviceList {
            items: vec![device(Some("a")), device(Some("b"))],
            ..Default::default()
        };
        let nodes = translator.to_node_list(&list);
        assert_eq!(nodes.items.len(), 2);
        assert!(nodes.items.iter().all(|n| n.metadata.namespace.is_none()));

        let event = translator.transform_event(ResourceEvent::Modified(device(Some("a"))));
        assert!(matches!(event, ResourceEvent::Modified(node) if node.metadata.namespace.is_none()));

        let pods = PodTranslator::new(GROUP).to_pod_list(&IotPodList {
            items: vec![pod()],
            ..Default::default()
        });
        assert_eq!(pods.items[0].spec.as_ref().unwrap().dns_policy.as_deref(), Some("ClusterFirst"));
    }
}
