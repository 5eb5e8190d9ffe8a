//! Conversion between IoT kinds and generic kinds at the HTTP boundary.
//!
//! Upstream bodies carry `IotDevice`/`IotPod` documents (or lists of them);
//! clients see `Node`/`Pod`. Anything that is not one of those kinds passes
//! through untouched, including upstream `Status` errors.

use iot_addon_core::{
    DeviceTranslator, IotDevice, IotDeviceList, IotKind, IotPod, IotPodList, PodTranslator,
    Projection, ResourceEvent, Result, TranslationError, TypedDoc, UntypedDoc,
};
use k8s_openapi::api::core::v1::{Node, Pod};
use serde::Serialize;
use serde_json::{json, Value};

const DEVICE_LIST: &str = "IotDeviceList";
const POD_LIST: &str = "IotPodList";

/// Both translators, bound to one API group.
#[derive(Debug, Clone)]
pub struct Converter {
    group: String,
    devices: DeviceTranslator,
    pods: PodTranslator,
}

impl Converter {
    /// Create a converter for the IoT API `group`.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        let group = group.into();
        Self {
            devices: DeviceTranslator::new(group.clone()),
            pods: PodTranslator::new(group.clone()),
            group,
        }
    }

    /// The IoT API group.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Rewrite an upstream body for the client.
    ///
    /// Returns `None` when the body is not an IoT document and should be
    /// relayed as is.
    ///
    /// # Errors
    ///
    /// Returns a [`TranslationError`] if an IoT document fails to decode.
    pub fn outbound(&self, body: &[u8]) -> Result<Option<Vec<u8>>> {
        let Ok(doc) = UntypedDoc::from_json(body) else {
            return Ok(None);
        };

        if let Some(generic) = self.generic_object(&doc)? {
            return to_vec(&generic).map(Some);
        }

        let bytes = match doc.kind() {
            Some(DEVICE_LIST) => {
                let list = IotDeviceList {
                    types: doc.type_meta(),
                    metadata: doc.section_or_default("metadata")?,
                    items: doc.decode_items::<IotDevice>()?,
                };
                to_vec(&self.devices.to_node_list(&list))?
            }
            Some(POD_LIST) => {
                let list = IotPodList {
                    types: doc.type_meta(),
                    metadata: doc.section_or_default("metadata")?,
                    items: doc.decode_items::<IotPod>()?,
                };
                to_vec(&self.pods.to_pod_list(&list))?
            }
            _ => return Ok(None),
        };
        Ok(Some(bytes))
    }

    /// The generic form of a device or pod document.
    ///
    /// Returns `None` for daemon sets and non-IoT kinds, which clients see
    /// as stored.
    fn generic_object(&self, doc: &UntypedDoc) -> Result<Option<Value>> {
        match doc.kind().and_then(IotKind::from_kind) {
            Some(IotKind::Device | IotKind::Pod) => {}
            Some(IotKind::DaemonSet) | None => return Ok(None),
        }

        match doc.classify()? {
            TypedDoc::Device(device) => to_value(&self.devices.device_to_node(&device)).map(Some),
            TypedDoc::Pod(pod) => to_value(&self.pods.pod_to_generic(&pod)).map(Some),
            TypedDoc::DaemonSet(_) => Ok(None),
        }
    }

    /// Rewrite a client body for the backing server.
    ///
    /// `Node` bodies become `IotDevice` documents and `Pod` bodies become
    /// `IotPod` documents. Empty bodies, patches and other kinds return `None`.
    ///
    /// # Errors
    ///
    /// Returns a [`TranslationError`] if a `Node` or `Pod` body is invalid.
    pub fn inbound(&self, body: &[u8]) -> Result<Option<Vec<u8>>> {
        if body.is_empty() {
            return Ok(None);
        }
        let doc = UntypedDoc::from_json(body)?;

        let domain = match doc.kind() {
            Some("Node") => {
                let node: Node = decode_generic(doc)?;
                self.devices.to_untyped(&node)?
            }
            Some("Pod") => {
                let pod: Pod = decode_generic(doc)?;
                self.pods.to_untyped(&pod)?
            }
            _ => return Ok(None),
        };
        domain.to_vec().map(Some)
    }

    /// Encode one watch event as a newline-terminated frame.
    ///
    /// Error events become a `Status` object, as the cluster API does.
    ///
    /// # Errors
    ///
    /// Returns a [`TranslationError`] if the carried document fails to decode.
    pub fn watch_frame(&self, event: &ResourceEvent<UntypedDoc>) -> Result<Vec<u8>> {
        let object = match event {
            ResourceEvent::Error(message) => json!({
                "kind": "Status",
                "apiVersion": "v1",
                "status": "Failure",
                "message": message,
            }),
            ResourceEvent::Added(doc) | ResourceEvent::Modified(doc) | ResourceEvent::Deleted(doc) => {
                self.generic_object(doc)?
                    .unwrap_or_else(|| doc.clone().into_value())
            }
        };

        let frame = json!({ "type": event.kind().to_string(), "object": object });
        let mut bytes = to_vec(&frame)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

fn decode_generic<T: serde::de::DeserializeOwned>(doc: UntypedDoc) -> Result<T> {
    serde_json::from_value(doc.into_value()).map_err(|e| TranslationError::Malformed(e.to_string()))
}

fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| TranslationError::Malformed(e.to_string()))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| TranslationError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP: &str = "iot.example.com";

    fn parse(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn device_becomes_node() {
        let body = json!({
            "apiVersion": "iot.example.com/v1",
            "kind": "IotDevice",
            "metadata": { "name": "dev-1", "namespace": "edge" },
            "spec": { "unschedulable": true }
        });
        let out = Converter::new(GROUP)
            .outbound(&serde_json::to_vec(&body).unwrap())
            .unwrap()
            .unwrap();
        let node = parse(&out);

        assert_eq!(node["kind"], "Node");
        assert_eq!(node["apiVersion"], "v1");
        assert_eq!(node["metadata"]["name"], "dev-1");
        assert!(node["metadata"].get("namespace").is_none());
        assert_eq!(node["spec"]["unschedulable"], true);
    }

    #[test]
    fn device_list_becomes_node_list() {
        let body = json!({
            "apiVersion": "iot.example.com/v1",
            "kind": "IotDeviceList",
            "metadata": { "resourceVersion": "42" },
            "items": [
                { "metadata": { "name": "dev-1" } },
                { "metadata": { "name": "dev-2" } }
            ]
        });
        let out = Converter::new(GROUP)
            .outbound(&serde_json::to_vec(&body).unwrap())
            .unwrap()
            .unwrap();
        let list = parse(&out);

        assert_eq!(list["kind"], "NodeList");
        assert_eq!(list["metadata"]["resourceVersion"], "42");
        assert_eq!(list["items"][1]["metadata"]["name"], "dev-2");
    }

    #[test]
    fn pod_list_applies_defaults() {
        let body = json!({
            "apiVersion": "iot.example.com/v1",
            "kind": "IotPodList",
            "items": [{ "metadata": { "name": "p-1", "namespace": "edge" } }]
        });
        let out = Converter::new(GROUP)
            .outbound(&serde_json::to_vec(&body).unwrap())
            .unwrap()
            .unwrap();
        let list = parse(&out);

        assert_eq!(list["kind"], "PodList");
        assert_eq!(list["items"][0]["metadata"]["namespace"], "edge");
        assert_eq!(list["items"][0]["spec"]["restartPolicy"], "Always");
    }

    #[test]
    fn bad_list_item_is_named() {
        let body = json!({
            "apiVersion": "iot.example.com/v1",
            "kind": "IotDeviceList",
            "items": [{ "metadata": { "name": "ok" } }, { "metadata": { "name": 7 } }]
        });
        let err = Converter::new(GROUP)
            .outbound(&serde_json::to_vec(&body).unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("items[1].metadata"), "{err}");
    }

    #[test]
    fn bad_pod_field_is_named_by_full_path() {
        let body = json!({
            "apiVersion": "iot.example.com/v1",
            "kind": "IotPod",
            "metadata": { "name": "p-1", "namespace": "edge" },
            "spec": { "containers": [{ "name": 42 }] }
        });
        let err = Converter::new(GROUP)
            .outbound(&serde_json::to_vec(&body).unwrap())
            .unwrap_err();
        assert_eq!(err.path(), Some("spec.containers[0].name"));
    }

    #[test]
    fn daemon_sets_are_not_converted() {
        let body = json!({
            "apiVersion": "iot.example.com/v1",
            "kind": "IotDaemonSet",
            "metadata": { "name": "agent", "namespace": "edge" }
        });
        let converter = Converter::new(GROUP);
        assert!(converter.outbound(&serde_json::to_vec(&body).unwrap()).unwrap().is_none());

        let doc = UntypedDoc::from_value(body).unwrap();
        let frame = parse(&converter.watch_frame(&ResourceEvent::Added(doc)).unwrap());
        assert_eq!(frame["object"]["kind"], "IotDaemonSet");
    }

    #[test]
    fn other_bodies_pass_through() {
        let converter = Converter::new(GROUP);
        let status = br#"{"kind":"Status","apiVersion":"v1","status":"Failure","code":404}"#;
        assert!(converter.outbound(status).unwrap().is_none());
        assert!(converter.outbound(b"not json").unwrap().is_none());
        assert!(converter.inbound(b"").unwrap().is_none());
        assert!(converter.inbound(br#"{"metadata":{"labels":{"a":"b"}}}"#).unwrap().is_none());
    }

    #[test]
    fn node_body_becomes_device() {
        let body = br#"{"apiVersion":"v1","kind":"Node","metadata":{"name":"dev-1"}}"#;
        let out = Converter::new(GROUP).inbound(body).unwrap().unwrap();
        let device = parse(&out);

        assert_eq!(device["kind"], "IotDevice");
        assert_eq!(device["apiVersion"], "iot.example.com/v1");
        assert_eq!(device["metadata"]["name"], "dev-1");
    }

    #[test]
    fn invalid_pod_body_is_rejected() {
        let body = br#"{"apiVersion":"v1","kind":"Pod","metadata":{"name":["x"]}}"#;
        assert!(Converter::new(GROUP).inbound(body).is_err());
        assert!(Converter::new(GROUP).inbound(b"[1,2]").is_err());
    }

    #[test]
    fn watch_frames_are_newline_delimited() {
        let converter = Converter::new(GROUP);
        let doc = UntypedDoc::from_value(json!({
            "apiVersion": "iot.example.com/v1",
            "kind": "IotPod",
            "metadata": { "name": "p-1", "namespace": "edge" }
        }))
        .unwrap();

        let frame = converter.watch_frame(&ResourceEvent::Modified(doc)).unwrap();
        assert_eq!(frame.last(), Some(&b'\n'));
        let value = parse(&frame);
        assert_eq!(value["type"], "MODIFIED");
        assert_eq!(value["object"]["kind"], "Pod");

        let frame = converter
            .watch_frame(&ResourceEvent::Error("too old".into()))
            .unwrap();
        let value = parse(&frame);
        assert_eq!(value["type"], "ERROR");
        assert_eq!(value["object"]["message"], "too old");
    }
}
