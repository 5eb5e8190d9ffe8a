//! Runtime watcher output as untyped documents.
//!
//! Both the controller and the API server watch IoT kinds through
//! `Api<DynamicObject>`. This module turns what the runtime watcher yields
//! into [`ResourceEvent`]s over [`UntypedDoc`]s, so each side only decides
//! what to do with the document.

use std::collections::HashSet;

use kube::api::{ApiResource, DynamicObject};
use kube::core::TypeMeta;
use kube::runtime::watcher;

use crate::error::{Result, TranslationError};
use crate::event::ResourceEvent;
use crate::untyped::UntypedDoc;

/// Wrap a stored object as an untyped document.
///
/// List items and watched objects usually come back without `apiVersion`
/// and `kind`; those are filled in from `resource`.
///
/// # Errors
///
/// Returns `Malformed` if the object does not serialize to a JSON object.
pub fn untyped_from_dynamic(mut obj: DynamicObject, resource: &ApiResource) -> Result<UntypedDoc> {
    if obj.types.is_none() {
        obj.types = Some(TypeMeta {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
        });
    }
    let value = serde_json::to_value(&obj).map_err(|e| TranslationError::Malformed(e.to_string()))?;
    UntypedDoc::from_value(value)
}

/// Identity of an object across a watch: its uid, or `namespace/name`.
#[must_use]
pub fn object_key(obj: &DynamicObject) -> String {
    obj.metadata.uid.clone().unwrap_or_else(|| {
        format!(
            "{}/{}",
            obj.metadata.namespace.as_deref().unwrap_or_default(),
            obj.metadata.name.as_deref().unwrap_or_default()
        )
    })
}

/// Translates one watch stream's events.
///
/// The runtime watcher reports creations and updates alike as `Apply`. An
/// object not seen before on this stream is reported as `Added`, later
/// applies as `Modified`. A deletion forgets the object.
#[derive(Debug)]
pub struct WatchTranslator {
    resource: ApiResource,
    seen: HashSet<String>,
}

impl WatchTranslator {
    /// Start translating a stream over `resource`.
    #[must_use]
    pub fn new(resource: ApiResource) -> Self {
        Self {
            resource,
            seen: HashSet::new(),
        }
    }

    /// The watched resource.
    #[must_use]
    pub const fn resource(&self) -> &ApiResource {
        &self.resource
    }

    /// Translate one watcher item.
    ///
    /// Relist markers yield `None`. A watcher error becomes an
    /// [`ResourceEvent::Error`]; an object that cannot be wrapped becomes an
    /// `Err`.
    pub fn translate(
        &mut self,
        event: std::result::Result<watcher::Event<DynamicObject>, watcher::Error>,
    ) -> Option<Result<ResourceEvent<UntypedDoc>>> {
        match event {
            Ok(watcher::Event::Apply(obj) | watcher::Event::InitApply(obj)) => {
                let first_sight = self.seen.insert(object_key(&obj));
                Some(untyped_from_dynamic(obj, &self.resource).map(|doc| {
                    if first_sight {
                        ResourceEvent::Added(doc)
                    } else {
                        ResourceEvent::Modified(doc)
                    }
                }))
            }
            Ok(watcher::Event::Delete(obj)) => {
                self.seen.remove(&object_key(&obj));
                Some(untyped_from_dynamic(obj, &self.resource).map(ResourceEvent::Deleted))
            }
            Ok(watcher::Event::Init | watcher::Event::InitDone) => None,
            Err(e) => Some(Ok(ResourceEvent::Error(e.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::IotKind;
    use serde_json::json;

    const GROUP: &str = "iot.example.com";

    fn dynamic(value: serde_json::Value) -> DynamicObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn missing_type_meta_comes_from_the_resource() {
        let ar = IotKind::Device.api_resource(GROUP);
        let doc = untyped_from_dynamic(dynamic(json!({ "metadata": { "name": "dev-1" } })), &ar).unwrap();
        assert_eq!(doc.kind(), Some("IotDevice"));
        assert_eq!(doc.api_version(), Some("iot.example.com/v1"));
    }

    #[test]
    fn first_apply_is_added_then_modified() {
        let mut translator = WatchTranslator::new(IotKind::Device.api_resource(GROUP));
        let obj = dynamic(json!({ "metadata": { "name": "dev-1", "uid": "u-1" } }));

        let first = translator.translate(Ok(watcher::Event::InitApply(obj.clone())));
        let second = translator.translate(Ok(watcher::Event::Apply(obj.clone())));
        let deleted = translator.translate(Ok(watcher::Event::Delete(obj.clone())));
        let again = translator.translate(Ok(watcher::Event::Apply(obj)));

        assert!(matches!(first, Some(Ok(ResourceEvent::Added(_)))));
        assert!(matches!(second, Some(Ok(ResourceEvent::Modified(_)))));
        assert!(matches!(deleted, Some(Ok(ResourceEvent::Deleted(_)))));
        assert!(matches!(again, Some(Ok(ResourceEvent::Added(_)))));
    }

    #[test]
    fn same_name_in_two_namespaces_are_distinct_objects() {
        let mut translator = WatchTranslator::new(IotKind::Pod.api_resource(GROUP));
        let a = dynamic(json!({ "metadata": { "name": "agent", "namespace": "a" } }));
        let b = dynamic(json!({ "metadata": { "name": "agent", "namespace": "b" } }));

        assert!(matches!(translator.translate(Ok(watcher::Event::Apply(a))), Some(Ok(ResourceEvent::Added(_)))));
        assert!(matches!(translator.translate(Ok(watcher::Event::Apply(b))), Some(Ok(ResourceEvent::Added(_)))));
    }

    #[test]
    fn relist_markers_are_dropped() {
        let mut translator = WatchTranslator::new(IotKind::Device.api_resource(GROUP));
        assert!(translator.translate(Ok(watcher::Event::Init)).is_none());
        assert!(translator.translate(Ok(watcher::Event::InitDone)).is_none());
    }

    #[test]
    fn object_key_prefers_uid() {
        let with_uid = dynamic(json!({ "metadata": { "name": "dev-1", "namespace": "edge", "uid": "u-1" } }));
        let without_uid = dynamic(json!({ "metadata": { "name": "dev-1", "namespace": "edge" } }));
        assert_eq!(object_key(&with_uid), "u-1");
        assert_eq!(object_key(&without_uid), "edge/dev-1");
    }
}
