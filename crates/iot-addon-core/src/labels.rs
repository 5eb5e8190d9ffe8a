//! Correlation labels and label-based selection.
//!
//! The `created-by` and `device-selector` labels are the only link between a
//! pod and the (daemon set, device) pair that produced it. Their keys are part
//! of the durable contract with already deployed resources and must not change.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

use crate::resources::{IotDaemonSet, IotDevice, IotKind, IotObject};

/// Label naming the daemon set that created a pod (`IotDaemonSet.<name>`).
pub const CREATED_BY: &str = "created-by";

/// Label naming the device a pod was created for.
pub const DEVICE_SELECTOR: &str = "device-selector";

/// Device label marking it as unschedulable (string-encoded boolean).
pub const UNSCHEDULABLE: &str = "unschedulable";

/// Parse a boolean the way the cluster tooling writes them.
///
/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Whether a device is marked unschedulable.
///
/// A missing label or one that does not parse counts as schedulable.
#[must_use]
pub fn is_unschedulable(device: &IotDevice) -> bool {
    device
        .label(UNSCHEDULABLE)
        .and_then(parse_bool)
        .unwrap_or(false)
}

/// Value of the `created-by` label for pods of a daemon set.
#[must_use]
pub fn created_by_value(daemon_set_name: &str) -> String {
    format!("{}.{daemon_set_name}", IotKind::DaemonSet.kind())
}

/// Both correlation labels for a (daemon set, device) pod.
#[must_use]
pub fn pod_labels(daemon_set_name: &str, device_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (CREATED_BY.to_string(), created_by_value(daemon_set_name)),
        (DEVICE_SELECTOR.to_string(), device_name.to_string()),
    ])
}

/// Label selector string matching every pod of a device.
#[must_use]
pub fn device_pods_selector(device_name: &str) -> String {
    format!("{DEVICE_SELECTOR}={device_name}")
}

/// Label selector string matching every pod of a daemon set.
#[must_use]
pub fn daemon_set_pods_selector(daemon_set_name: &str) -> String {
    format!("{CREATED_BY}={}", created_by_value(daemon_set_name))
}

/// Label selector string matching the pod of one (daemon set, device) pair.
#[must_use]
pub fn pair_selector(daemon_set_name: &str, device_name: &str) -> String {
    format!(
        "{},{}",
        daemon_set_pods_selector(daemon_set_name),
        device_pods_selector(device_name)
    )
}

/// Generate a unique pod name for a daemon set.
#[must_use]
pub fn generate_pod_name(daemon_set_name: &str) -> String {
    format!("{daemon_set_name}-{}", uuid::Uuid::new_v4())
}

/// Evaluate a label selector against a label set.
///
/// `None` and an empty selector both match everything. Unknown expression
/// operators never match.
#[must_use]
pub fn selector_matches(selector: Option<&LabelSelector>, labels: &BTreeMap<String, String>) -> bool {
    let Some(selector) = selector else {
        return true;
    };

    let labels_ok = selector
        .match_labels
        .iter()
        .flatten()
        .all(|(key, value)| labels.get(key) == Some(value));

    let expressions_ok = selector.match_expressions.iter().flatten().all(|expr| {
        let values = expr.values.as_deref().unwrap_or_default();
        let current = labels.get(&expr.key);
        match expr.operator.as_str() {
            "In" => current.is_some_and(|v| values.contains(v)),
            "NotIn" => current.is_none_or(|v| !values.contains(v)),
            "Exists" => current.is_some(),
            "DoesNotExist" => current.is_none(),
            _ => false,
        }
    });

    labels_ok && expressions_ok
}

/// Whether a daemon set applies to a device.
#[must_use]
pub fn daemon_set_matches_device(daemon_set: &IotDaemonSet, device: &IotDevice) -> bool {
    selector_matches(daemon_set.spec.selector.as_ref(), &device.labels())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelectorRequirement, ObjectMeta};

    fn device_with_label(value: Option<&str>) -> IotDevice {
        IotDevice {
            metadata: ObjectMeta {
                name: Some("dev-1".to_string()),
                labels: value.map(|v| BTreeMap::from([(UNSCHEDULABLE.to_string(), v.to_string())])),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn unschedulable_true_values() {
        for value in ["1", "t", "T", "TRUE", "true", "True"] {
            assert!(is_unschedulable(&device_with_label(Some(value))), "{value}");
        }
    }

    #[test]
    fn unschedulable_defaults_to_false() {
        assert!(!is_unschedulable(&device_with_label(None)));
        assert!(!is_unschedulable(&device_with_label(Some("false"))));
        assert!(!is_unschedulable(&device_with_label(Some("notabool"))));
        assert!(!is_unschedulable(&device_with_label(Some("yes"))));
        assert!(!is_unschedulable(&device_with_label(Some(""))));
    }

    #[test]
    fn correlation_labels() {
        let labels = pod_labels("agent", "dev-1");
        assert_eq!(labels.get(CREATED_BY).map(String::as_str), Some("IotDaemonSet.agent"));
        assert_eq!(labels.get(DEVICE_SELECTOR).map(String::as_str), Some("dev-1"));
        assert_eq!(
            pair_selector("agent", "dev-1"),
            "created-by=IotDaemonSet.agent,device-selector=dev-1"
        );
    }

    #[test]
    fn pod_names_are_unique() {
        let a = generate_pod_name("agent");
        let b = generate_pod_name("agent");
        assert!(a.starts_with("agent-"));
        assert_eq!(a.len(), "agent-".len() + 36);
        assert_ne!(a, b);
    }

    #[test]
    fn selector_match_labels() {
        let labels = BTreeMap::from([("zone".to_string(), "a".to_string())]);
        let selector = LabelSelector {
            match_labels: Some(BTreeMap::from([("zone".to_string(), "a".to_string())])),
            ..Default::default()
        };
        assert!(selector_matches(Some(&selector), &labels));
        assert!(selector_matches(None, &labels));
        assert!(selector_matches(Some(&LabelSelector::default()), &labels));
        assert!(!selector_matches(Some(&selector), &BTreeMap::new()));
    }

    #[test]
    fn selector_match_expressions() {
        let labels = BTreeMap::from([("zone".to_string(), "a".to_string())]);
        let expr = |operator: &str, values: Option<Vec<&str>>| LabelSelector {
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "zone".to_string(),
                operator: operator.to_string(),
                values: values.map(|v| v.into_iter().map(String::from).collect()),
            }]),
            ..Default::default()
        };

        assert!(selector_matches(Some(&expr("In", Some(vec!["a", "b"]))), &labels));
        assert!(!selector_matches(Some(&expr("NotIn", Some(vec!["a"]))), &labels));
        assert!(selector_matches(Some(&expr("Exists", None)), &labels));
        assert!(!selector_matches(Some(&expr("DoesNotExist", None)), &labels));
        assert!(!selector_matches(Some(&expr("Gt", None)), &labels));
    }
}
