//! Device reconciler.
//!
//! Every `Added` or `Modified` device event re-derives what should exist for
//! that device from the device itself and the current pod listing:
//!
//! - an unschedulable device has all of its pods deleted
//! - a schedulable device gets one pod per matching daemon set that does not
//!   have one yet
//!
//! Device deletion triggers no pod cleanup.

use std::sync::Arc;

use async_trait::async_trait;
use iot_addon_core::{labels, IotDevice, IotObject, ResourceEvent};
use tracing::{debug, error, info, warn};

use crate::client::ClusterClient;
use crate::error::Result;
use crate::pod::PodCreator;
use crate::types::{EventOutcome, ReconcileSummary};
use crate::watch::EventHandler;

/// Reconciles the pods of a device against its `unschedulable` label.
pub struct DeviceReconciler<C: ?Sized> {
    client: Arc<C>,
    creator: Arc<PodCreator<C>>,
}

impl<C: ClusterClient + ?Sized> DeviceReconciler<C> {
    /// Create a reconciler sharing `creator` with the daemon set reconciler.
    pub fn new(creator: Arc<PodCreator<C>>) -> Self {
        Self {
            client: Arc::clone(creator.client()),
            creator,
        }
    }

    /// Bring the pods of one device in line with its current labels.
    ///
    /// # Errors
    ///
    /// Returns the first listing, creation or deletion error. Pods handled
    /// before the failure stay handled.
    pub async fn reconcile(&self, device: &IotDevice) -> Result<ReconcileSummary> {
        if labels::is_unschedulable(device) {
            self.remove_pods(device).await
        } else {
            self.ensure_pods(device).await
        }
    }

    async fn remove_pods(&self, device: &IotDevice) -> Result<ReconcileSummary> {
        info!(device = %device.name(), "Deleting pods for unschedulable device");

        let pods = self.client.list_device_pods(device).await?;
        let mut summary = ReconcileSummary::default();

        for pod in &pods {
            self.client.delete_pod(pod).await?;
            summary.deleted += 1;
            info!(pod = %pod.name(), device = %device.name(), "Deleted pod");
        }

        Ok(summary)
    }

    async fn ensure_pods(&self, device: &IotDevice) -> Result<ReconcileSummary> {
        let daemon_sets = self.client.list_device_daemon_sets(device).await?;
        let mut summary = ReconcileSummary::default();

        for ds in &daemon_sets {
            match self.creator.ensure_pod(ds, device).await? {
                Some(_) => summary.created += 1,
                None => summary.already_satisfied += 1,
            }
        }

        debug!(
            device = %device.name(),
            daemon_sets = daemon_sets.len(),
            created = summary.created,
            "Device reconciled"
        );

        Ok(summary)
    }
}

#[async_trait]
impl<C: ClusterClient + ?Sized> EventHandler<IotDevice> for DeviceReconciler<C> {
    async fn handle_event(&self, event: ResourceEvent<IotDevice>) -> EventOutcome {
        match event {
            ResourceEvent::Added(device) | ResourceEvent::Modified(device) => {
                info!(device = %device.name(), "Device added or modified");
                if let Err(e) = self.reconcile(&device).await {
                    error!(device = %device.name(), error = %e, "Failed to reconcile device");
                }
                EventOutcome::Continue
            }
            ResourceEvent::Deleted(device) => {
                debug!(device = %device.name(), "Device deleted");
                EventOutcome::Continue
            }
            ResourceEvent::Error(message) => {
                warn!(error = %message, "Device watch reported an error");
                EventOutcome::Terminate
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use iot_addon_core::labels::{DEVICE_SELECTOR, UNSCHEDULABLE};
    use iot_addon_core::{IotDaemonSet, IotDaemonSetSpec, IotKind, IotPod};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

    use super::*;
    use crate::client::mock::MockClusterClient;

    fn device(name: &str, unschedulable: Option<&str>) -> IotDevice {
        let mut labels = BTreeMap::from([("zone".to_string(), "a".to_string())]);
        if let Some(value) = unschedulable {
            labels.insert(UNSCHEDULABLE.to_string(), value.to_string());
        }
        IotDevice {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("edge".to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn daemon_set(name: &str, zone: &str) -> IotDaemonSet {
        IotDaemonSet {
            types: IotKind::DaemonSet.type_meta("iot.example.com"),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("edge".to_string()),
                ..Default::default()
            },
            spec: IotDaemonSetSpec {
                selector: Some(LabelSelector {
                    match_labels: Some(BTreeMap::from([("zone".to_string(), zone.to_string())])),
                    ..Default::default()
                }),
                ..Default::default()
            },
        }
    }

    fn device_pod(name: &str, device: &str) -> IotPod {
        IotPod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("edge".to_string()),
                labels: Some(BTreeMap::from([(DEVICE_SELECTOR.to_string(), device.to_string())])),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn reconciler(client: &Arc<MockClusterClient>) -> DeviceReconciler<MockClusterClient> {
        DeviceReconciler::new(Arc::new(PodCreator::new(Arc::clone(client))))
    }

    #[tokio::test]
    async fn unschedulable_device_loses_only_its_pods() {
        let client = Arc::new(MockClusterClient::new());
        client.add_pod(device_pod("p1", "dev-1"));
        client.add_pod(device_pod("p2", "dev-1"));
        client.add_pod(device_pod("p3", "dev-2"));

        let summary = reconciler(&client)
            .reconcile(&device("dev-1", Some("true")))
            .await
            .unwrap();

        assert_eq!(summary.deleted, 2);
        let remaining = client.pods();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].label(DEVICE_SELECTOR), Some("dev-2"));
    }

    #[tokio::test]
    async fn pods_in_the_daemon_set_namespace_are_drained() {
        let client = Arc::new(MockClusterClient::new());
        let mut ds = daemon_set("agent", "a");
        ds.metadata.namespace = Some("workloads".to_string());
        client.add_daemon_set(ds);
        let reconciler = reconciler(&client);

        let mut dev = device("dev-1", None);
        dev.metadata.namespace = Some("devices".to_string());
        reconciler.handle_event(ResourceEvent::Added(dev.clone())).await;
        assert_eq!(client.pods()[0].namespace(), "workloads");

        dev.metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(UNSCHEDULABLE.to_string(), "true".to_string());
        let summary = reconciler.reconcile(&dev).await.unwrap();

        assert_eq!(summary.deleted, 1);
        assert_eq!(client.pod_count(), 0);
    }

    #[tokio::test]
    async fn malformed_unschedulable_label_takes_schedulable_path() {
        let client = Arc::new(MockClusterClient::new());
        client.add_daemon_set(daemon_set("agent", "a"));
        client.add_pod(device_pod("p1", "dev-1"));

        let summary = reconciler(&client)
            .reconcile(&device("dev-1", Some("notabool")))
            .await
            .unwrap();

        assert_eq!(summary.deleted, 0);
        assert_eq!(summary.created, 1);
        assert_eq!(client.pair_pod_count("agent", "dev-1"), 1);
        assert_eq!(client.pod_count(), 2);
    }

    #[tokio::test]
    async fn one_pod_per_matching_daemon_set() {
        let client = Arc::new(MockClusterClient::new());
        client.add_daemon_set(daemon_set("t1", "a"));
        client.add_daemon_set(daemon_set("t2", "a"));
        client.add_daemon_set(daemon_set("other-zone", "b"));
        let reconciler = reconciler(&client);
        let dev = device("dev-1", None);

        let outcome = reconciler.handle_event(ResourceEvent::Added(dev.clone())).await;
        assert_eq!(outcome, EventOutcome::Continue);
        reconciler.handle_event(ResourceEvent::Modified(dev)).await;

        assert_eq!(client.pair_pod_count("t1", "dev-1"), 1);
        assert_eq!(client.pair_pod_count("t2", "dev-1"), 1);
        assert_eq!(client.pair_pod_count("other-zone", "dev-1"), 0);
        assert_eq!(client.pod_count(), 2);
    }

    #[tokio::test]
    async fn delete_failure_stops_the_pass() {
        let client = Arc::new(MockClusterClient::new());
        client.add_pod(device_pod("p1", "dev-1"));
        client.fail_delete("p1");

        let result = reconciler(&client).reconcile(&device("dev-1", Some("1"))).await;
        assert!(result.is_err());
        assert_eq!(client.pod_count(), 1);
    }

    #[tokio::test]
    async fn reconcile_failure_does_not_stop_the_stream() {
        let client = Arc::new(MockClusterClient::new());
        client.add_pod(device_pod("p1", "dev-1"));
        client.fail_delete("p1");

        let outcome = reconciler(&client)
            .handle_event(ResourceEvent::Added(device("dev-1", Some("true"))))
            .await;
        assert_eq!(outcome, EventOutcome::Continue);
    }

    #[tokio::test]
    async fn deleted_device_keeps_its_pods() {
        let client = Arc::new(MockClusterClient::new());
        client.add_pod(device_pod("p1", "dev-1"));

        let outcome = reconciler(&client)
            .handle_event(ResourceEvent::Deleted(device("dev-1", Some("true"))))
            .await;
        assert_eq!(outcome, EventOutcome::Continue);
        assert_eq!(client.pod_count(), 1);
    }

    #[tokio::test]
    async fn error_event_terminates() {
        let client = Arc::new(MockClusterClient::new());
        let outcome = reconciler(&client)
            .handle_event(ResourceEvent::Error("too old resource version".into()))
            .await;
        assert_eq!(outcome, EventOutcome::Terminate);
    }
}
