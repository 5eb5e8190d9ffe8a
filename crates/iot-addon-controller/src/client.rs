//! The cluster operations the reconcilers depend on.
//!
//! Reconcilers only see the [`ClusterClient`] trait. Which daemon sets apply to
//! which devices is decided here, not in the reconcilers.

use async_trait::async_trait;
use futures::stream::BoxStream;
use iot_addon_core::{IotDaemonSet, IotDevice, IotPod, ResourceEvent};

use crate::error::Result;

/// A long-lived stream of typed change events.
///
/// Dropping the stream closes the underlying watch.
pub type EventStream<T> = BoxStream<'static, Result<ResourceEvent<T>>>;

/// List, create, delete and watch operations against the backing cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List the pods created for a device, in every namespace. Pods live in
    /// their daemon set's namespace, which need not be the device's.
    ///
    /// # Errors
    ///
    /// Returns an error if the pod listing fails.
    async fn list_device_pods(&self, device: &IotDevice) -> Result<Vec<IotPod>>;

    /// List the pods created by a daemon set, in the daemon set's namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the pod listing fails.
    async fn list_daemon_set_pods(&self, daemon_set: &IotDaemonSet) -> Result<Vec<IotPod>>;

    /// List the daemon sets, in any namespace, whose selector matches a device.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon set listing fails.
    async fn list_device_daemon_sets(&self, device: &IotDevice) -> Result<Vec<IotDaemonSet>>;

    /// List the devices, in any namespace, matched by a daemon set's selector.
    ///
    /// # Errors
    ///
    /// Returns an error if the device listing fails.
    async fn list_daemon_set_devices(&self, daemon_set: &IotDaemonSet) -> Result<Vec<IotDevice>>;

    /// Whether a pod carrying both correlation labels for this pair exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the pod listing fails.
    async fn is_pod_created(&self, daemon_set: &IotDaemonSet, device: &IotDevice) -> Result<bool>;

    /// Create a pod and return the stored object.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster rejects the pod.
    async fn create_pod(&self, pod: &IotPod) -> Result<IotPod>;

    /// Delete a pod. A pod that is already gone counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails.
    async fn delete_pod(&self, pod: &IotPod) -> Result<()>;

    /// Open a watch over all devices.
    ///
    /// Objects that already exist are delivered first as `Added`.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch cannot be opened.
    async fn watch_devices(&self) -> Result<EventStream<IotDevice>>;

    /// Open a watch over all daemon sets.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch cannot be opened.
    async fn watch_daemon_sets(&self) -> Result<EventStream<IotDaemonSet>>;
}

/// An in-memory cluster for testing without a real Kubernetes cluster.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::collections::{HashSet, VecDeque};

    use futures::{stream, StreamExt};
    use iot_addon_core::labels::{self, CREATED_BY, DEVICE_SELECTOR};
    use iot_addon_core::IotObject;
    use parking_lot::Mutex;

    use super::*;
    use crate::error::ControllerError;

    type Script<T> = Vec<Result<ResourceEvent<T>>>;

    /// A mock cluster that stores devices, daemon sets and pods in memory.
    ///
    /// Watches replay queued scripts: each `watch_*` call takes the next
    /// script, yields its items and then closes. Once the queue is empty a
    /// watch stays open without yielding anything.
    #[derive(Default)]
    pub struct MockClusterClient {
        state: Mutex<MockState>,
    }

    #[derive(Default)]
    struct MockState {
        devices: Vec<IotDevice>,
        daemon_sets: Vec<IotDaemonSet>,
        pods: Vec<IotPod>,
        device_scripts: VecDeque<Script<IotDevice>>,
        daemon_set_scripts: VecDeque<Script<IotDaemonSet>>,
        device_watches: usize,
        daemon_set_watches: usize,
        create_calls: usize,
        fail_creates: bool,
        fail_deletes: HashSet<String>,
    }

    impl MockClusterClient {
        /// Create an empty mock cluster.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Store a device.
        pub fn add_device(&self, device: IotDevice) {
            self.state.lock().devices.push(device);
        }

        /// Store a daemon set.
        pub fn add_daemon_set(&self, daemon_set: IotDaemonSet) {
            self.state.lock().daemon_sets.push(daemon_set);
        }

        /// Store a pod directly, bypassing `create_pod`.
        pub fn add_pod(&self, pod: IotPod) {
            self.state.lock().pods.push(pod);
        }

        /// All stored pods.
        #[must_use]
        pub fn pods(&self) -> Vec<IotPod> {
            self.state.lock().pods.clone()
        }

        /// Number of stored pods.
        #[must_use]
        pub fn pod_count(&self) -> usize {
            self.state.lock().pods.len()
        }

        /// Stored pods carrying both correlation labels for a pair.
        #[must_use]
        pub fn pair_pod_count(&self, daemon_set: &str, device: &str) -> usize {
            let created_by = labels::created_by_value(daemon_set);
            self.state
                .lock()
                .pods
                .iter()
                .filter(|pod| {
                    pod.label(CREATED_BY) == Some(created_by.as_str())
                        && pod.label(DEVICE_SELECTOR) == Some(device)
                })
                .count()
        }

        /// Number of `create_pod` calls, successful or not.
        #[must_use]
        pub fn create_calls(&self) -> usize {
            self.state.lock().create_calls
        }

        /// Number of device watches opened.
        #[must_use]
        pub fn device_watches(&self) -> usize {
            self.state.lock().device_watches
        }

        /// Number of daemon set watches opened.
        #[must_use]
        pub fn daemon_set_watches(&self) -> usize {
            self.state.lock().daemon_set_watches
        }

        /// Queue the items of the next device watch.
        pub fn push_device_script(&self, events: Vec<Result<ResourceEvent<IotDevice>>>) {
            self.state.lock().device_scripts.push_back(events);
        }

        /// Queue the items of the next daemon set watch.
        pub fn push_daemon_set_script(&self, events: Vec<Result<ResourceEvent<IotDaemonSet>>>) {
            self.state.lock().daemon_set_scripts.push_back(events);
        }

        /// Make every subsequent `create_pod` fail.
        pub fn fail_creates(&self, fail: bool) {
            self.state.lock().fail_creates = fail;
        }

        /// Make deleting the named pod fail.
        pub fn fail_delete(&self, pod_name: &str) {
            self.state.lock().fail_deletes.insert(pod_name.to_string());
        }

        fn namespace_matches(pod: &IotPod, namespace: &str) -> bool {
            namespace.is_empty() || pod.namespace() == namespace
        }
    }

    #[async_trait]
    impl ClusterClient for MockClusterClient {
        async fn list_device_pods(&self, device: &IotDevice) -> Result<Vec<IotPod>> {
            Ok(self
                .state
                .lock()
                .pods
                .iter()
                .filter(|pod| pod.label(DEVICE_SELECTOR) == Some(device.name()))
                .cloned()
                .collect())
        }

        async fn list_daemon_set_pods(&self, daemon_set: &IotDaemonSet) -> Result<Vec<IotPod>> {
            let created_by = labels::created_by_value(daemon_set.name());
            Ok(self
                .state
                .lock()
                .pods
                .iter()
                .filter(|pod| Self::namespace_matches(pod, daemon_set.namespace()))
                .filter(|pod| pod.label(CREATED_BY) == Some(created_by.as_str()))
                .cloned()
                .collect())
        }

        async fn list_device_daemon_sets(&self, device: &IotDevice) -> Result<Vec<IotDaemonSet>> {
            Ok(self
                .state
                .lock()
                .daemon_sets
                .iter()
                .filter(|ds| labels::daemon_set_matches_device(ds, device))
                .cloned()
                .collect())
        }

        async fn list_daemon_set_devices(&self, daemon_set: &IotDaemonSet) -> Result<Vec<IotDevice>> {
            Ok(self
                .state
                .lock()
                .devices
                .iter()
                .filter(|device| labels::daemon_set_matches_device(daemon_set, device))
                .cloned()
                .collect())
        }

        async fn is_pod_created(&self, daemon_set: &IotDaemonSet, device: &IotDevice) -> Result<bool> {
            let created_by = labels::created_by_value(daemon_set.name());
            Ok(self.state.lock().pods.iter().any(|pod| {
                Self::namespace_matches(pod, daemon_set.namespace())
                    && pod.label(CREATED_BY) == Some(created_by.as_str())
                    && pod.label(DEVICE_SELECTOR) == Some(device.name())
            }))
        }

        async fn create_pod(&self, pod: &IotPod) -> Result<IotPod> {
            // Yield so concurrent callers interleave like they would on a real API call.
            tokio::task::yield_now().await;

            let mut state = self.state.lock();
            state.create_calls += 1;
            if state.fail_creates {
                return Err(ControllerError::PodCreationFailed(pod.name().to_string()));
            }
            state.pods.push(pod.clone());
            Ok(pod.clone())
        }

        async fn delete_pod(&self, pod: &IotPod) -> Result<()> {
            let mut state = self.state.lock();
            if state.fail_deletes.contains(pod.name()) {
                return Err(ControllerError::PodDeletionFailed(pod.name().to_string()));
            }
            state
                .pods
                .retain(|p| !(p.name() == pod.name() && p.namespace() == pod.namespace()));
            Ok(())
        }

        async fn watch_devices(&self) -> Result<EventStream<IotDevice>> {
            let mut state = self.state.lock();
            state.device_watches += 1;
            Ok(match state.device_scripts.pop_front() {
                Some(events) => stream::iter(events).boxed(),
                None => stream::pending().boxed(),
            })
        }

        async fn watch_daemon_sets(&self) -> Result<EventStream<IotDaemonSet>> {
            let mut state = self.state.lock();
            state.daemon_set_watches += 1;
            Ok(match state.daemon_set_scripts.pop_front() {
                Some(events) => stream::iter(events).boxed(),
                None => stream::pending().boxed(),
            })
        }
    }
}
