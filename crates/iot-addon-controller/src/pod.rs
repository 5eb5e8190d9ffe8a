//! Pod construction and per-pair creation.

use std::collections::HashMap;
use std::sync::Arc;

use iot_addon_core::{labels, IotDaemonSet, IotDevice, IotKind, IotObject, IotPod};
use k8s_openapi::api::core::v1::PodStatus;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use tracing::{debug, info};

use crate::client::ClusterClient;
use crate::error::Result;

/// Build the pod a daemon set runs on a device.
///
/// The pod takes its namespace and API version from the daemon set, gets a
/// fresh unique name, carries both correlation labels and copies the
/// template's pod spec.
#[must_use]
pub fn build_pod(daemon_set: &IotDaemonSet, device_name: &str) -> IotPod {
    let ds_name = daemon_set.name();

    IotPod {
        types: TypeMeta {
            api_version: daemon_set.types.api_version.clone(),
            kind: IotKind::Pod.kind().to_string(),
        },
        metadata: ObjectMeta {
            name: Some(labels::generate_pod_name(ds_name)),
            namespace: daemon_set.metadata.namespace.clone(),
            labels: Some(labels::pod_labels(ds_name, device_name)),
            ..Default::default()
        },
        spec: daemon_set.spec.template.spec.clone().unwrap_or_default(),
        status: PodStatus::default(),
    }
}

/// Creates the pod for a (daemon set, device) pair unless it already exists.
///
/// Both reconcilers share one creator. Calls for the same pair are
/// serialized so that the existence check and the create cannot interleave
/// with another event's check and create.
pub struct PodCreator<C: ?Sized> {
    client: Arc<C>,
    locks: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<C: ClusterClient + ?Sized> PodCreator<C> {
    /// Create a pod creator backed by `client`.
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// The backing client.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Create the pair's pod if none exists yet.
    ///
    /// Returns the created pod, or `None` when the pair was already satisfied.
    ///
    /// # Errors
    ///
    /// Returns an error if the existence check or the creation fails.
    pub async fn ensure_pod(&self, daemon_set: &IotDaemonSet, device: &IotDevice) -> Result<Option<IotPod>> {
        let key = pair_key(daemon_set, device);
        let lock = Arc::clone(self.locks.lock().entry(key.clone()).or_default());

        let result = {
            let _guard = lock.lock().await;
            self.create_if_missing(daemon_set, device).await
        };

        self.release(&key, lock);
        result
    }

    async fn create_if_missing(&self, daemon_set: &IotDaemonSet, device: &IotDevice) -> Result<Option<IotPod>> {
        if self.client.is_pod_created(daemon_set, device).await? {
            debug!(
                daemon_set = %daemon_set.name(),
                device = %device.name(),
                "Pod already exists, skipping creation"
            );
            return Ok(None);
        }

        let pod = build_pod(daemon_set, device.name());
        let created = self.client.create_pod(&pod).await?;

        info!(
            pod = %created.name(),
            namespace = %created.namespace(),
            daemon_set = %daemon_set.name(),
            device = %device.name(),
            "Created pod"
        );

        Ok(Some(created))
    }

    /// Drop the pair's lock entry once no other call holds or awaits it.
    fn release(&self, key: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock();
        drop(lock);
        if locks.get(key).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.lock().len()
    }
}

fn pair_key(daemon_set: &IotDaemonSet, device: &IotDevice) -> String {
    format!(
        "{}/{}/{}",
        daemon_set.namespace(),
        daemon_set.name(),
        device.name()
    )
}
