//! Kubernetes-backed [`ClusterClient`].
//!
//! The IoT kinds are custom resources, so every call goes through
//! `Api<DynamicObject>` and each stored object is decoded through
//! [`UntypedDoc`]. An object that does not decode surfaces as a
//! [`TranslationError`](iot_addon_core::TranslationError) naming the bad field.

use async_trait::async_trait;
use futures::{future, StreamExt};
use iot_addon_core::labels::{self, daemon_set_matches_device};
use iot_addon_core::{
    untyped_from_dynamic, Document, IotDaemonSet, IotDevice, IotKind, IotObject, IotPod,
    ResourceEvent, UntypedDoc, WatchTranslator,
};
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::runtime::watcher::{watcher, Config as WatcherConfig};
use kube::Client;
use tracing::{debug, info, warn};

use crate::client::{ClusterClient, EventStream};
use crate::error::{ControllerError, Result};
use crate::types::ControllerConfig;

/// A [`ClusterClient`] talking to the Kubernetes API server.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    group: String,
}

impl KubeClusterClient {
    /// Create a client from the ambient kubeconfig or in-cluster config.
    ///
    /// # Errors
    ///
    /// Returns an error if the Kubernetes client cannot be created.
    pub async fn new(config: &ControllerConfig) -> Result<Self> {
        let client = Client::try_default().await?;
        info!(group = %config.iot_domain, "Created Kubernetes client");
        Ok(Self::with_client(client, config))
    }

    /// Create a client with a custom Kubernetes client (for testing).
    #[must_use]
    pub fn with_client(client: Client, config: &ControllerConfig) -> Self {
        Self {
            client,
            group: config.iot_domain.clone(),
        }
    }

    fn resource(&self, kind: IotKind) -> ApiResource {
        kind.api_resource(&self.group)
    }

    /// `Api` scoped to `namespace`, or cluster-wide when it is empty.
    fn api(&self, ar: &ApiResource, namespace: &str) -> Api<DynamicObject> {
        if namespace.is_empty() {
            Api::all_with(self.client.clone(), ar)
        } else {
            Api::namespaced_with(self.client.clone(), namespace, ar)
        }
    }

    async fn list<T: Document>(&self, kind: IotKind, namespace: &str, params: &ListParams) -> Result<Vec<T>> {
        let ar = self.resource(kind);
        let list = self.api(&ar, namespace).list(params).await?;
        list.items
            .into_iter()
            .map(|obj| decode_object(obj, &ar))
            .collect()
    }
}

/// Decode a stored object into its domain type.
fn decode_object<T: Document>(obj: DynamicObject, ar: &ApiResource) -> Result<T> {
    Ok(untyped_from_dynamic(obj, ar)?.decode::<T>()?)
}

/// Decode the document a translated watch event carries.
fn decode_event<T: Document>(item: iot_addon_core::Result<ResourceEvent<UntypedDoc>>) -> Result<ResourceEvent<T>> {
    Ok(item?.try_map(|doc| doc.decode::<T>())?)
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn list_device_pods(&self, device: &IotDevice) -> Result<Vec<IotPod>> {
        let params = ListParams::default().labels(&labels::device_pods_selector(device.name()));
        self.list(IotKind::Pod, "", &params).await
    }

    async fn list_daemon_set_pods(&self, daemon_set: &IotDaemonSet) -> Result<Vec<IotPod>> {
        let params = ListParams::default().labels(&labels::daemon_set_pods_selector(daemon_set.name()));
        self.list(IotKind::Pod, daemon_set.namespace(), &params).await
    }

    async fn list_device_daemon_sets(&self, device: &IotDevice) -> Result<Vec<IotDaemonSet>> {
        let daemon_sets: Vec<IotDaemonSet> =
            self.list(IotKind::DaemonSet, "", &ListParams::default()).await?;
        Ok(daemon_sets
            .into_iter()
            .filter(|ds| daemon_set_matches_device(ds, device))
            .collect())
    }

    async fn list_daemon_set_devices(&self, daemon_set: &IotDaemonSet) -> Result<Vec<IotDevice>> {
        let devices: Vec<IotDevice> = self.list(IotKind::Device, "", &ListParams::default()).await?;
        Ok(devices
            .into_iter()
            .filter(|device| daemon_set_matches_device(daemon_set, device))
            .collect())
    }

    async fn is_pod_created(&self, daemon_set: &IotDaemonSet, device: &IotDevice) -> Result<bool> {
        let ar = self.resource(IotKind::Pod);
        let params = ListParams::default()
            .labels(&labels::pair_selector(daemon_set.name(), device.name()))
            .limit(1);
        let list = self.api(&ar, daemon_set.namespace()).list(&params).await?;
        Ok(!list.items.is_empty())
    }

    async fn create_pod(&self, pod: &IotPod) -> Result<IotPod> {
        let ar = self.resource(IotKind::Pod);
        let obj: DynamicObject = serde_json::from_value(serde_json::to_value(pod)?)?;

        let created = self
            .api(&ar, pod.namespace())
            .create(&PostParams::default(), &obj)
            .await
            .map_err(|e| match e {
                kube::Error::Api(resp) => {
                    ControllerError::PodCreationFailed(format!("{}: {}", pod.name(), resp.message))
                }
                other => other.into(),
            })?;

        decode_object(created, &ar)
    }

    async fn delete_pod(&self, pod: &IotPod) -> Result<()> {
        let ar = self.resource(IotKind::Pod);

        match self
            .api(&ar, pod.namespace())
            .delete(pod.name(), &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                warn!(pod = %pod.name(), "Pod not found, already deleted");
                Ok(())
            }
            Err(kube::Error::Api(e)) => Err(ControllerError::PodDeletionFailed(format!(
                "{}: {}",
                pod.name(),
                e.message
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn watch_devices(&self) -> Result<EventStream<IotDevice>> {
        Ok(self.watch(IotKind::Device))
    }

    async fn watch_daemon_sets(&self) -> Result<EventStream<IotDaemonSet>> {
        Ok(self.watch(IotKind::DaemonSet))
    }
}

impl KubeClusterClient {
    /// Cluster-wide watch over one kind, starting with a full relist.
    fn watch<T: Document + Send + 'static>(&self, kind: IotKind) -> EventStream<T> {
        let ar = self.resource(kind);
        let api = self.api(&ar, "");
        debug!(kind = %ar.kind, "Opening watch");
        let mut translator = WatchTranslator::new(ar);

        watcher(api, WatcherConfig::default())
            .filter_map(move |event| future::ready(translator.translate(event).map(decode_event::<T>)))
            .boxed()
    }
}
