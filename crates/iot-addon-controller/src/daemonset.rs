//! Daemon set reconciler.
//!
//! A newly added daemon set is fanned out to every matching schedulable
//! device. Modifications and deletions are only logged; existing pods are
//! not updated or removed.

use std::sync::Arc;

use async_trait::async_trait;
use iot_addon_core::{labels, IotDaemonSet, IotObject, ResourceEvent};
use tracing::{debug, error, info, warn};

use crate::client::ClusterClient;
use crate::error::Result;
use crate::pod::PodCreator;
use crate::types::{EventOutcome, ReconcileSummary};
use crate::watch::EventHandler;

/// Creates per-device pods for newly observed daemon sets.
pub struct DaemonSetReconciler<C: ?Sized> {
    client: Arc<C>,
    creator: Arc<PodCreator<C>>,
}

impl<C: ClusterClient + ?Sized> DaemonSetReconciler<C> {
    /// Create a reconciler sharing `creator` with the device reconciler.
    pub fn new(creator: Arc<PodCreator<C>>) -> Self {
        Self {
            client: Arc::clone(creator.client()),
            creator,
        }
    }

    /// Create the missing pods of a daemon set.
    ///
    /// Devices marked unschedulable are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first listing or creation error.
    pub async fn fan_out(&self, daemon_set: &IotDaemonSet) -> Result<ReconcileSummary> {
        let devices = self.client.list_daemon_set_devices(daemon_set).await?;
        let mut summary = ReconcileSummary::default();

        for device in &devices {
            if labels::is_unschedulable(device) {
                debug!(
                    daemon_set = %daemon_set.name(),
                    device = %device.name(),
                    "Skipping unschedulable device"
                );
                continue;
            }
            match self.creator.ensure_pod(daemon_set, device).await? {
                Some(_) => summary.created += 1,
                None => summary.already_satisfied += 1,
            }
        }

        Ok(summary)
    }

    async fn handle_added(&self, daemon_set: &IotDaemonSet) {
        info!(
            daemon_set = %daemon_set.name(),
            namespace = %daemon_set.namespace(),
            "Daemon set added"
        );

        if let Err(e) = self.fan_out(daemon_set).await {
            error!(daemon_set = %daemon_set.name(), error = %e, "Failed to create daemon set pods");
        }

        match self.client.list_daemon_set_pods(daemon_set).await {
            Ok(pods) => info!(daemon_set = %daemon_set.name(), pods = pods.len(), "Daemon set pods"),
            Err(e) => warn!(daemon_set = %daemon_set.name(), error = %e, "Failed to list daemon set pods"),
        }
    }
}

#[async_trait]
impl<C: ClusterClient + ?Sized> EventHandler<IotDaemonSet> for DaemonSetReconciler<C> {
    async fn handle_event(&self, event: ResourceEvent<IotDaemonSet>) -> EventOutcome {
        match event {
            ResourceEvent::Added(ds) => {
                self.handle_added(&ds).await;
                EventOutcome::Continue
            }
            ResourceEvent::Modified(ds) => {
                info!(daemon_set = %ds.name(), namespace = %ds.namespace(), "Daemon set modified");
                EventOutcome::Continue
            }
            ResourceEvent::Deleted(ds) => {
                info!(daemon_set = %ds.name(), namespace = %ds.namespace(), "Daemon set deleted");
                EventOutcome::Continue
            }
            ResourceEvent::Error(message) => {
                warn!(error = %message, "Daemon set watch reported an error");
                EventOutcome::Terminate
            }
        }
    }
}
