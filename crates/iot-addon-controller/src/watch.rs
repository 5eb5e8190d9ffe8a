//! Watch supervision.
//!
//! Each watched kind gets one sequential consumer. A consumer reads its
//! stream until the stream ends or reports an error, then reopens it with
//! exponential backoff. A fresh watch replays the current objects as
//! `Added`, so nothing missed while disconnected is lost.
//!
//! ```text
//!            ┌──────────────┐   events   ┌─────────────────────┐
//!  devices ─▶│ watch loop   │───────────▶│ DeviceReconciler    │──┐
//!            └──────────────┘            └─────────────────────┘  │   ┌─────────────┐
//!                                                                 ├──▶│ PodCreator  │──▶ cluster
//!            ┌──────────────┐   events   ┌─────────────────────┐  │   └─────────────┘
//! daemon   ─▶│ watch loop   │───────────▶│ DaemonSetReconciler │──┘
//!  sets      └──────────────┘            └─────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::StreamExt;
use iot_addon_core::{IotDaemonSet, IotDevice, ResourceEvent};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::{ClusterClient, EventStream};
use crate::daemonset::DaemonSetReconciler;
use crate::device::DeviceReconciler;
use crate::error::{ControllerError, Result};
use crate::pod::PodCreator;
use crate::retry::{Backoff, RetryConfig};
use crate::types::EventOutcome;

/// Consumes the events of one watched kind.
#[async_trait]
pub trait EventHandler<T: Send + 'static>: Send + Sync {
    /// Handle one event and decide whether to keep reading.
    async fn handle_event(&self, event: ResourceEvent<T>) -> EventOutcome;
}

/// A kind that can be watched through a [`ClusterClient`].
pub trait WatchTarget: Sized + Send + 'static {
    /// Name used in logs.
    const NAME: &'static str;

    /// Open a fresh watch for this kind.
    fn open<C: ClusterClient + ?Sized>(client: &C) -> BoxFuture<'_, Result<EventStream<Self>>>;
}

impl WatchTarget for IotDevice {
    const NAME: &'static str = "iotdevices";

    fn open<C: ClusterClient + ?Sized>(client: &C) -> BoxFuture<'_, Result<EventStream<Self>>> {
        client.watch_devices()
    }
}

impl WatchTarget for IotDaemonSet {
    const NAME: &'static str = "iotdaemonsets";

    fn open<C: ClusterClient + ?Sized>(client: &C) -> BoxFuture<'_, Result<EventStream<Self>>> {
        client.watch_daemon_sets()
    }
}

/// Feed a kind's events to `handler` until cancelled.
///
/// # Errors
///
/// Returns [`ControllerError::StreamTerminated`] once `retry.max_attempts`
/// consecutive reconnects have failed without delivering an event.
pub async fn run_watch_loop<T, C, H>(
    client: &C,
    handler: &H,
    retry: &RetryConfig,
    cancel: &CancellationToken,
) -> Result<()>
where
    T: WatchTarget,
    C: ClusterClient + ?Sized,
    H: EventHandler<T> + ?Sized,
{
    let mut backoff = retry.backoff();

    loop {
        let reason = tokio::select! {
            () = cancel.cancelled() => {
                info!(watch = T::NAME, "Watch cancelled");
                return Ok(());
            }
            reason = consume_stream::<T, C, H>(client, handler, &mut backoff) => reason,
        };

        let Some(delay) = backoff.next_delay() else {
            error!(
                watch = T::NAME,
                attempts = backoff.attempts(),
                reason = %reason,
                "Watch stream could not be reopened"
            );
            return Err(ControllerError::StreamTerminated(format!("{}: {reason}", T::NAME)));
        };

        warn!(
            watch = T::NAME,
            reason = %reason,
            attempt = backoff.attempts(),
            delay_ms = delay.as_millis(),
            "Watch stream terminated, reconnecting"
        );

        tokio::select! {
            () = cancel.cancelled() => {
                info!(watch = T::NAME, "Watch cancelled");
                return Ok(());
            }
            () = tokio::time::sleep(delay) => {}
        }
    }
}

/// Read one stream to its end and return why it ended.
async fn consume_stream<T, C, H>(client: &C, handler: &H, backoff: &mut Backoff) -> String
where
    T: WatchTarget,
    C: ClusterClient + ?Sized,
    H: EventHandler<T> + ?Sized,
{
    let mut stream = match T::open(client).await {
        Ok(stream) => stream,
        Err(e) => return format!("failed to open watch: {e}"),
    };
    info!(watch = T::NAME, "Watch stream opened");

    while let Some(item) = stream.next().await {
        let event = match item {
            Ok(event) => event,
            Err(ControllerError::Translation(e)) => {
                warn!(watch = T::NAME, error = %e, "Skipping undecodable object");
                continue;
            }
            Err(e) => return e.to_string(),
        };

        let kind = event.kind();
        let message = match &event {
            ResourceEvent::Error(message) => Some(message.clone()),
            _ => None,
        };
        debug!(watch = T::NAME, event = %kind, "Received event");

        match handler.handle_event(event).await {
            EventOutcome::Continue => backoff.reset(),
            EventOutcome::Terminate => {
                return message.unwrap_or_else(|| format!("handler stopped on {kind} event"));
            }
        }
    }

    "stream closed".to_string()
}

/// Runs the device and daemon set consumers side by side.
pub struct Controller<C: ?Sized> {
    client: Arc<C>,
    devices: Arc<DeviceReconciler<C>>,
    daemon_sets: Arc<DaemonSetReconciler<C>>,
    retry: RetryConfig,
}

impl<C: ClusterClient + ?Sized + 'static> Controller<C> {
    /// Wire both reconcilers to `client`.
    pub fn new(client: Arc<C>, retry: RetryConfig) -> Self {
        let creator = Arc::new(PodCreator::new(Arc::clone(&client)));
        Self {
            client,
            devices: Arc::new(DeviceReconciler::new(Arc::clone(&creator))),
            daemon_sets: Arc::new(DaemonSetReconciler::new(creator)),
            retry,
        }
    }

    /// Run both consumers until `cancel` fires or one of them gives up.
    ///
    /// A consumer that gives up cancels the other one.
    ///
    /// # Errors
    ///
    /// Returns the first consumer error.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut tasks = JoinSet::new();

        {
            let client = Arc::clone(&self.client);
            let handler = Arc::clone(&self.devices);
            let retry = self.retry.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                run_watch_loop::<IotDevice, _, _>(client.as_ref(), handler.as_ref(), &retry, &cancel).await
            });
        }
        {
            let client = Arc::clone(&self.client);
            let handler = Arc::clone(&self.daemon_sets);
            let retry = self.retry.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                run_watch_loop::<IotDaemonSet, _, _>(client.as_ref(), handler.as_ref(), &retry, &cancel)
                    .await
            });
        }

        info!("Started device and daemon set consumers");

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(ControllerError::TaskFailed(e.to_string())));
            if let Err(e) = result {
                error!(error = %e, "Consumer stopped");
                cancel.cancel();
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
