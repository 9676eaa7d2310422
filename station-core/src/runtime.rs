//! Single-writer host for [`WeatherStationPlugin`].
//!
//! The plugin lives on one tokio task. Configuration updates, refresh ticks,
//! explicit adds and HTTP deliveries all reach it as messages, so no lock is
//! ever held while a request is in flight.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    config::PluginConfig,
    error::PluginError,
    plugin::{PluginLifecycle, WeatherStationPlugin},
    poller::spawn_refresh_timer,
    registry::DeviceRegistry,
    status::PluginStatus,
    transport::{Delivery, HttpFetch, SpawningTransport},
};

pub type HostedPlugin<R, F, C> = WeatherStationPlugin<R, SpawningTransport<F>, C>;

#[derive(Debug)]
enum PluginEvent {
    ConfigurationUpdate(PluginConfig),
    RefreshTick,
    AddLocation {
        city_id: String,
        reply: oneshot::Sender<Result<(), PluginError>>,
    },
    Status(oneshot::Sender<PluginStatus>),
    Shutdown,
}

/// Handle to a running plugin task.
#[derive(Debug)]
pub struct PluginHandle<R, F, C> {
    events: mpsc::UnboundedSender<PluginEvent>,
    task: JoinHandle<HostedPlugin<R, F, C>>,
    timer: JoinHandle<()>,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("plugin task is no longer running")]
    Stopped,

    #[error("plugin task panicked: {0}")]
    Panicked(#[from] tokio::task::JoinError),
}

/// Start the plugin on its own task, run `on_startup` with `config`, and tick
/// it every `refresh` from then on.
pub fn start<R, F, C>(
    registry: R,
    fetch: F,
    clock: C,
    config: PluginConfig,
    refresh: Duration,
) -> PluginHandle<R, F, C>
where
    R: DeviceRegistry + Send + 'static,
    F: HttpFetch + 'static,
    C: Clock + Send + 'static,
{
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (deliveries_tx, deliveries_rx) = mpsc::unbounded_channel();

    let transport = SpawningTransport::new(Arc::new(fetch), deliveries_tx);
    let plugin = WeatherStationPlugin::with_clock(registry, transport, clock);

    let task = tokio::spawn(run(plugin, config, events_rx, deliveries_rx));

    let ticks = events_tx.clone();
    let timer = spawn_refresh_timer(refresh, move || {
        ticks.send(PluginEvent::RefreshTick).is_ok()
    });

    PluginHandle {
        events: events_tx,
        task,
        timer,
    }
}

async fn run<R, F, C>(
    mut plugin: HostedPlugin<R, F, C>,
    config: PluginConfig,
    mut events: mpsc::UnboundedReceiver<PluginEvent>,
    mut deliveries: mpsc::UnboundedReceiver<Delivery>,
) -> HostedPlugin<R, F, C>
where
    R: DeviceRegistry,
    F: HttpFetch + 'static,
    C: Clock,
{
    plugin.on_startup(&config);
    info!(status = %plugin.status(), "plugin started");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(PluginEvent::ConfigurationUpdate(config)) => {
                    plugin.on_configuration_update(&config);
                }
                Some(PluginEvent::RefreshTick) => plugin.on_refresh_tick(),
                Some(PluginEvent::AddLocation { city_id, reply }) => {
                    let result = plugin.add_location(&city_id);
                    if let Err(e) = &result {
                        warn!(%city_id, error = %e, "could not add location");
                    }
                    let _ = reply.send(result);
                }
                Some(PluginEvent::Status(reply)) => {
                    let _ = reply.send(plugin.status().clone());
                }
                Some(PluginEvent::Shutdown) | None => break,
            },
            Some(delivery) = deliveries.recv() => {
                plugin.on_http_response(delivery.outcome, delivery.context);
            }
        }
    }

    plugin.on_shutdown();
    debug!("plugin task finished");
    plugin
}

impl<R, F, C> PluginHandle<R, F, C> {
    pub fn update_configuration(&self, config: PluginConfig) -> Result<(), RuntimeError> {
        self.send(PluginEvent::ConfigurationUpdate(config))
    }

    /// Forwarded from the "add station" UI path.
    pub async fn add_location(&self, city_id: impl Into<String>) -> Result<(), PluginError> {
        let (reply, rx) = oneshot::channel();
        let event = PluginEvent::AddLocation {
            city_id: city_id.into(),
            reply,
        };
        if self.send(event).is_err() {
            return Err(PluginError::ShutDown);
        }
        rx.await.unwrap_or(Err(PluginError::ShutDown))
    }

    pub async fn status(&self) -> Result<PluginStatus, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(PluginEvent::Status(reply))?;
        rx.await.map_err(|_| RuntimeError::Stopped)
    }

    /// Stop ticking, stop the plugin task and hand back the plugin. Responses
    /// still in flight are dropped when they arrive.
    pub async fn shutdown(self) -> Result<HostedPlugin<R, F, C>, RuntimeError> {
        self.timer.abort();
        let _ = self.events.send(PluginEvent::Shutdown);
        Ok(self.task.await?)
    }

    fn send(&self, event: PluginEvent) -> Result<(), RuntimeError> {
        self.events.send(event).map_err(|_| RuntimeError::Stopped)
    }
}
