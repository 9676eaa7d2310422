use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, error, info, trace, warn};

use crate::{
    clock::{Clock, SystemClock},
    config::PluginConfig,
    error::{ConfigError, PluginError},
    model::{CorrelationId, Credential, DEFAULT_DEVICE_NAME, Device, Location, LocationId},
    parser::{self, HttpOutcome},
    poller::Poller,
    reconciler,
    registry::DeviceRegistry,
    resolver::{self, Change, ConfigResolver, LocationSnapshot},
    status::{PluginStatus, StatusReporter},
    transport::Transport,
};

/// Contract the hosting framework drives.
pub trait PluginLifecycle {
    fn on_startup(&mut self, config: &PluginConfig);
    fn on_configuration_update(&mut self, config: &PluginConfig);
    fn on_refresh_tick(&mut self);
    fn on_http_response(&mut self, outcome: HttpOutcome, context: CorrelationId);
    /// Register a location by OpenWeatherMap city id and fetch it immediately.
    /// The device is created when the first reading arrives.
    fn add_location(&mut self, city_id: &str) -> Result<(), PluginError>;
    fn on_shutdown(&mut self);
    fn status(&self) -> &PluginStatus;
}

/// OpenWeatherMap station plugin.
///
/// Not thread-safe by itself: every call must come from a single owner, such
/// as the task started by [`crate::runtime::start`].
#[derive(Debug)]
pub struct WeatherStationPlugin<R, T, C = SystemClock> {
    registry: R,
    poller: Poller<T>,
    clock: C,
    status: StatusReporter,
    resolver: ConfigResolver,
    /// Locations that have a published device.
    devices: BTreeMap<LocationId, Location>,
    /// Locations added explicitly whose first response hasn't arrived yet.
    pending: BTreeMap<LocationId, Location>,
    startup_completed: bool,
    shut_down: bool,
}

impl<R, T> WeatherStationPlugin<R, T, SystemClock>
where
    R: DeviceRegistry,
    T: Transport,
{
    pub fn new(registry: R, transport: T) -> Self {
        Self::with_clock(registry, transport, SystemClock)
    }
}

impl<R, T, C> WeatherStationPlugin<R, T, C>
where
    R: DeviceRegistry,
    T: Transport,
    C: Clock,
{
    pub fn with_clock(registry: R, transport: T, clock: C) -> Self {
        Self {
            registry,
            poller: Poller::new(transport),
            clock,
            status: StatusReporter::new(),
            resolver: ConfigResolver::new(),
            devices: BTreeMap::new(),
            pending: BTreeMap::new(),
            startup_completed: false,
            shut_down: false,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        self.poller.transport()
    }

    pub fn active_location(&self) -> Option<&Arc<LocationSnapshot>> {
        self.resolver.active()
    }

    fn credential(&self) -> Option<&Credential> {
        self.resolver.active().and_then(|s| s.credential.as_ref())
    }

    fn apply_configuration(&mut self, config: &PluginConfig) {
        match self.resolver.apply(config, &mut self.status) {
            Change::Unchanged | Change::Cleared | Change::Failed => {}
            Change::CredentialChanged(snapshot) => {
                debug!(location = %snapshot.location, "credential updated");
            }
            Change::LocationChanged(snapshot) => {
                if let Err(e) = self.activate(&snapshot) {
                    error!(error = %e, location = %snapshot.location, "error activating location");
                    self.status.failed(e.to_string());
                }
            }
        }
    }

    fn activate(&mut self, snapshot: &LocationSnapshot) -> Result<(), ConfigError> {
        let first_startup = !self.startup_completed;
        if first_startup {
            for device in self.registry.published_devices() {
                debug!(location = %device.location_id, name = %device.name, "restoring device");
                self.devices.insert(device.location_id, device.location);
            }
            self.startup_completed = true;
        }

        let id = snapshot.location.id();
        if !self.devices.contains_key(&id) {
            let device = Device::new(snapshot.location.clone(), DEFAULT_DEVICE_NAME);
            reconciler::publish_device(&mut self.registry, device, None, self.clock.now())?;
            self.devices.insert(id, snapshot.location.clone());
        }

        self.status.running();

        if first_startup {
            let sent = self.refresh_known(snapshot);
            debug!(devices = sent, "initial refresh requested");
        } else {
            self.poller.request_active(snapshot);
        }
        Ok(())
    }

    /// Poll every known device. The active location goes out on the endpoint
    /// already built for it; the rest are built with its credential.
    fn refresh_known(&self, active: &LocationSnapshot) -> usize {
        let active_id = active.location.id();
        self.poller.request_active(active);

        let others = self
            .devices
            .iter()
            .filter(|(id, _)| **id != active_id)
            .map(|(_, location)| location);
        1 + self.poller.refresh_all(others, active.credential.as_ref())
    }

    fn reconcile(&mut self, id: CorrelationId, parsed: parser::ParsedResponse) {
        let now = self.clock.now();

        if self.devices.contains_key(&id) {
            let applied = reconciler::apply_reading(&mut self.registry, &id, &parsed.reading, now);
            if let Err(e) = applied {
                error!(location = %id, error = %e, "error updating device variables");
            }
            return;
        }

        let Some(location) = self.pending.remove(&id) else {
            warn!(location = %id, "received response for unknown location; discarding");
            return;
        };

        trace!(location = %id, "publishing new device");
        let name = parsed.name.unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string());
        let device = Device::new(location.clone(), name);
        match reconciler::publish_device(&mut self.registry, device, Some(&parsed.reading), now) {
            Ok(()) => {
                self.devices.insert(id, location);
            }
            Err(e) => {
                error!(location = %id, error = %e, "error publishing device");
                self.pending.insert(id, location);
            }
        }
    }
}

impl<R, T, C> PluginLifecycle for WeatherStationPlugin<R, T, C>
where
    R: DeviceRegistry,
    T: Transport,
    C: Clock,
{
    fn on_startup(&mut self, config: &PluginConfig) {
        debug!("starting OpenWeatherMap plugin");
        self.apply_configuration(config);
    }

    fn on_configuration_update(&mut self, config: &PluginConfig) {
        if self.shut_down {
            debug!("ignoring configuration update after shutdown");
            return;
        }
        debug!("configuration has changed");
        self.apply_configuration(config);
    }

    fn on_refresh_tick(&mut self) {
        if self.shut_down || !self.status.is_running() {
            trace!(status = %self.status.current(), "skipping refresh");
            return;
        }

        if let Some(active) = self.resolver.active() {
            let sent = self.refresh_known(active);
            debug!(devices = sent, "refresh requested");
        }
    }

    fn on_http_response(&mut self, outcome: HttpOutcome, context: CorrelationId) {
        if self.shut_down {
            info!(location = %context, "discarding response delivered after shutdown");
            return;
        }
        trace!(location = %context, "received HTTP response");

        match parser::parse(&outcome) {
            Ok(parsed) => self.reconcile(context, parsed),
            Err(e) => {
                error!(
                    location = %context,
                    error = %e,
                    "error retrieving data from OpenWeatherMap"
                );
            }
        }
    }

    fn add_location(&mut self, city_id: &str) -> Result<(), PluginError> {
        if self.shut_down {
            return Err(PluginError::ShutDown);
        }

        let location = resolver::city_id_location(city_id)?;
        let id = location.id();
        self.poller.request(&location, self.credential())?;

        if !self.devices.contains_key(&id) {
            info!(location = %id, "adding location");
            self.pending.insert(id, location);
        }
        Ok(())
    }

    fn on_shutdown(&mut self) {
        debug!("OpenWeatherMap plugin shutting down");
        self.shut_down = true;
    }

    fn status(&self) -> &PluginStatus {
        self.status.current()
    }
}
