use std::time::Duration;

use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, error};

use crate::{
    endpoint,
    error::ConfigError,
    model::{Credential, Location},
    resolver::LocationSnapshot,
    transport::Transport,
};

/// Fixed refresh cadence.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Issues weather requests through a [`Transport`].
#[derive(Debug)]
pub struct Poller<T> {
    transport: T,
}

impl<T: Transport> Poller<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submit one GET for `location`, tagged with its id.
    pub fn request(
        &self,
        location: &Location,
        credential: Option<&Credential>,
    ) -> Result<(), ConfigError> {
        let uri = endpoint::build(location, credential)?;
        debug!(location = %location.id(), %uri, "requesting OpenWeatherMap data");
        self.transport.send_get(uri, location.id());
        Ok(())
    }

    /// Submit one GET for the active location on the endpoint its snapshot
    /// already carries.
    pub fn request_active(&self, snapshot: &LocationSnapshot) {
        let id = snapshot.location.id();
        debug!(location = %id, uri = %snapshot.endpoint, "requesting OpenWeatherMap data");
        self.transport.send_get(snapshot.endpoint.clone(), id);
    }

    /// One request per location. A location whose endpoint cannot be built is
    /// logged and skipped. Returns the number of requests submitted.
    pub fn refresh_all<'a>(
        &self,
        locations: impl IntoIterator<Item = &'a Location>,
        credential: Option<&Credential>,
    ) -> usize {
        let mut sent = 0;
        for location in locations {
            match self.request(location, credential) {
                Ok(()) => sent += 1,
                Err(e) => error!(error = %e, %location, "error requesting OpenWeatherMap data"),
            }
        }
        sent
    }
}

/// Call `tick` every `period`, starting one period from now, until it
/// returns `false`. Late ticks are delayed rather than bunched up.
pub fn spawn_refresh_timer<F>(period: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if !tick() {
                debug!("refresh timer stopped");
                break;
            }
        }
    })
}
