//! Core library for the OpenWeatherMap weather station plugin.
//!
//! This crate defines:
//! - Configuration resolution and the endpoint it yields
//! - Polling, response parsing and device-state reconciliation
//! - Seams for the host framework (device registry, HTTP transport, clock)
//! - A tokio runtime that owns the plugin as a single writer
//!
//! It is used by `weather-station-cli`, but the [`PluginLifecycle`] contract
//! can be driven by any host.

pub mod clock;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod model;
pub mod parser;
pub mod plugin;
pub mod poller;
pub mod reconciler;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod status;
pub mod transport;

#[cfg(test)]
mod testing;

pub use clock::{Clock, SystemClock};
pub use config::PluginConfig;
pub use error::{ConfigError, PluginError, PollError, RegistryError};
pub use model::{
    CorrelationId, Credential, Device, Location, LocationId, VariableKey, VariableUpdates,
    WeatherReading,
};
pub use parser::HttpOutcome;
pub use plugin::{PluginLifecycle, WeatherStationPlugin};
pub use poller::REFRESH_INTERVAL;
pub use registry::{DeviceRegistry, InMemoryRegistry};
pub use status::PluginStatus;
pub use transport::{HttpFetch, ReqwestFetch, Transport};
