use crate::model::{LocationId, VariableKey};

/// Raised while resolving configuration. Surfaces only as plugin status.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration value '{key}' must be a {expected}")]
    InvalidType {
        key: &'static str,
        expected: &'static str,
    },

    #[error("city id '{0}' is not a numeric OpenWeatherMap city id")]
    InvalidCityId(String),

    #[error("could not build request URI: {0}")]
    Endpoint(String),

    #[error("device registry rejected the configured location: {0}")]
    Registry(#[from] RegistryError),
}

/// Outcome of a single poll that produced no reading. Logged, never fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PollError {
    #[error("no response from OpenWeatherMap: {0}")]
    Transport(String),

    #[error("OpenWeatherMap responded with HTTP {0}")]
    HttpStatus(u16),

    #[error("malformed OpenWeatherMap payload: {0}")]
    MalformedPayload(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("device '{0}' already exists")]
    DeviceExists(LocationId),

    #[error("device '{0}' is not registered")]
    UnknownDevice(LocationId),

    #[error("device '{0}' has already published its variables")]
    VariablesAlreadyPublished(LocationId),

    #[error("device '{device}' has no variable '{key}'")]
    UnknownVariable {
        device: LocationId,
        key: VariableKey,
    },
}

/// Errors returned by the framework-facing operations that have a caller.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("plugin has been shut down")]
    ShutDown,
}
