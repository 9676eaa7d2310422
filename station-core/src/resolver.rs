use std::sync::Arc;

use reqwest::Url;
use serde_json::Value;
use tracing::{debug, error};

use crate::{
    config::{PROP_API_KEY, PROP_CITY, PROP_CITY_ID, PROP_STATE, PluginConfig},
    endpoint,
    error::ConfigError,
    model::{Credential, Location},
    status::StatusReporter,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved {
        location: Location,
        credential: Option<Credential>,
    },
    Unresolved(String),
}

/// The active location, its credential and the endpoint built from them.
/// Replaced as a whole, never mutated.
#[derive(Debug, PartialEq)]
pub struct LocationSnapshot {
    pub location: Location,
    pub credential: Option<Credential>,
    pub endpoint: Url,
}

/// What applying a configuration did to the active snapshot.
#[derive(Debug)]
pub enum Change {
    Unchanged,
    /// A different location (or the first one) became active.
    LocationChanged(Arc<LocationSnapshot>),
    /// Same location, new credential.
    CredentialChanged(Arc<LocationSnapshot>),
    /// No location is configured any more.
    Cleared,
    /// Resolution raised an error; status is already Failed.
    Failed,
}

#[derive(Debug, Default)]
pub struct ConfigResolver {
    active: Option<Arc<LocationSnapshot>>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&Arc<LocationSnapshot>> {
        self.active.as_ref()
    }

    /// Validate a configuration mapping. `cityId` wins over `city`/`state`.
    pub fn resolve(config: &PluginConfig) -> Result<Resolution, ConfigError> {
        let credential = string_option(config, PROP_API_KEY)?.map(Credential::new);

        if let Some(city_id) = city_id_option(config)? {
            return Ok(Resolution::Resolved {
                location: city_id_location(&city_id)?,
                credential,
            });
        }

        let city = string_option(config, PROP_CITY)?;
        let state = string_option(config, PROP_STATE)?;

        match (city, state) {
            (Some(city), Some(state)) => Ok(Resolution::Resolved {
                location: Location::CityState { city, state },
                credential,
            }),
            (Some(_), None) => Ok(Resolution::Unresolved(format!(
                "'{PROP_STATE}' must be set together with '{PROP_CITY}'"
            ))),
            (None, Some(_)) => Ok(Resolution::Unresolved(format!(
                "'{PROP_CITY}' must be set together with '{PROP_STATE}'"
            ))),
            (None, None) => Ok(Resolution::Unresolved(format!(
                "no location configured; set '{PROP_CITY_ID}' or '{PROP_CITY}' and '{PROP_STATE}'"
            ))),
        }
    }

    /// Resolve `config` and swap the active snapshot if it differs by value.
    ///
    /// Sets NotConfigured/Failed status itself; moving to Running is left to
    /// the caller once the location's device exists.
    pub fn apply(&mut self, config: &PluginConfig, status: &mut StatusReporter) -> Change {
        let (location, credential) = match Self::resolve(config) {
            Ok(Resolution::Resolved {
                location,
                credential,
            }) => (location, credential),
            Ok(Resolution::Unresolved(reason)) => {
                self.active = None;
                status.not_configured(reason);
                return Change::Cleared;
            }
            Err(e) => {
                error!(error = %e, "error resolving configuration");
                status.failed(e.to_string());
                return Change::Failed;
            }
        };

        let same_location = match &self.active {
            Some(active) if active.location == location => {
                if active.credential == credential && status.is_running() {
                    debug!(%location, "configuration unchanged");
                    return Change::Unchanged;
                }
                status.is_running()
            }
            _ => false,
        };

        let endpoint = match endpoint::build(&location, credential.as_ref()) {
            Ok(uri) => uri,
            Err(e) => {
                error!(error = %e, %location, "error building endpoint");
                status.failed(e.to_string());
                return Change::Failed;
            }
        };

        let snapshot = Arc::new(LocationSnapshot {
            location,
            credential,
            endpoint,
        });
        self.active = Some(Arc::clone(&snapshot));

        if same_location {
            Change::CredentialChanged(snapshot)
        } else {
            Change::LocationChanged(snapshot)
        }
    }
}

/// Validate a city id supplied outside of configuration, e.g. by an explicit add.
pub fn city_id_location(city_id: &str) -> Result<Location, ConfigError> {
    let city_id = city_id.trim();
    if city_id.is_empty() || !city_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::InvalidCityId(city_id.to_owned()));
    }
    Ok(Location::CityId(city_id.to_owned()))
}

fn string_option(config: &PluginConfig, key: &'static str) -> Result<Option<String>, ConfigError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(non_blank(s)),
        Some(_) => Err(ConfigError::InvalidType {
            key,
            expected: "string",
        }),
    }
}

// City ids are numeric, so TOML files may carry them unquoted.
fn city_id_option(config: &PluginConfig) -> Result<Option<String>, ConfigError> {
    match config.get(PROP_CITY_ID) {
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::String(_)) | Some(Value::Null) | None => string_option(config, PROP_CITY_ID),
        Some(_) => Err(ConfigError::InvalidType {
            key: PROP_CITY_ID,
            expected: "string or number",
        }),
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PluginStatus;

    fn denver() -> PluginConfig {
        PluginConfig::new()
            .with(PROP_CITY, "Denver")
            .with(PROP_STATE, "CO")
    }

    #[test]
    fn resolves_city_id_with_key() {
        let cfg = PluginConfig::new()
            .with(PROP_CITY_ID, "5419384")
            .with(PROP_API_KEY, "abcd");

        assert_eq!(
            ConfigResolver::resolve(&cfg).unwrap(),
            Resolution::Resolved {
                location: Location::CityId("5419384".into()),
                credential: Some(Credential::new("abcd")),
            }
        );
    }

    #[test]
    fn numeric_city_id_is_accepted() {
        let mut cfg = PluginConfig::new();
        cfg.set_value(PROP_CITY_ID, Value::from(5419384));

        assert!(matches!(
            ConfigResolver::resolve(&cfg).unwrap(),
            Resolution::Resolved {
                location: Location::CityId(id),
                credential: None,
            } if id == "5419384"
        ));
    }

    #[test]
    fn resolves_city_state_without_key() {
        assert_eq!(
            ConfigResolver::resolve(&denver()).unwrap(),
            Resolution::Resolved {
                location: Location::CityState {
                    city: "Denver".into(),
                    state: "CO".into(),
                },
                credential: None,
            }
        );
    }

    #[test]
    fn city_id_takes_precedence_over_city_state() {
        let cfg = denver().with(PROP_CITY_ID, "5419384");

        assert!(matches!(
            ConfigResolver::resolve(&cfg).unwrap(),
            Resolution::Resolved {
                location: Location::CityId(_),
                ..
            }
        ));
    }

    #[test]
    fn missing_location_is_unresolved() {
        let cfg = PluginConfig::new().with(PROP_API_KEY, "abcd");

        let Resolution::Unresolved(reason) = ConfigResolver::resolve(&cfg).unwrap() else {
            panic!("expected unresolved");
        };
        assert!(reason.contains(PROP_CITY_ID));
    }

    #[test]
    fn half_a_city_state_pair_is_unresolved() {
        let cfg = PluginConfig::new().with(PROP_CITY, "Denver");

        let Resolution::Unresolved(reason) = ConfigResolver::resolve(&cfg).unwrap() else {
            panic!("expected unresolved");
        };
        assert!(reason.contains("'state'"));
    }

    #[test]
    fn blank_values_count_as_absent() {
        let cfg = PluginConfig::new()
            .with(PROP_CITY_ID, "  ")
            .with(PROP_API_KEY, "");
        assert!(matches!(ConfigResolver::resolve(&cfg).unwrap(), Resolution::Unresolved(_)));
    }

    #[test]
    fn wrong_types_are_errors() {
        let mut cfg = denver();
        cfg.set_value(PROP_API_KEY, Value::Bool(true));

        let err = ConfigResolver::resolve(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidType { key: "apiKey", .. }));
    }

    #[test]
    fn non_numeric_city_id_is_an_error() {
        let cfg = PluginConfig::new().with(PROP_CITY_ID, "Denver");
        assert!(matches!(ConfigResolver::resolve(&cfg), Err(ConfigError::InvalidCityId(_))));
    }

    #[test]
    fn apply_swaps_only_on_change() {
        let mut resolver = ConfigResolver::new();
        let mut status = StatusReporter::new();

        let Change::LocationChanged(first) = resolver.apply(&denver(), &mut status) else {
            panic!("expected location change");
        };
        status.running();

        assert!(matches!(resolver.apply(&denver(), &mut status), Change::Unchanged));
        assert!(Arc::ptr_eq(resolver.active().unwrap(), &first));

        let with_key = denver().with(PROP_API_KEY, "abcd");
        let Change::CredentialChanged(second) = resolver.apply(&with_key, &mut status) else {
            panic!("expected credential change");
        };
        assert_eq!(second.endpoint.query(), Some("q=Denver,CO&APPID=abcd"));
    }

    #[test]
    fn apply_unresolved_clears_and_sets_status() {
        let mut resolver = ConfigResolver::new();
        let mut status = StatusReporter::new();

        resolver.apply(&denver(), &mut status);
        assert!(matches!(resolver.apply(&PluginConfig::new(), &mut status), Change::Cleared));
        assert!(resolver.active().is_none());
        assert!(matches!(status.current(), PluginStatus::NotConfigured(_)));
    }

    #[test]
    fn apply_error_sets_failed() {
        let mut resolver = ConfigResolver::new();
        let mut status = StatusReporter::new();

        let cfg = PluginConfig::new().with(PROP_CITY_ID, "abc");
        assert!(matches!(resolver.apply(&cfg, &mut status), Change::Failed));
        assert!(matches!(status.current(), PluginStatus::Failed(_)));
    }

    #[test]
    fn same_config_after_failure_is_reapplied() {
        let mut resolver = ConfigResolver::new();
        let mut status = StatusReporter::new();

        resolver.apply(&denver(), &mut status);
        status.failed("registry unavailable");

        assert!(matches!(resolver.apply(&denver(), &mut status), Change::LocationChanged(_)));
    }
}
