use chrono::{DateTime, Utc};
use std::fmt;

/// Name given to a device when the first response carries no `name`.
pub const DEFAULT_DEVICE_NAME: &str = "OpenWeatherMap Station";

/// A weather-query target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// OpenWeatherMap numeric city id.
    CityId(String),
    /// Free-text city and state (or country) pair.
    CityState { city: String, state: String },
}

impl Location {
    /// Identifier used for the device and as the correlation token of requests.
    ///
    /// City and state are percent-encoded before joining, so a comma inside
    /// either one cannot make two locations share an id.
    pub fn id(&self) -> LocationId {
        match self {
            Location::CityId(id) => LocationId(id.clone()),
            Location::CityState { city, state } => LocationId(format!(
                "{},{}",
                urlencoding::encode(city),
                urlencoding::encode(state)
            )),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::CityId(id) => write!(f, "city id {id}"),
            Location::CityState { city, state } => write!(f, "{city}, {state}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocationId(String);

impl LocationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LocationId {
    fn from(value: &str) -> Self {
        LocationId(value.to_owned())
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token carried through an asynchronous request so the response can be bound
/// back to the device it was issued for.
pub type CorrelationId = LocationId;

/// OpenWeatherMap API key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self(api_key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// One parsed weather sample.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReading {
    pub temperature_kelvin: f64,
    pub humidity_percent: Option<f64>,
    pub wind_speed_mph: Option<f64>,
    pub wind_direction_degrees: Option<f64>,
}

impl WeatherReading {
    pub fn celsius(&self) -> f64 {
        self.temperature_kelvin - 273.15
    }

    pub fn fahrenheit(&self) -> f64 {
        self.celsius() * 1.8 + 32.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VariableKey {
    OutdoorTempC,
    OutdoorTempF,
    OutdoorRelativeHumidity,
    WindSpeedMph,
    WindDirectionDegrees,
}

impl VariableKey {
    /// The variable set every device publishes at creation.
    pub const ALL: &'static [VariableKey] = &[
        VariableKey::OutdoorTempC,
        VariableKey::OutdoorTempF,
        VariableKey::OutdoorRelativeHumidity,
        VariableKey::WindSpeedMph,
        VariableKey::WindDirectionDegrees,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VariableKey::OutdoorTempC => "outdoor_temp_c",
            VariableKey::OutdoorTempF => "outdoor_temp_f",
            VariableKey::OutdoorRelativeHumidity => "outdoor_relative_humidity",
            VariableKey::WindSpeedMph => "wind_speed_mph",
            VariableKey::WindDirectionDegrees => "wind_direction_degrees",
        }
    }
}

impl fmt::Display for VariableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of variable values written in a single registry call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableUpdates(Vec<(VariableKey, f64)>);

impl VariableUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: VariableKey, value: f64) {
        self.0.push((key, value));
    }

    pub fn get(&self, key: VariableKey) -> Option<f64> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    pub fn keys(&self) -> Vec<VariableKey> {
        self.0.iter().map(|(k, _)| *k).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(VariableKey, f64)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The published entity exposing weather variables for one location.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub location_id: LocationId,
    pub location: Location,
    pub name: String,
    pub last_checkin: Option<DateTime<Utc>>,
}

impl Device {
    pub const MANUFACTURER: &'static str = "OpenWeatherMap";

    /// Variable a UI shows first for the device.
    pub const PREFERRED_VARIABLE: VariableKey = VariableKey::OutdoorTempF;

    pub fn new(location: Location, name: impl Into<String>) -> Self {
        Self {
            location_id: location.id(),
            location,
            name: name.into(),
            last_checkin: None,
        }
    }

    /// Fixed at creation; never changes for the lifetime of the device.
    pub fn variables(&self) -> &'static [VariableKey] {
        VariableKey::ALL
    }
}
