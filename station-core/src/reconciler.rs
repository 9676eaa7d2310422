//! Maps readings onto device variables.
//!
//! Temperature variables are always written as a C/F pair from one sample.
//! Optional fields only appear in an update when the payload carried them.

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::{
    error::RegistryError,
    model::{Device, LocationId, VariableKey, VariableUpdates, WeatherReading},
    registry::DeviceRegistry,
};

/// Variable values derived from one reading, in publish order.
pub fn variable_updates(reading: &WeatherReading) -> VariableUpdates {
    let mut updates = VariableUpdates::new();

    trace!(kelvin = reading.temperature_kelvin, "temperature");
    updates.push(VariableKey::OutdoorTempC, reading.celsius());
    updates.push(VariableKey::OutdoorTempF, reading.fahrenheit());

    if let Some(humidity) = reading.humidity_percent {
        updates.push(VariableKey::OutdoorRelativeHumidity, humidity);
    }
    if let Some(speed) = reading.wind_speed_mph {
        updates.push(VariableKey::WindSpeedMph, speed);
    }
    if let Some(deg) = reading.wind_direction_degrees {
        updates.push(VariableKey::WindDirectionDegrees, deg);
    }

    updates
}

/// Create a device, publish its variables unset, then apply `initial` if given.
///
/// A device that already exists in the registry is left as is and the
/// reading, if any, is still applied.
pub fn publish_device<R: DeviceRegistry + ?Sized>(
    registry: &mut R,
    device: Device,
    initial: Option<&WeatherReading>,
    now: DateTime<Utc>,
) -> Result<(), RegistryError> {
    let id = device.location_id.clone();
    let variables = device.variables();

    match registry.create_device(device) {
        Ok(()) => {
            debug!(location = %id, "published new device");
            registry.publish_variables(&id, variables)?;
        }
        Err(RegistryError::DeviceExists(_)) => {
            debug!(location = %id, "device already published");
        }
        Err(e) => return Err(e),
    }

    match initial {
        Some(reading) => apply_reading(registry, &id, reading, now).map(|_| ()),
        None => Ok(()),
    }
}

/// Write a reading to an existing device. Returns whether anything was written.
pub fn apply_reading<R: DeviceRegistry + ?Sized>(
    registry: &mut R,
    device: &LocationId,
    reading: &WeatherReading,
    now: DateTime<Utc>,
) -> Result<bool, RegistryError> {
    publish_updates(registry, device, &variable_updates(reading), now)
}

/// One bulk variable write followed by one checkin, or nothing when empty.
pub fn publish_updates<R: DeviceRegistry + ?Sized>(
    registry: &mut R,
    device: &LocationId,
    updates: &VariableUpdates,
    now: DateTime<Utc>,
) -> Result<bool, RegistryError> {
    if updates.is_empty() {
        trace!(location = %device, "no variables to update");
        return Ok(false);
    }

    registry.set_variables(device, updates)?;
    registry.set_last_checkin(device, now)?;
    debug!(location = %device, count = updates.len(), "updated device variables");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::Location,
        registry::{InMemoryRegistry, RegistryCall},
    };
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
    }

    fn reading(kelvin: f64) -> WeatherReading {
        WeatherReading {
            temperature_kelvin: kelvin,
            humidity_percent: None,
            wind_speed_mph: None,
            wind_direction_degrees: None,
        }
    }

    fn device() -> Device {
        Device::new(Location::CityId("5419384".into()), "Denver")
    }

    #[test]
    fn temperature_only_yields_c_then_f() {
        let updates = variable_updates(&reading(306.15));

        assert_eq!(
            updates.keys(),
            vec![VariableKey::OutdoorTempC, VariableKey::OutdoorTempF]
        );

        let celsius = updates.get(VariableKey::OutdoorTempC).unwrap();
        let fahrenheit = updates.get(VariableKey::OutdoorTempF).unwrap();
        assert!((celsius - 33.0).abs() < 0.05);
        assert!((fahrenheit - 91.4).abs() < 0.05);
    }

    #[test]
    fn optional_fields_only_when_present() {
        let mut r = reading(280.0);
        r.wind_direction_degrees = Some(90.0);

        assert_eq!(
            variable_updates(&r).keys(),
            vec![
                VariableKey::OutdoorTempC,
                VariableKey::OutdoorTempF,
                VariableKey::WindDirectionDegrees,
            ]
        );
    }

    #[test]
    fn full_reading_order() {
        let r = WeatherReading {
            temperature_kelvin: 280.0,
            humidity_percent: Some(50.0),
            wind_speed_mph: Some(3.0),
            wind_direction_degrees: Some(180.0),
        };

        assert_eq!(variable_updates(&r).keys(), VariableKey::ALL.to_vec());
    }

    #[test]
    fn new_device_publishes_then_applies_initial_reading() {
        let mut registry = InMemoryRegistry::new();
        let id = device().location_id;

        publish_device(&mut registry, device(), Some(&reading(306.15)), at()).unwrap();

        let calls = registry.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], RegistryCall::CreateDevice(id.clone()));
        assert_eq!(
            calls[1],
            RegistryCall::PublishVariables(id.clone(), VariableKey::ALL.to_vec())
        );
        assert!(matches!(&calls[2], RegistryCall::SetVariables(_, u) if u.len() == 2));
        assert_eq!(calls[3], RegistryCall::SetLastCheckin(id.clone(), at()));

        assert_eq!(
            registry.value(&id, VariableKey::OutdoorRelativeHumidity),
            Some(None)
        );
        let registered = registry.device(&id).unwrap();
        assert_eq!(registered.device.last_checkin, Some(at()));
    }

    #[test]
    fn new_device_without_reading_has_unset_values() {
        let mut registry = InMemoryRegistry::new();
        let id = device().location_id;

        publish_device(&mut registry, device(), None, at()).unwrap();

        for key in VariableKey::ALL {
            assert_eq!(registry.value(&id, *key), Some(None));
        }
        assert_eq!(registry.device(&id).unwrap().device.last_checkin, None);
    }

    #[test]
    fn existing_device_is_not_recreated() {
        let mut registry = InMemoryRegistry::with_devices([device()]);

        publish_device(&mut registry, device(), None, at()).unwrap();
        assert!(registry.calls().is_empty());
    }

    #[test]
    fn humidity_absent_leaves_previous_value() {
        let mut registry = InMemoryRegistry::new();
        let id = device().location_id;
        publish_device(&mut registry, device(), None, at()).unwrap();

        let mut first = reading(290.0);
        first.humidity_percent = Some(40.0);
        apply_reading(&mut registry, &id, &first, at()).unwrap();
        apply_reading(&mut registry, &id, &reading(295.0), at()).unwrap();

        assert_eq!(
            registry.value(&id, VariableKey::OutdoorRelativeHumidity),
            Some(Some(40.0))
        );
        let celsius = registry.value(&id, VariableKey::OutdoorTempC).flatten().unwrap();
        assert!((celsius - 21.85).abs() < 1e-9);
    }

    #[test]
    fn empty_updates_write_nothing() {
        let mut registry = InMemoryRegistry::new();
        let id = device().location_id;
        publish_device(&mut registry, device(), None, at()).unwrap();
        registry.clear_calls();

        let written = publish_updates(&mut registry, &id, &VariableUpdates::new(), at()).unwrap();

        assert!(!written);
        assert!(registry.calls().is_empty());
    }
}
