use chrono::{DateTime, Local, Utc};
use weather_station_core::{
    Device, DeviceRegistry, InMemoryRegistry, LocationId, RegistryError, VariableKey,
    VariableUpdates,
};

/// Registry that keeps devices in memory and prints every change.
#[derive(Debug, Default)]
pub struct ConsoleRegistry {
    inner: InMemoryRegistry,
}

impl ConsoleRegistry {
    pub fn inner(&self) -> &InMemoryRegistry {
        &self.inner
    }

    fn name(&self, id: &LocationId) -> String {
        self.inner
            .device(id)
            .map(|d| d.device.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

impl DeviceRegistry for ConsoleRegistry {
    fn published_devices(&self) -> Vec<Device> {
        self.inner.published_devices()
    }

    fn create_device(&mut self, device: Device) -> Result<(), RegistryError> {
        let line = format!(
            "+ {} station '{}' ({}), showing {}",
            Device::MANUFACTURER,
            device.name,
            device.location,
            Device::PREFERRED_VARIABLE
        );
        self.inner.create_device(device)?;
        println!("{line}");
        Ok(())
    }

    fn publish_variables(
        &mut self,
        device: &LocationId,
        keys: &[VariableKey],
    ) -> Result<(), RegistryError> {
        self.inner.publish_variables(device, keys)
    }

    fn set_variables(
        &mut self,
        device: &LocationId,
        updates: &VariableUpdates,
    ) -> Result<(), RegistryError> {
        self.inner.set_variables(device, updates)?;

        let values: Vec<String> =
            updates.iter().map(|(key, value)| format!("{key}={value:.1}")).collect();
        println!("  {}: {}", self.name(device), values.join(" "));
        Ok(())
    }

    fn set_last_checkin(
        &mut self,
        device: &LocationId,
        at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        self.inner.set_last_checkin(device, at)?;
        println!(
            "  {}: checked in at {}",
            self.name(device),
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        );
        Ok(())
    }
}
