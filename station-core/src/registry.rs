use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{
    error::RegistryError,
    model::{Device, LocationId, VariableKey, VariableUpdates},
};

/// Device/variable registry owned by the hosting framework.
pub trait DeviceRegistry {
    /// Devices published by an earlier run of the plugin.
    fn published_devices(&self) -> Vec<Device>;

    /// Fails with [`RegistryError::DeviceExists`] for a duplicate id.
    fn create_device(&mut self, device: Device) -> Result<(), RegistryError>;

    /// Publish the device's variable set with unset values. Allowed once per device.
    fn publish_variables(
        &mut self,
        device: &LocationId,
        keys: &[VariableKey],
    ) -> Result<(), RegistryError>;

    fn set_variables(
        &mut self,
        device: &LocationId,
        updates: &VariableUpdates,
    ) -> Result<(), RegistryError>;

    fn set_last_checkin(&mut self, device: &LocationId, at: DateTime<Utc>)
    -> Result<(), RegistryError>;
}

/// Every call made against an [`InMemoryRegistry`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryCall {
    CreateDevice(LocationId),
    PublishVariables(LocationId, Vec<VariableKey>),
    SetVariables(LocationId, VariableUpdates),
    SetLastCheckin(LocationId, DateTime<Utc>),
}

#[derive(Debug, Clone)]
pub struct RegisteredDevice {
    pub device: Device,
    pub values: BTreeMap<VariableKey, Option<f64>>,
}

#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    devices: BTreeMap<LocationId, RegisteredDevice>,
    calls: Vec<RegistryCall>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with devices, as after a restart.
    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let devices = devices
            .into_iter()
            .map(|device| {
                let values = device.variables().iter().map(|k| (*k, None)).collect();
                (device.location_id.clone(), RegisteredDevice { device, values })
            })
            .collect();
        Self {
            devices,
            calls: Vec::new(),
        }
    }

    pub fn device(&self, id: &LocationId) -> Option<&RegisteredDevice> {
        self.devices.get(id)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// `None` if the variable was never published, `Some(None)` if it is unset.
    pub fn value(&self, id: &LocationId, key: VariableKey) -> Option<Option<f64>> {
        self.devices.get(id).and_then(|d| d.values.get(&key).copied())
    }

    pub fn calls(&self) -> &[RegistryCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Every `set_variables` call, in order.
    pub fn variable_updates(&self) -> Vec<&VariableUpdates> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                RegistryCall::SetVariables(_, updates) => Some(updates),
                _ => None,
            })
            .collect()
    }

    fn registered_mut(&mut self, id: &LocationId) -> Result<&mut RegisteredDevice, RegistryError> {
        self.devices.get_mut(id).ok_or_else(|| RegistryError::UnknownDevice(id.clone()))
    }
}

impl DeviceRegistry for InMemoryRegistry {
    fn published_devices(&self) -> Vec<Device> {
        self.devices.values().map(|d| d.device.clone()).collect()
    }

    fn create_device(&mut self, device: Device) -> Result<(), RegistryError> {
        let id = device.location_id.clone();
        if self.devices.contains_key(&id) {
            return Err(RegistryError::DeviceExists(id));
        }
        self.calls.push(RegistryCall::CreateDevice(id.clone()));
        let registered = RegisteredDevice {
            device,
            values: BTreeMap::new(),
        };
        self.devices.insert(id, registered);
        Ok(())
    }

    fn publish_variables(
        &mut self,
        device: &LocationId,
        keys: &[VariableKey],
    ) -> Result<(), RegistryError> {
        let registered = self.registered_mut(device)?;
        if !registered.values.is_empty() {
            return Err(RegistryError::VariablesAlreadyPublished(device.clone()));
        }
        registered.values = keys.iter().map(|k| (*k, None)).collect();
        self.calls.push(RegistryCall::PublishVariables(device.clone(), keys.to_vec()));
        Ok(())
    }

    fn set_variables(
        &mut self,
        device: &LocationId,
        updates: &VariableUpdates,
    ) -> Result<(), RegistryError> {
        let registered = self.registered_mut(device)?;
        if let Some((key, _)) = updates.iter().find(|(k, _)| !registered.values.contains_key(k)) {
            return Err(RegistryError::UnknownVariable {
                device: device.clone(),
                key: *key,
            });
        }
        for (key, value) in updates.iter() {
            registered.values.insert(*key, Some(*value));
        }
        self.calls.push(RegistryCall::SetVariables(device.clone(), updates.clone()));
        Ok(())
    }

    fn set_last_checkin(
        &mut self,
        device: &LocationId,
        at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        self.registered_mut(device)?.device.last_checkin = Some(at);
        self.calls.push(RegistryCall::SetLastCheckin(device.clone(), at));
        Ok(())
    }
}
