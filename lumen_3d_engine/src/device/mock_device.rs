/// Mock device factory for unit tests
///
/// Lets a test decide which driver types and feature levels "exist" on the
/// machine, and records every creation attempt. Successful creations hand
/// out reference devices sharing one call log.

use std::sync::{Arc, Mutex};
use crate::device::{
    DeviceFactory, CreatedDevice, DriverType, FeatureLevel,
    ReferenceDevice, DeviceCallLog,
};
use crate::error::{Error, Result};

// ============================================================================
// Mock Device Factory
// ============================================================================

#[derive(Clone)]
pub struct MockDeviceFactory {
    /// Hardware feature levels the mock GPU supports (empty = no GPU)
    pub hardware_levels: Vec<FeatureLevel>,
    /// Whether the reference driver can be created
    pub reference_available: bool,
    /// Every (driver, level) requested, in order
    pub attempts: Arc<Mutex<Vec<(DriverType, FeatureLevel)>>>,
    /// Creation indices of devices that refuse to create swap chains
    pub swap_chain_failures: Vec<usize>,
    /// Every device handed out, in order
    pub devices: Arc<Mutex<Vec<ReferenceDevice>>>,
    pub log: DeviceCallLog,
}

impl MockDeviceFactory {
    /// Machine with no GPU and a working reference driver
    pub fn without_hardware() -> Self {
        Self {
            hardware_levels: Vec::new(),
            reference_available: true,
            attempts: Arc::new(Mutex::new(Vec::new())),
            swap_chain_failures: Vec::new(),
            devices: Arc::new(Mutex::new(Vec::new())),
            log: DeviceCallLog::new(),
        }
    }

    /// Machine with a GPU supporting `levels`
    pub fn with_hardware(levels: &[FeatureLevel]) -> Self {
        Self {
            hardware_levels: levels.to_vec(),
            ..Self::without_hardware()
        }
    }

    /// Machine where nothing can be created
    pub fn broken() -> Self {
        Self {
            reference_available: false,
            ..Self::without_hardware()
        }
    }

    pub fn attempts(&self) -> Vec<(DriverType, FeatureLevel)> {
        self.attempts.lock().unwrap().clone()
    }

    /// Most recently created device
    pub fn last_device(&self) -> Option<ReferenceDevice> {
        self.devices.lock().unwrap().last().cloned()
    }
}

impl DeviceFactory for MockDeviceFactory {
    fn create_device(&self, driver: DriverType, feature_level: FeatureLevel) -> Result<CreatedDevice> {
        self.attempts.lock().unwrap().push((driver, feature_level));

        // The mock "hardware" is a reference device under another name
        let as_driver = match driver {
            DriverType::Hardware => {
                if !self.hardware_levels.contains(&feature_level) {
                    return Err(Error::InitializationFailed(format!(
                        "mock GPU does not support feature level {}",
                        feature_level
                    )));
                }
                DriverType::Warp
            }
            other => {
                if !self.reference_available {
                    return Err(Error::InitializationFailed(format!(
                        "mock {} driver unavailable",
                        other
                    )));
                }
                other
            }
        };

        let (device, context) = ReferenceDevice::create(as_driver, feature_level, self.log.clone())?;
        let mut devices = self.devices.lock().unwrap();
        if self.swap_chain_failures.contains(&devices.len()) {
            device.reject_swap_chains();
        }
        devices.push(device.clone());
        Ok(CreatedDevice {
            device: Arc::new(device),
            immediate_context: Box::new(context),
        })
    }
}
