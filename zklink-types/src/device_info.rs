//! Device information structures

use std::fmt;

use crate::time::DeviceTime;

/// Aggregated device identity and firmware details
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    /// Firmware version string
    pub firmware_version: String,

    /// Device serial number
    pub serial_number: String,

    /// Platform name
    pub platform: String,

    /// Device name (user-assigned)
    pub device_name: String,

    /// MAC address
    pub mac_address: String,

    /// Face engine version (0 when absent)
    pub face_version: u32,

    /// Fingerprint engine version (0 when absent)
    pub fp_version: u32,

    /// Device clock at read time
    pub device_time: DeviceTime,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device[SN: {}, FW: {}, name: {}]",
            self.serial_number, self.firmware_version, self.device_name
        )
    }
}
