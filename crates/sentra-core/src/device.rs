//! Sensor device record.
//!
//! A device is identified by the IP address it reports from. Devices are
//! created implicitly the first time an address is seen and refreshed on
//! every subsequent contact; the retention job removes devices that have
//! been idle too long.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::types::{DeviceId, Timestamp};

/// A sensor device, identified by its reporting IP address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Unique device identifier.
    pub id: DeviceId,
    /// The address this device reports from. Unique per device.
    pub ip_address: IpAddr,
    /// When this device was first observed.
    pub created_at: Timestamp,
    /// When this device was last observed.
    pub last_seen: Timestamp,
}

impl Device {
    /// Create a device record for a newly observed address.
    #[must_use]
    pub fn new(ip_address: IpAddr) -> Self {
        let now = Timestamp::now();
        Self {
            id: DeviceId::new(),
            ip_address,
            created_at: now,
            last_seen: now,
        }
    }

    /// Refresh the last-seen timestamp.
    pub fn touch(&mut self) {
        self.last_seen = Timestamp::now();
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "device {}", self.ip_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_device_last_seen_matches_created() {
        let device = Device::new("10.0.0.7".parse().unwrap());
        assert_eq!(device.created_at, device.last_seen);
    }

    #[test]
    fn test_touch_advances_last_seen() {
        let mut device = Device::new("10.0.0.7".parse().unwrap());
        let before = device.last_seen;
        device.touch();
        assert!(device.last_seen >= before);
    }
}
