//! Device registry keyed by reporting address.

use std::net::IpAddr;
use std::sync::Arc;

use sentra_core::{Device, Timestamp};
use sentra_storage::{KvStore, MemoryKvStore};
use tracing::info;

use crate::error::{AuditError, AuditResult};

const NS_DEVICES: &str = "devices";

/// Durable registry of sensor devices.
///
/// Devices are created implicitly the first time an address reports and
/// refreshed on every contact. The retention job consults
/// [`list_idle`](Self::list_idle) and [`remove`](Self::remove).
pub struct DeviceStore {
    store: Arc<dyn KvStore>,
}

impl DeviceStore {
    /// Wrap an existing KV store.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Create a registry over a fresh in-memory store (for testing).
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKvStore::new()))
    }

    /// Get-or-create the device for `ip`, refreshing its last-seen time.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read or written.
    pub async fn observe(&self, ip: IpAddr) -> AuditResult<Device> {
        let device = match self.get(ip).await? {
            Some(mut known) => {
                known.touch();
                known
            },
            None => {
                let device = Device::new(ip);
                info!(device = %device.ip_address, "new device registered");
                device
            },
        };
        self.persist(&device).await?;
        Ok(device)
    }

    /// Look up a device by address.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    pub async fn get(&self, ip: IpAddr) -> AuditResult<Option<Device>> {
        match self.store.get(NS_DEVICES, &ip.to_string()).await? {
            Some(bytes) => {
                let device = serde_json::from_slice(&bytes)
                    .map_err(|e| AuditError::SerializationError(e.to_string()))?;
                Ok(Some(device))
            },
            None => Ok(None),
        }
    }

    /// All known devices.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    pub async fn list(&self) -> AuditResult<Vec<Device>> {
        let mut devices = Vec::new();
        for key in self.store.list_keys(NS_DEVICES).await? {
            if let Ok(ip) = key.parse::<IpAddr>() {
                if let Some(device) = self.get(ip).await? {
                    devices.push(device);
                }
            }
        }
        Ok(devices)
    }

    /// Devices whose last activity is before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    pub async fn list_idle(&self, cutoff: Timestamp) -> AuditResult<Vec<Device>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|d| d.last_seen < cutoff)
            .collect())
    }

    /// Remove a device. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn remove(&self, ip: IpAddr) -> AuditResult<bool> {
        Ok(self.store.delete(NS_DEVICES, &ip.to_string()).await?)
    }

    /// Insert or replace a device record as-is, without refreshing its
    /// last-seen time. Normal ingestion goes through
    /// [`observe`](Self::observe); this is for restores and backfills.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    pub async fn insert(&self, device: &Device) -> AuditResult<()> {
        self.persist(device).await
    }

    async fn persist(&self, device: &Device) -> AuditResult<()> {
        let bytes = serde_json::to_vec(device)
            .map_err(|e| AuditError::SerializationError(e.to_string()))?;
        self.store
            .set(NS_DEVICES, &device.ip_address.to_string(), bytes)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for DeviceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStore").finish_non_exhaustive()
    }
}
