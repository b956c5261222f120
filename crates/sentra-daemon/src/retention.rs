//! The daily retention job.
//!
//! Runs through the shared scheduler once a day and prunes, in order:
//! idle devices (optionally detaching their log entries instead of
//! deleting them), log entries past the age limit, and log entries beyond
//! the count limit. Disabled stages (unset or zero limits) are skipped.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sentra_audit::{AuditLog, AuditResult, DeviceStore};
use sentra_config::RetentionSection;
use sentra_core::Timestamp;
use sentra_scheduler::JobHandler;
use serde_json::Value;
use tracing::{debug, info};

/// Handler name the retention job is registered under.
pub(crate) const PRUNE_HANDLER: &str = "prune_data";

/// Daily at 03:00 UTC.
pub(crate) const PRUNE_SCHEDULE: &str = "0 0 3 * * *";

/// Scheduler job pruning old data per the retention configuration.
pub(crate) struct RetentionJob {
    log: Arc<AuditLog>,
    devices: Arc<DeviceStore>,
    config: RetentionSection,
}

impl RetentionJob {
    /// Create the job over the shared stores.
    pub(crate) fn new(
        log: Arc<AuditLog>,
        devices: Arc<DeviceStore>,
        config: RetentionSection,
    ) -> Self {
        Self {
            log,
            devices,
            config,
        }
    }

    fn cutoff(days: u32) -> Timestamp {
        let delta = chrono::Duration::try_days(i64::from(days))
            .unwrap_or_else(chrono::Duration::zero);
        Timestamp::from_datetime(Utc::now().checked_sub_signed(delta).unwrap_or_else(Utc::now))
    }

    async fn prune_devices(&self) -> AuditResult<()> {
        let Some(days) = self.config.device_max_idle_days.filter(|d| *d > 0) else {
            debug!("device pruning disabled");
            return Ok(());
        };

        let idle = self.devices.list_idle(Self::cutoff(days)).await?;
        if idle.is_empty() {
            debug!("no idle devices to prune");
            return Ok(());
        }

        let mut detached: u64 = 0;
        let mut entries_deleted: u64 = 0;
        for device in &idle {
            if self.config.delete_device_entries {
                entries_deleted = entries_deleted
                    .saturating_add(self.log.prune_device_entries(&device.id).await?);
            } else {
                detached = detached.saturating_add(self.log.detach_device(&device.id).await?);
            }
            self.devices.remove(device.ip_address).await?;
        }
        info!(
            devices = idle.len(),
            entries_deleted,
            entries_detached = detached,
            "pruned idle devices"
        );
        Ok(())
    }

    async fn prune_by_age(&self) -> AuditResult<()> {
        let Some(days) = self.config.log_max_age_days.filter(|d| *d > 0) else {
            debug!("log pruning by age disabled");
            return Ok(());
        };
        let deleted = self.log.prune_older_than(Self::cutoff(days)).await?;
        info!(deleted, max_age_days = days, "pruned log entries by age");
        Ok(())
    }

    async fn prune_by_count(&self) -> AuditResult<()> {
        let Some(max) = self.config.log_max_count.filter(|c| *c > 0) else {
            debug!("log pruning by count disabled");
            return Ok(());
        };
        let deleted = self.log.prune_to_count(max).await?;
        info!(deleted, max_count = max, "pruned log entries by count");
        Ok(())
    }
}

#[async_trait]
impl JobHandler for RetentionJob {
    async fn execute(
        &self,
        _payload: Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("starting data pruning");
        self.prune_devices().await?;
        self.prune_by_age().await?;
        self.prune_by_count().await?;
        info!("data pruning finished");
        Ok(())
    }
}

impl std::fmt::Debug for RetentionJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionJob").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_audit::sync_catalog;
    use serde_json::json;

    async fn seeded() -> (Arc<AuditLog>, Arc<DeviceStore>) {
        let log = Arc::new(AuditLog::in_memory());
        sync_catalog(log.storage().as_ref()).await.unwrap();
        (log, Arc::new(DeviceStore::in_memory()))
    }

    fn job(log: &Arc<AuditLog>, devices: &Arc<DeviceStore>, config: RetentionSection) -> RetentionJob {
        RetentionJob::new(Arc::clone(log), Arc::clone(devices), config)
    }

    #[tokio::test]
    async fn test_prune_by_count() {
        let (log, devices) = seeded().await;
        for _ in 0..5 {
            log.append("DATA_RECEIVED", None, None, Value::Null)
                .await
                .unwrap();
        }

        let config = RetentionSection {
            log_max_age_days: None,
            log_max_count: Some(2),
            device_max_idle_days: None,
            delete_device_entries: true,
        };
        job(&log, &devices, config).execute(Value::Null).await.unwrap();
        assert_eq!(log.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_disabled_stages_keep_everything() {
        let (log, devices) = seeded().await;
        for _ in 0..3 {
            log.append("DATA_RECEIVED", None, None, Value::Null)
                .await
                .unwrap();
        }

        let config = RetentionSection {
            log_max_age_days: None,
            log_max_count: None,
            device_max_idle_days: None,
            delete_device_entries: true,
        };
        job(&log, &devices, config).execute(Value::Null).await.unwrap();
        assert_eq!(log.count().await.unwrap(), 3);
    }

    /// A device whose last activity was 400 days ago.
    async fn stale_device(devices: &Arc<DeviceStore>, ip: &str) -> sentra_core::Device {
        let mut device = devices.observe(ip.parse().unwrap()).await.unwrap();
        device.last_seen = Timestamp::from_datetime(
            Utc::now()
                .checked_sub_signed(chrono::Duration::days(400))
                .unwrap(),
        );
        devices.insert(&device).await.unwrap();
        device
    }

    #[tokio::test]
    async fn test_zero_idle_days_disables_device_pruning() {
        let (log, devices) = seeded().await;
        stale_device(&devices, "10.0.0.4").await;

        let config = RetentionSection {
            log_max_age_days: None,
            log_max_count: None,
            device_max_idle_days: Some(0),
            delete_device_entries: true,
        };
        job(&log, &devices, config).execute(Value::Null).await.unwrap();
        assert_eq!(devices.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_idle_device_pruned_with_detached_entries() {
        let (log, devices) = seeded().await;
        let device = stale_device(&devices, "10.0.0.5").await;
        let entry = log
            .append(
                "DATA_RECEIVED",
                None,
                Some(device.clone()),
                json!({ "value": 20.0 }),
            )
            .await
            .unwrap();

        let config = RetentionSection {
            log_max_age_days: None,
            log_max_count: None,
            device_max_idle_days: Some(180),
            delete_device_entries: false,
        };
        job(&log, &devices, config).execute(Value::Null).await.unwrap();

        assert!(devices.list().await.unwrap().is_empty());
        let kept = log.get(&entry.id).await.unwrap().unwrap();
        assert!(kept.device.is_none());
    }

    #[tokio::test]
    async fn test_idle_device_pruned_with_deleted_entries() {
        let (log, devices) = seeded().await;
        let device = stale_device(&devices, "10.0.0.6").await;
        log.append("DATA_RECEIVED", None, Some(device), Value::Null)
            .await
            .unwrap();
        log.append("ADMIN_LOGIN", Some("ops".to_string()), None, Value::Null)
            .await
            .unwrap();

        let config = RetentionSection {
            log_max_age_days: None,
            log_max_count: None,
            device_max_idle_days: Some(180),
            delete_device_entries: true,
        };
        job(&log, &devices, config).execute(Value::Null).await.unwrap();

        assert!(devices.list().await.unwrap().is_empty());
        // The device's entry is gone; the unrelated one survives.
        assert_eq!(log.count().await.unwrap(), 1);
    }
}
