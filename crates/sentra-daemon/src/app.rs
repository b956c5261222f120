//! Application wiring.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use sentra_audit::{AuditLog, AuditStorage, DeviceStore, KvAuditStorage, sync_catalog};
use sentra_config::MonitorConfig;
use sentra_events::{DispatchSink, DosGuard, EventBus};
use sentra_scheduler::{JobHandler, Scheduler};
use sentra_storage::{KvStore, SurrealKvStore, TtlCache};
use sentra_webhooks::{
    BATCH_HANDLER, BatchDispatchHandler, Delivery, DeliveryExecutor, DispatchEngine,
    KvWebhookStore, WebhookStore,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::retention::{PRUNE_HANDLER, PRUNE_SCHEDULE, RetentionJob};

/// The wired application: everything an embedding surface (the sensor
/// API, the admin layer) needs to publish events and manage
/// configuration.
pub(crate) struct App {
    /// The event bus producers publish into.
    pub(crate) bus: Arc<EventBus>,
    /// Suppression guard for throttling violations.
    pub(crate) dos_guard: Arc<DosGuard>,
    /// Device registry.
    pub(crate) devices: Arc<DeviceStore>,
    /// Webhook configuration store (operator surface).
    pub(crate) registry: Arc<dyn WebhookStore>,
    /// The shared job runner.
    pub(crate) scheduler: Arc<Scheduler>,
}

/// Construct the full pipeline over the given KV backend.
///
/// Catalog reconciliation happens here and any failure is fatal: the
/// system cannot safely operate without a synchronized catalog.
pub(crate) async fn build(config: &MonitorConfig, kv: Arc<dyn KvStore>) -> anyhow::Result<App> {
    let audit_storage: Arc<dyn AuditStorage> = Arc::new(KvAuditStorage::new(Arc::clone(&kv)));
    sync_catalog(audit_storage.as_ref())
        .await
        .context("event catalog reconciliation failed")?;

    let log = Arc::new(
        AuditLog::open(audit_storage)
            .await
            .context("cannot open audit log")?,
    );
    let devices = Arc::new(DeviceStore::new(Arc::clone(&kv)));
    let registry: Arc<dyn WebhookStore> = Arc::new(KvWebhookStore::new(Arc::clone(&kv)));
    let cache = Arc::new(TtlCache::new());
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&kv)));

    let executor = Arc::new(
        DeliveryExecutor::new(
            config.delivery.max_concurrent,
            config.delivery.user_agent.clone(),
        )
        .context("cannot build delivery executor")?,
    );

    let engine = Arc::new(DispatchEngine::new(
        Arc::clone(&registry),
        Arc::clone(&log),
        Arc::clone(&cache),
        Arc::clone(&scheduler),
        executor as Arc<dyn Delivery>,
    ));
    scheduler.register_handler(
        BATCH_HANDLER,
        Arc::new(BatchDispatchHandler::new(Arc::clone(&engine))) as Arc<dyn JobHandler>,
    );
    scheduler.register_handler(
        PRUNE_HANDLER,
        Arc::new(RetentionJob::new(
            Arc::clone(&log),
            Arc::clone(&devices),
            config.retention.clone(),
        )) as Arc<dyn JobHandler>,
    );

    let bus = Arc::new(EventBus::new(Arc::clone(&log)));
    bus.add_sink(engine as Arc<dyn DispatchSink>);

    let dos_guard = Arc::new(DosGuard::new(
        Arc::clone(&bus),
        Arc::clone(&devices),
        Arc::clone(&cache),
    ));

    Ok(App {
        bus,
        dos_guard,
        devices,
        registry,
        scheduler,
    })
}

/// Build the pipeline over persistent storage and run until interrupted.
pub(crate) async fn run(config: MonitorConfig, data_dir: &Path) -> anyhow::Result<()> {
    let kv: Arc<dyn KvStore> = Arc::new(
        SurrealKvStore::open(data_dir.join("kv")).context("cannot open durable storage")?,
    );
    let app = build(&config, kv).await?;

    let webhook_count = app.registry.list().await.map(|w| w.len()).unwrap_or(0);
    let device_count = app.devices.list().await.map(|d| d.len()).unwrap_or(0);
    info!(
        webhooks = webhook_count,
        devices = device_count,
        "configuration loaded"
    );
    debug!(guard = ?app.dos_guard, "DoS suppression wired");

    app.scheduler.start().await?;
    app.scheduler
        .schedule_cron(
            "prune_data_daily",
            PRUNE_SCHEDULE,
            PRUNE_HANDLER,
            Value::Null,
        )
        .context("cannot register daily pruning job")?;

    info!("sentra daemon running");
    tokio::signal::ctrl_c().await?;

    app.scheduler.shutdown();
    let entries = app.bus.log().count().await.unwrap_or(0);
    info!(audit_entries = entries, "sentra daemon stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_events::EventInput;
    use sentra_storage::MemoryKvStore;

    #[tokio::test]
    async fn test_build_wires_pipeline() {
        let config = MonitorConfig::default();
        let app = build(&config, Arc::new(MemoryKvStore::new())).await.unwrap();

        // A publish through the wired bus lands in the audit log.
        app.bus
            .publish("ADMIN_LOGIN", EventInput::default().with_actor("ops"))
            .await;
        assert_eq!(app.bus.log().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_daily_prune_job_registers() {
        let config = MonitorConfig::default();
        let app = build(&config, Arc::new(MemoryKvStore::new())).await.unwrap();

        app.scheduler.start().await.unwrap();
        app.scheduler
            .schedule_cron("prune_data_daily", PRUNE_SCHEDULE, PRUNE_HANDLER, Value::Null)
            .unwrap();
        assert!(app.scheduler.contains("prune_data_daily"));
        app.scheduler.shutdown();
    }
}
