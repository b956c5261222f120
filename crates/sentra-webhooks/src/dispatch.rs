//! The dispatch decision engine and deferred batch dispatch.
//!
//! For every new log entry the engine matches active webhooks by trigger
//! and decides, per webhook, to deliver immediately or defer under the
//! rate-limit window. The deferred path is the queue-then-lock sequence:
//!
//! 1. Append the entry id to the webhook's pending queue (TTL = window +
//!    grace, refreshed on every append).
//! 2. Try to acquire the dispatch-scheduled marker (set-if-absent, TTL =
//!    window). Only the acquirer schedules the batch job; everyone else
//!    knows a job is already pending.
//!
//! This guarantees at most one scheduled dispatch per webhook per window
//! while capturing every event arriving during the window, with no
//! cross-webhook locking.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sentra_audit::{AuditLog, LogEntry};
use sentra_core::{LogEntryId, WebhookId};
use sentra_events::DispatchSink;
use sentra_scheduler::{JobHandler, Scheduler, SchedulerError};
use sentra_storage::TtlCache;
use serde_json::{Map, Value, json};
use tracing::{debug, error, warn};

use crate::context::EventContext;
use crate::delivery::Delivery;
use crate::model::{RateLimitAction, Webhook};
use crate::registry::WebhookStore;
use crate::render::TemplateRenderer;

/// Handler name the batch job is registered under.
pub const BATCH_HANDLER: &str = "dispatch_batch";

/// Extra lifetime granted to a pending queue beyond its window, so a
/// slightly late job still finds its ids.
pub const PENDING_QUEUE_GRACE: Duration = Duration::from_secs(60);

/// The dispatch decision engine.
///
/// Registered as a sink on the event bus; owns no state of its own. All
/// contended state lives in the shared [`TtlCache`] and is touched only
/// through its atomic operations.
pub struct DispatchEngine {
    registry: Arc<dyn WebhookStore>,
    log: Arc<AuditLog>,
    cache: Arc<TtlCache>,
    scheduler: Arc<Scheduler>,
    delivery: Arc<dyn Delivery>,
    renderer: TemplateRenderer,
}

impl DispatchEngine {
    /// Create an engine over the shared services.
    #[must_use]
    pub fn new(
        registry: Arc<dyn WebhookStore>,
        log: Arc<AuditLog>,
        cache: Arc<TtlCache>,
        scheduler: Arc<Scheduler>,
        delivery: Arc<dyn Delivery>,
    ) -> Self {
        Self {
            registry,
            log,
            cache,
            scheduler,
            delivery,
            renderer: TemplateRenderer::new(),
        }
    }

    fn pending_key(id: &WebhookId) -> String {
        format!("webhook:{}:pending", id.0)
    }

    fn marker_key(id: &WebhookId) -> String {
        format!("webhook:{}:scheduled", id.0)
    }

    /// Decide, per matching webhook, between immediate and deferred
    /// dispatch for a freshly written entry.
    async fn decide(&self, entry: &LogEntry, instance: Option<&Value>) {
        let webhooks = match self.registry.matching(&entry.event.identifier).await {
            Ok(webhooks) => webhooks,
            Err(e) => {
                error!(event = %entry.event.identifier, error = %e, "webhook lookup failed");
                return;
            },
        };

        for webhook in webhooks {
            if webhook.rate_limit_seconds == 0 {
                let context = EventContext::from_entry(entry, instance);
                Arc::clone(&self.delivery).spawn(webhook, context);
                continue;
            }
            self.defer(&webhook, entry).await;
        }
    }

    /// Queue-then-lock: enqueue the entry, then schedule the one batch job
    /// for this window if nobody has yet.
    async fn defer(&self, webhook: &Webhook, entry: &LogEntry) {
        let window = Duration::from_secs(webhook.rate_limit_seconds);
        let pending_key = Self::pending_key(&webhook.id);

        if let Err(e) =
            self.cache
                .push_json(&pending_key, &entry.id, window.saturating_add(PENDING_QUEUE_GRACE))
        {
            error!(webhook = %webhook.name, error = %e, "could not queue entry for deferred dispatch");
            return;
        }

        match self.cache.set_if_absent(&Self::marker_key(&webhook.id), window) {
            Ok(true) => {
                let run_at = Utc::now()
                    .checked_add_signed(
                        chrono::Duration::try_seconds(
                            i64::try_from(webhook.rate_limit_seconds).unwrap_or(i64::MAX),
                        )
                        .unwrap_or(chrono::Duration::zero()),
                    )
                    .unwrap_or_else(Utc::now);
                let job_id = format!(
                    "dispatch_batch_{}_{}",
                    webhook.id.0,
                    run_at.timestamp()
                );
                match self
                    .scheduler
                    .schedule_once(
                        job_id,
                        run_at,
                        BATCH_HANDLER,
                        json!({ "webhook_id": webhook.id }),
                    )
                    .await
                {
                    Ok(()) => {
                        debug!(webhook = %webhook.name, run_at = %run_at, "batch dispatch scheduled");
                    },
                    // Two decisions racing into the same second produce the
                    // same job id; the queued entry is picked up regardless.
                    Err(SchedulerError::DuplicateJob { id }) => {
                        debug!(webhook = %webhook.name, job = %id, "batch dispatch already scheduled");
                    },
                    Err(e) => {
                        error!(webhook = %webhook.name, error = %e, "could not schedule batch dispatch");
                    },
                }
            },
            Ok(false) => {
                // A job is already pending for this window; the id we just
                // queued will be picked up by it.
            },
            Err(e) => {
                error!(webhook = %webhook.name, error = %e, "dispatch marker unavailable");
            },
        }
    }

    /// Deferred batch dispatch, run by the scheduler at window close.
    ///
    /// Drains the webhook's pending queue and hands every entry (ordered
    /// by ascending timestamp) to delivery: individually for QUEUE,
    /// merged into one bounded payload for COALESCE.
    pub async fn dispatch_batch(&self, webhook_id: &WebhookId) {
        let webhook = match self.registry.get(webhook_id).await {
            Ok(Some(webhook)) => webhook,
            Ok(None) => {
                warn!(webhook = %webhook_id, "webhook not found for batch dispatch");
                return;
            },
            Err(e) => {
                error!(webhook = %webhook_id, error = %e, "could not load webhook for batch dispatch");
                return;
            },
        };

        let ids: Vec<LogEntryId> = match self.cache.take_json(&Self::pending_key(webhook_id)) {
            Ok(Some(ids)) => ids,
            Ok(None) => return,
            Err(e) => {
                error!(webhook = %webhook.name, error = %e, "could not drain pending queue");
                return;
            },
        };
        if ids.is_empty() {
            return;
        }

        let entries = match self.log.get_many(&ids).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(webhook = %webhook.name, error = %e, "could not load batch entries");
                return;
            },
        };
        debug!(webhook = %webhook.name, entries = entries.len(), "dispatching batch");

        match webhook.rate_limit_action {
            RateLimitAction::Queue => {
                for entry in &entries {
                    let context = EventContext::from_entry(entry, None);
                    Arc::clone(&self.delivery).spawn(webhook.clone(), context);
                }
            },
            RateLimitAction::Coalesce => self.coalesce(&webhook, &entries).await,
        }
    }

    /// Merge a batch into one payload bounded by the webhook's coalesce
    /// text limit, dropping oldest events while it is exceeded.
    async fn coalesce(&self, webhook: &Webhook, entries: &[LogEntry]) {
        let mut events: Vec<Value> = Vec::with_capacity(entries.len());
        for entry in entries {
            let context = EventContext::from_entry(entry, None);
            match self.renderer.render(webhook, &context) {
                Ok(payload) => events.push(Value::Object(payload)),
                Err(e) => {
                    error!(webhook = %webhook.name, entry = %entry.id, error = %e, "skipping entry in coalesced batch");
                },
            }
        }
        if events.is_empty() {
            return;
        }

        let mut dropped: u64 = 0;
        loop {
            let payload = coalesced_payload(&events, dropped);
            let size = Value::Object(payload.clone()).to_string().len();
            if size <= webhook.coalesce_text_limit || events.len() <= 1 {
                if size > webhook.coalesce_text_limit {
                    warn!(
                        webhook = %webhook.name,
                        size,
                        limit = webhook.coalesce_text_limit,
                        "single coalesced event exceeds the text limit; sending anyway"
                    );
                }
                if dropped > 0 {
                    warn!(webhook = %webhook.name, dropped, "coalesced payload dropped oldest events to fit the text limit");
                }
                self.delivery.deliver_payload(webhook, payload).await;
                return;
            }
            events.remove(0);
            dropped = dropped.saturating_add(1);
        }
    }
}

fn coalesced_payload(events: &[Value], dropped: u64) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("events".to_string(), Value::Array(events.to_vec()));
    payload.insert("dropped".to_string(), json!(dropped));
    payload
}

#[async_trait]
impl DispatchSink for DispatchEngine {
    async fn entry_logged(&self, entry: &LogEntry, instance: Option<&Value>) {
        self.decide(entry, instance).await;
    }
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine").finish_non_exhaustive()
    }
}

/// Adapter running [`DispatchEngine::dispatch_batch`] as a scheduler job.
pub struct BatchDispatchHandler {
    engine: Arc<DispatchEngine>,
}

impl BatchDispatchHandler {
    /// Wrap an engine for registration under [`BATCH_HANDLER`].
    #[must_use]
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl JobHandler for BatchDispatchHandler {
    async fn execute(&self, payload: Value) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let webhook_id: WebhookId =
            serde_json::from_value(payload.get("webhook_id").cloned().unwrap_or(Value::Null))?;
        self.engine.dispatch_batch(&webhook_id).await;
        Ok(())
    }
}

impl std::fmt::Debug for BatchDispatchHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDispatchHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::KvWebhookStore;
    use sentra_audit::sync_catalog;
    use sentra_events::{EventBus, EventInput};
    use std::sync::Mutex;

    /// Delivery double that records instead of sending.
    #[derive(Default)]
    struct RecordingDelivery {
        contexts: Mutex<Vec<(String, EventContext)>>,
        payloads: Mutex<Vec<(String, Map<String, Value>)>>,
    }

    impl RecordingDelivery {
        fn contexts(&self) -> Vec<(String, EventContext)> {
            self.contexts.lock().unwrap().clone()
        }

        fn payloads(&self) -> Vec<(String, Map<String, Value>)> {
            self.payloads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Delivery for RecordingDelivery {
        fn spawn(self: Arc<Self>, webhook: Webhook, context: EventContext) {
            self.contexts
                .lock()
                .unwrap()
                .push((webhook.name.clone(), context));
        }

        async fn deliver_payload(&self, webhook: &Webhook, payload: Map<String, Value>) {
            self.payloads
                .lock()
                .unwrap()
                .push((webhook.name.clone(), payload));
        }
    }

    struct Fixture {
        bus: Arc<EventBus>,
        engine: Arc<DispatchEngine>,
        registry: Arc<KvWebhookStore>,
        cache: Arc<TtlCache>,
        scheduler: Arc<Scheduler>,
        delivery: Arc<RecordingDelivery>,
    }

    async fn fixture() -> Fixture {
        let log = Arc::new(AuditLog::in_memory());
        sync_catalog(log.storage().as_ref()).await.unwrap();

        let registry = Arc::new(KvWebhookStore::in_memory());
        let cache = Arc::new(TtlCache::new());
        let scheduler = Arc::new(Scheduler::in_memory());
        let delivery = Arc::new(RecordingDelivery::default());

        let engine = Arc::new(DispatchEngine::new(
            Arc::clone(&registry) as Arc<dyn WebhookStore>,
            Arc::clone(&log),
            Arc::clone(&cache),
            Arc::clone(&scheduler),
            Arc::clone(&delivery) as Arc<dyn Delivery>,
        ));
        scheduler.register_handler(
            BATCH_HANDLER,
            Arc::new(BatchDispatchHandler::new(Arc::clone(&engine))) as Arc<dyn JobHandler>,
        );

        let bus = Arc::new(EventBus::new(log));
        bus.add_sink(Arc::clone(&engine) as Arc<dyn DispatchSink>);

        Fixture {
            bus,
            engine,
            registry,
            cache,
            scheduler,
            delivery,
        }
    }

    #[tokio::test]
    async fn test_immediate_dispatch_with_context() {
        let f = fixture().await;
        f.registry
            .upsert(Webhook::new("instant", "https://example.com/in").with_trigger("NEW_DEVICE"))
            .await
            .unwrap();

        f.bus
            .publish(
                "NEW_DEVICE",
                EventInput::default()
                    .with_device(sentra_core::Device::new("10.0.0.4".parse().unwrap()))
                    .with_details(json!({ "ip_address": "10.0.0.4" }))
                    .with_instance(json!({ "ip_address": "10.0.0.4" })),
            )
            .await;

        let contexts = f.delivery.contexts();
        assert_eq!(contexts.len(), 1);
        let (name, context) = &contexts[0];
        assert_eq!(name, "instant");
        assert_eq!(context.event.identifier, "NEW_DEVICE");
        assert_eq!(
            context.device.as_ref().unwrap().ip_address.to_string(),
            "10.0.0.4"
        );
        assert_eq!(context.instance, Some(json!({ "ip_address": "10.0.0.4" })));
        assert!(!context.timestamp.is_empty());
    }

    #[tokio::test]
    async fn test_non_matching_event_not_dispatched() {
        let f = fixture().await;
        f.registry
            .upsert(Webhook::new("instant", "https://example.com/in").with_trigger("NEW_DEVICE"))
            .await
            .unwrap();

        f.bus.publish("ADMIN_LOGIN", EventInput::default()).await;
        assert!(f.delivery.contexts().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_events_schedule_one_job() {
        let f = fixture().await;
        let webhook = Webhook::new("slow", "https://example.com/in")
            .with_trigger("DATA_RECEIVED")
            .with_rate_limit(60, RateLimitAction::Queue);
        let webhook_id = webhook.id.clone();
        f.registry.upsert(webhook).await.unwrap();

        for _ in 0..3 {
            f.bus.publish("DATA_RECEIVED", EventInput::default()).await;
        }

        // One scheduled job, nothing delivered yet, three ids queued.
        assert_eq!(f.scheduler.job_count(), 1);
        assert!(f.delivery.contexts().is_empty());
        let queued: Option<Vec<LogEntryId>> = f
            .cache
            .get_json(&DispatchEngine::pending_key(&webhook_id))
            .unwrap();
        assert_eq!(queued.unwrap().len(), 3);
        f.scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_batch_dispatch_delivers_in_order_and_drains() {
        let f = fixture().await;
        let webhook = Webhook::new("slow", "https://example.com/in")
            .with_trigger("DATA_RECEIVED")
            .with_rate_limit(60, RateLimitAction::Queue);
        let webhook_id = webhook.id.clone();
        f.registry.upsert(webhook).await.unwrap();

        for i in 0..3 {
            f.bus
                .publish(
                    "DATA_RECEIVED",
                    EventInput::default().with_details(json!({ "n": i })),
                )
                .await;
        }

        // Run the deferred job without waiting for the window.
        f.engine.dispatch_batch(&webhook_id).await;

        let contexts = f.delivery.contexts();
        assert_eq!(contexts.len(), 3);
        let order: Vec<i64> = contexts
            .iter()
            .map(|(_, c)| c.details["n"].as_i64().unwrap())
            .collect();
        assert_eq!(order, vec![0, 1, 2]);

        // Queue drained; a second run is a no-op.
        f.engine.dispatch_batch(&webhook_id).await;
        assert_eq!(f.delivery.contexts().len(), 3);
        f.scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_deferred_window_end_to_end() {
        let f = fixture().await;
        let webhook = Webhook::new("slow", "https://example.com/in")
            .with_trigger("DATA_RECEIVED")
            .with_rate_limit(1, RateLimitAction::Queue);
        f.registry.upsert(webhook).await.unwrap();

        f.bus.publish("DATA_RECEIVED", EventInput::default()).await;
        f.bus.publish("DATA_RECEIVED", EventInput::default()).await;
        assert!(f.delivery.contexts().is_empty());

        // The scheduler fires the batch at window close.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(f.delivery.contexts().len(), 2);
        assert_eq!(f.scheduler.job_count(), 0);
    }

    #[tokio::test]
    async fn test_marker_allows_new_window_after_batch() {
        let f = fixture().await;
        let webhook = Webhook::new("slow", "https://example.com/in")
            .with_trigger("DATA_RECEIVED")
            .with_rate_limit(60, RateLimitAction::Queue);
        let webhook_id = webhook.id.clone();
        f.registry.upsert(webhook).await.unwrap();

        f.bus.publish("DATA_RECEIVED", EventInput::default()).await;
        f.engine.dispatch_batch(&webhook_id).await;
        assert_eq!(f.delivery.contexts().len(), 1);

        // Marker still held for this window: a new event queues but does
        // not schedule a second job.
        f.bus.publish("DATA_RECEIVED", EventInput::default()).await;
        assert_eq!(f.scheduler.job_count(), 1);
        f.scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_coalesce_merges_batch() {
        let f = fixture().await;
        let webhook = Webhook::new("digest", "https://example.com/in")
            .with_trigger("DATA_RECEIVED")
            .with_rate_limit(60, RateLimitAction::Coalesce)
            .with_template(r#"{"n": {{json details.n}}}"#);
        let webhook_id = webhook.id.clone();
        f.registry.upsert(webhook).await.unwrap();

        for i in 0..3 {
            f.bus
                .publish(
                    "DATA_RECEIVED",
                    EventInput::default().with_details(json!({ "n": i })),
                )
                .await;
        }
        f.engine.dispatch_batch(&webhook_id).await;

        // One merged delivery, no per-entry ones.
        assert!(f.delivery.contexts().is_empty());
        let payloads = f.delivery.payloads();
        assert_eq!(payloads.len(), 1);
        let (_, payload) = &payloads[0];
        let events = payload["events"].as_array().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["n"], 0);
        assert_eq!(payload["dropped"], 0);
        f.scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_coalesce_drops_oldest_beyond_limit() {
        let f = fixture().await;
        let mut webhook = Webhook::new("digest", "https://example.com/in")
            .with_trigger("DATA_RECEIVED")
            .with_rate_limit(60, RateLimitAction::Coalesce)
            .with_template(r#"{"filler": "{{details.filler}}", "n": {{json details.n}}}"#);
        webhook.coalesce_text_limit = 200;
        let webhook_id = webhook.id.clone();
        f.registry.upsert(webhook).await.unwrap();

        for i in 0..4 {
            f.bus
                .publish(
                    "DATA_RECEIVED",
                    EventInput::default()
                        .with_details(json!({ "n": i, "filler": "x".repeat(60) })),
                )
                .await;
        }
        f.engine.dispatch_batch(&webhook_id).await;

        let payloads = f.delivery.payloads();
        assert_eq!(payloads.len(), 1);
        let (_, payload) = &payloads[0];
        let events = payload["events"].as_array().unwrap();
        // Oldest entries were dropped to fit; the newest survives.
        assert!(events.len() < 4);
        assert!(payload["dropped"].as_u64().unwrap() > 0);
        assert_eq!(events.last().unwrap()["n"], 3);
        f.scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_broken_template_entry_skipped_in_coalesce() {
        let f = fixture().await;
        let webhook = Webhook::new("digest", "https://example.com/in")
            .with_trigger("DATA_RECEIVED")
            .with_rate_limit(60, RateLimitAction::Coalesce)
            // Renders an array: violates the payload contract per entry.
            .with_template(r#"[1, 2]"#);
        let webhook_id = webhook.id.clone();
        f.registry.upsert(webhook).await.unwrap();

        f.bus.publish("DATA_RECEIVED", EventInput::default()).await;
        f.engine.dispatch_batch(&webhook_id).await;

        assert!(f.delivery.payloads().is_empty());
        f.scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_missing_webhook_batch_is_noop() {
        let f = fixture().await;
        f.engine.dispatch_batch(&WebhookId::new()).await;
        assert!(f.delivery.contexts().is_empty());
        assert!(f.delivery.payloads().is_empty());
    }
}
