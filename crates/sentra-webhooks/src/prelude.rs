//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sentra_webhooks::prelude::*;` to import all essential types.

// Errors
pub use crate::{WebhookError, WebhookResult};

// Model and registry
pub use crate::{
    DEFAULT_COALESCE_TEXT_LIMIT, HttpMethod, KvWebhookStore, RateLimitAction, Webhook,
    WebhookStore,
};

// Dispatch
pub use crate::{BATCH_HANDLER, BatchDispatchHandler, DispatchEngine, PENDING_QUEUE_GRACE};

// Rendering and delivery
pub use crate::{
    DEFAULT_USER_AGENT, DELIVERY_TIMEOUT, Delivery, DeliveryExecutor, EventContext,
    TemplateRenderer,
};
