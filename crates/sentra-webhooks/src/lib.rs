//! Sentra Webhooks - the notification engine.
//!
//! This crate provides:
//! - The [`Webhook`] configuration model and its durable registry
//! - The [`DispatchEngine`]: trigger matching and the per-webhook
//!   immediate-or-deferred decision (queue-then-lock rate limiting)
//! - Deferred batch dispatch with QUEUE and COALESCE semantics
//! - The [`TemplateRenderer`] and its single-JSON-object payload contract
//! - The [`DeliveryExecutor`]: bounded, isolated, fire-and-forget outbound
//!   HTTP
//!
//! # Failure isolation
//!
//! A broken webhook (bad template, unreachable endpoint, hostile
//! response) must never affect request handling or any other webhook.
//! Every failure in this crate terminates as a log record; nothing
//! propagates past the dispatch sink boundary, and every outbound call
//! runs on its own detached task with a hard timeout.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod delivery;
mod dispatch;
mod error;
mod model;
mod registry;
mod render;

pub use context::EventContext;
pub use delivery::{DEFAULT_USER_AGENT, DELIVERY_TIMEOUT, Delivery, DeliveryExecutor};
pub use dispatch::{BATCH_HANDLER, BatchDispatchHandler, DispatchEngine, PENDING_QUEUE_GRACE};
pub use error::{WebhookError, WebhookResult};
pub use model::{DEFAULT_COALESCE_TEXT_LIMIT, HttpMethod, RateLimitAction, Webhook};
pub use registry::{KvWebhookStore, WebhookStore};
pub use render::TemplateRenderer;
