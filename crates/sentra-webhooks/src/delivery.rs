//! Outbound delivery.
//!
//! Every delivery runs isolated from its caller: the immediate path spawns
//! a detached task per call and the deferred path spawns one per batch
//! entry, so a slow or broken endpoint never blocks a request thread or a
//! sibling delivery. Calls are bounded by a fixed timeout and a concurrency
//! cap; failures are logged and never retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::context::EventContext;
use crate::error::{WebhookError, WebhookResult};
use crate::model::Webhook;
use crate::render::TemplateRenderer;

/// Hard per-call timeout for outbound requests.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default identification header, overridable per webhook.
pub const DEFAULT_USER_AGENT: &str = concat!("sentra-monitor/", env!("CARGO_PKG_VERSION"));

/// Hand-off point between the dispatch engine and the network.
///
/// The engine only ever schedules work through this trait, which keeps the
/// decision logic testable without sockets.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Render and deliver on a detached task (fire-and-forget).
    fn spawn(self: Arc<Self>, webhook: Webhook, context: EventContext);

    /// Deliver an already-rendered payload, awaiting completion.
    async fn deliver_payload(&self, webhook: &Webhook, payload: Map<String, Value>);
}

/// The real delivery executor: render, build, send, log.
pub struct DeliveryExecutor {
    client: reqwest::Client,
    renderer: TemplateRenderer,
    permits: Arc<Semaphore>,
    user_agent: String,
}

impl DeliveryExecutor {
    /// Create an executor with the given concurrency cap.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Http`] if the HTTP client cannot be built.
    pub fn new(max_concurrent: usize, user_agent: Option<String>) -> WebhookResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .map_err(|e| WebhookError::Http(e.to_string()))?;
        Ok(Self {
            client,
            renderer: TemplateRenderer::new(),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            user_agent: user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }

    /// Render the webhook's body and send it.
    ///
    /// Template failures abort the send with an error log; delivery
    /// failures are logged with the response when available. Nothing is
    /// retried and nothing propagates.
    pub async fn deliver(&self, webhook: &Webhook, context: &EventContext) {
        let payload = match self.renderer.render(webhook, context) {
            Ok(payload) => payload,
            Err(WebhookError::ContractViolation { rendered }) => {
                error!(
                    webhook = %webhook.name,
                    id = %webhook.id,
                    rendered,
                    "rendered body is not a single JSON object; delivery aborted"
                );
                return;
            },
            Err(e) => {
                error!(
                    webhook = %webhook.name,
                    id = %webhook.id,
                    error = %e,
                    "body template failed; delivery aborted"
                );
                return;
            },
        };
        self.send(webhook, payload).await;
    }

    async fn send(&self, webhook: &Webhook, payload: Map<String, Value>) {
        // Keep the serialized body for failure diagnostics.
        let body_log = Value::Object(payload.clone()).to_string();

        let request = match self.build_request(webhook, &payload) {
            Ok(request) => request,
            Err(e) => {
                error!(
                    webhook = %webhook.name,
                    url = %webhook.url,
                    error = %e,
                    "could not build delivery request"
                );
                return;
            },
        };

        match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                if status.is_client_error() || status.is_server_error() {
                    let body = response.text().await.unwrap_or_default();
                    error!(
                        webhook = %webhook.name,
                        url = %webhook.url,
                        status = status.as_u16(),
                        response = %body,
                        request_body = %body_log,
                        "webhook delivery failed"
                    );
                } else {
                    info!(
                        webhook = %webhook.name,
                        url = %webhook.url,
                        status = status.as_u16(),
                        "webhook delivered"
                    );
                }
            },
            Err(e) => {
                error!(
                    webhook = %webhook.name,
                    url = %webhook.url,
                    error = %e,
                    request_body = %body_log,
                    "webhook delivery failed: network error"
                );
            },
        }
    }

    fn build_request(
        &self,
        webhook: &Webhook,
        payload: &Map<String, Value>,
    ) -> WebhookResult<reqwest::Request> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|e| WebhookError::Http(e.to_string()))?,
        );
        for (name, value) in &webhook.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| WebhookError::Http(format!("header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| WebhookError::Http(format!("header {name}: {e}")))?;
            headers.insert(name, value);
        }

        let mut builder = self
            .client
            .request(webhook.method.into(), webhook.url.as_str())
            .headers(headers);

        if webhook.method.has_body() {
            builder = builder.json(payload);
        } else {
            builder = builder.query(&query_pairs(payload));
        }

        builder.build().map_err(|e| WebhookError::Http(e.to_string()))
    }
}

#[async_trait]
impl Delivery for DeliveryExecutor {
    fn spawn(self: Arc<Self>, webhook: Webhook, context: EventContext) {
        tokio::spawn(async move {
            let Ok(_permit) = Arc::clone(&self.permits).acquire_owned().await else {
                return;
            };
            self.deliver(&webhook, &context).await;
        });
    }

    async fn deliver_payload(&self, webhook: &Webhook, payload: Map<String, Value>) {
        self.send(webhook, payload).await;
    }
}

impl std::fmt::Debug for DeliveryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryExecutor")
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

/// Flatten a payload into query parameters: strings verbatim, everything
/// else JSON-encoded.
fn query_pairs(payload: &Map<String, Value>) -> Vec<(String, String)> {
    payload
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}
