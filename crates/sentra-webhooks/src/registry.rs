//! Webhook registry storage.

use std::sync::Arc;

use async_trait::async_trait;
use sentra_core::{Timestamp, WebhookId};
use sentra_storage::{KvStore, MemoryKvStore};

use crate::error::{WebhookError, WebhookResult};
use crate::model::Webhook;

const NS_WEBHOOKS: &str = "webhooks";

/// Durable webhook configuration store.
///
/// Written by the operator surface, read by the dispatch decision engine
/// on every event.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// Create or update a webhook, bumping its modification time.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidUrl`] if the target URL does not
    /// parse, or a storage error if the write fails.
    async fn upsert(&self, webhook: Webhook) -> WebhookResult<Webhook>;

    /// Look up a webhook by id.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    async fn get(&self, id: &WebhookId) -> WebhookResult<Option<Webhook>>;

    /// Delete a webhook. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn remove(&self, id: &WebhookId) -> WebhookResult<bool>;

    /// All configured webhooks.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    async fn list(&self) -> WebhookResult<Vec<Webhook>>;

    /// Active webhooks triggered by `identifier`.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    async fn matching(&self, identifier: &str) -> WebhookResult<Vec<Webhook>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|w| w.is_triggered_by(identifier))
            .collect())
    }
}

/// KV-backed webhook store.
pub struct KvWebhookStore {
    store: Arc<dyn KvStore>,
}

impl KvWebhookStore {
    /// Wrap an existing KV store.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Create a store over a fresh in-memory backend (for testing).
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKvStore::new()))
    }
}

impl std::fmt::Debug for KvWebhookStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvWebhookStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl WebhookStore for KvWebhookStore {
    async fn upsert(&self, webhook: Webhook) -> WebhookResult<Webhook> {
        url::Url::parse(&webhook.url).map_err(|e| {
            WebhookError::InvalidUrl(format!("{url}: {e}", url = webhook.url))
        })?;

        let mut webhook = webhook;
        webhook.updated_at = Timestamp::now();

        let bytes = serde_json::to_vec(&webhook)
            .map_err(|e| WebhookError::SerializationError(e.to_string()))?;
        self.store
            .set(NS_WEBHOOKS, &webhook.id.0.to_string(), bytes)
            .await?;
        Ok(webhook)
    }

    async fn get(&self, id: &WebhookId) -> WebhookResult<Option<Webhook>> {
        match self.store.get(NS_WEBHOOKS, &id.0.to_string()).await? {
            Some(bytes) => {
                let webhook = serde_json::from_slice(&bytes)
                    .map_err(|e| WebhookError::SerializationError(e.to_string()))?;
                Ok(Some(webhook))
            },
            None => Ok(None),
        }
    }

    async fn remove(&self, id: &WebhookId) -> WebhookResult<bool> {
        Ok(self.store.delete(NS_WEBHOOKS, &id.0.to_string()).await?)
    }

    async fn list(&self) -> WebhookResult<Vec<Webhook>> {
        let mut webhooks = Vec::new();
        for key in self.store.list_keys(NS_WEBHOOKS).await? {
            if let Some(bytes) = self.store.get(NS_WEBHOOKS, &key).await? {
                let webhook = serde_json::from_slice(&bytes)
                    .map_err(|e| WebhookError::SerializationError(e.to_string()))?;
                webhooks.push(webhook);
            }
        }
        Ok(webhooks)
    }
}
