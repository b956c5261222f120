//! The webhook configuration model.

use std::collections::{BTreeMap, BTreeSet};

use sentra_core::{Timestamp, WebhookId};
use serde::{Deserialize, Serialize};

/// HTTP method used for delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// POST (payload as JSON body).
    #[default]
    Post,
    /// GET (payload as query parameters).
    Get,
    /// PUT (payload as JSON body).
    Put,
    /// PATCH (payload as JSON body).
    Patch,
    /// DELETE (payload as query parameters).
    Delete,
}

impl HttpMethod {
    /// Whether this method carries the payload in the request body.
    #[must_use]
    pub fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Post => "POST",
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        };
        write!(f, "{name}")
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Post => Self::POST,
            HttpMethod::Get => Self::GET,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Patch => Self::PATCH,
            HttpMethod::Delete => Self::DELETE,
        }
    }
}

/// What happens to events arriving inside an open rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RateLimitAction {
    /// Queue events and deliver each individually when the window closes.
    #[default]
    Queue,
    /// Merge the queued events into one payload, bounded by the coalesce
    /// text limit (oldest events dropped when it is exceeded).
    Coalesce,
}

/// Default bound, in characters, on a coalesced payload.
pub const DEFAULT_COALESCE_TEXT_LIMIT: usize = 8000;

/// A notification destination configuration.
///
/// Owned entirely by the operator; the dispatch engine reads it on every
/// event. `body_template` empty means "serialize the event context as-is".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    /// Unique webhook identifier.
    pub id: WebhookId,
    /// Operator-facing name, used in log lines.
    pub name: String,
    /// Inactive webhooks are never matched.
    pub is_active: bool,
    /// Identifiers of the event kinds that trigger this webhook.
    pub triggers: BTreeSet<String>,
    /// Target URL.
    pub url: String,
    /// HTTP method for delivery.
    pub method: HttpMethod,
    /// Extra request headers, overlaid on the defaults.
    pub headers: BTreeMap<String, String>,
    /// Body template; empty for the default context serialization.
    pub body_template: String,
    /// Rate-limit window length in seconds. `0` disables rate limiting.
    pub rate_limit_seconds: u64,
    /// What to do with events queued during a window.
    pub rate_limit_action: RateLimitAction,
    /// Bound, in characters, on a coalesced payload.
    pub coalesce_text_limit: usize,
    /// When this webhook was created.
    pub created_at: Timestamp,
    /// When this webhook was last modified.
    pub updated_at: Timestamp,
}

impl Webhook {
    /// Create an active POST webhook with no triggers and no rate limit.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id: WebhookId::new(),
            name: name.into(),
            is_active: true,
            triggers: BTreeSet::new(),
            url: url.into(),
            method: HttpMethod::default(),
            headers: BTreeMap::new(),
            body_template: String::new(),
            rate_limit_seconds: 0,
            rate_limit_action: RateLimitAction::default(),
            coalesce_text_limit: DEFAULT_COALESCE_TEXT_LIMIT,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a triggering event identifier.
    #[must_use]
    pub fn with_trigger(mut self, identifier: impl Into<String>) -> Self {
        self.triggers.insert(identifier.into());
        self
    }

    /// Set the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Set a request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body template.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.body_template = template.into();
        self
    }

    /// Set the rate-limit window and action.
    #[must_use]
    pub fn with_rate_limit(mut self, seconds: u64, action: RateLimitAction) -> Self {
        self.rate_limit_seconds = seconds;
        self.rate_limit_action = action;
        self
    }

    /// Whether an occurrence of `identifier` triggers this webhook.
    #[must_use]
    pub fn is_triggered_by(&self, identifier: &str) -> bool {
        self.is_active && self.triggers.contains(identifier)
    }
}

impl std::fmt::Display for Webhook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
