//! Template rendering and the payload contract.
//!
//! Operator-authored body templates are rendered with a sandboxed,
//! logic-light engine (Handlebars): variable interpolation plus a small
//! helper set, no arbitrary code execution. The rendered text must parse
//! as a single JSON object: the system's correctness boundary against
//! malformed operator configuration. Violations degrade to a logged
//! failure; they never become a malformed outbound request.

use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use serde_json::{Map, Value};

use crate::context::EventContext;
use crate::error::{WebhookError, WebhookResult};
use crate::model::Webhook;

/// JSON-encode a value: `{{json details}}`, or `{{json details true}}`
/// for pretty-printing.
fn json_helper(
    h: &Helper<'_>,
    _r: &Handlebars<'_>,
    _ctx: &Context,
    _rc: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let value = h.param(0).map_or(&Value::Null, |p| p.value());
    let pretty = h.param(1).is_some_and(|p| p.value().as_bool() == Some(true));
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .unwrap_or_else(|_| "null".to_string());
    out.write(&text)?;
    Ok(())
}

/// Format an RFC 3339 timestamp: `{{date timestamp "%Y-%m-%d %H:%M"}}`.
/// Unparsable input passes through unchanged.
fn date_helper(
    h: &Helper<'_>,
    _r: &Handlebars<'_>,
    _ctx: &Context,
    _rc: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let raw = h
        .param(0)
        .and_then(|p| p.value().as_str())
        .unwrap_or_default();
    let format = h
        .param(1)
        .and_then(|p| p.value().as_str())
        .unwrap_or("%Y-%m-%d %H:%M:%S");
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => out.write(&dt.format(format).to_string())?,
        Err(_) => out.write(raw)?,
    }
    Ok(())
}

/// Fall back when a value is null or an empty string:
/// `{{default user "anonymous"}}`.
fn default_helper(
    h: &Helper<'_>,
    _r: &Handlebars<'_>,
    _ctx: &Context,
    _rc: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let value = h.param(0).map_or(&Value::Null, |p| p.value());
    let fallback = h.param(1).map_or(&Value::Null, |p| p.value());
    let chosen = match value {
        Value::Null => fallback,
        Value::String(s) if s.is_empty() => fallback,
        other => other,
    };
    match chosen {
        Value::String(s) => out.write(s)?,
        other => out.write(&other.to_string())?,
    }
    Ok(())
}

/// Renders webhook body templates and enforces the payload contract.
pub struct TemplateRenderer {
    engine: Handlebars<'static>,
}

impl TemplateRenderer {
    /// Create a renderer with the `json`, `date`, and `default` helpers.
    #[must_use]
    pub fn new() -> Self {
        let mut engine = Handlebars::new();
        // Output is JSON, not HTML.
        engine.register_escape_fn(handlebars::no_escape);
        engine.register_helper("json", Box::new(json_helper));
        engine.register_helper("date", Box::new(date_helper));
        engine.register_helper("default", Box::new(default_helper));
        Self { engine }
    }

    /// Render the webhook's body for `context`.
    ///
    /// With no configured template the context itself is serialized.
    /// Otherwise the template is rendered to text, which must parse as a
    /// single JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Template`] for template syntax or
    /// evaluation errors and [`WebhookError::ContractViolation`] when the
    /// rendered text is not a JSON object. Both abort the send; neither is
    /// retried.
    pub fn render(
        &self,
        webhook: &Webhook,
        context: &EventContext,
    ) -> WebhookResult<Map<String, Value>> {
        if webhook.body_template.trim().is_empty() {
            return match serde_json::to_value(context) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(other) => Err(WebhookError::ContractViolation {
                    rendered: other.to_string(),
                }),
                Err(e) => Err(WebhookError::SerializationError(e.to_string())),
            };
        }

        let rendered = self
            .engine
            .render_template(&webhook.body_template, context)
            .map_err(|e| WebhookError::Template(e.to_string()))?;

        match serde_json::from_str::<Value>(&rendered) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(WebhookError::ContractViolation { rendered }),
        }
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRenderer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_audit::EventKind;
    use serde_json::json;

    fn context() -> EventContext {
        EventContext {
            event: EventKind::new("DOS_DETECTED", "Denial-of-service attack detected"),
            user: None,
            device: Some(sentra_core::Device::new("203.0.113.7".parse().unwrap())),
            details: json!({ "ip_address": "203.0.113.7", "path": "/api/data" }),
            timestamp: "2026-03-01T12:30:45+00:00".to_string(),
            instance: None,
        }
    }

    fn hook(template: &str) -> Webhook {
        Webhook::new("hook", "https://example.com/in").with_template(template)
    }

    #[test]
    fn test_empty_template_serializes_context() {
        let renderer = TemplateRenderer::new();
        let payload = renderer.render(&hook(""), &context()).unwrap();
        assert_eq!(payload["event"]["identifier"], "DOS_DETECTED");
        assert_eq!(payload["timestamp"], "2026-03-01T12:30:45+00:00");
    }

    #[test]
    fn test_template_renders_object() {
        let renderer = TemplateRenderer::new();
        let webhook = hook(r#"{"source": "{{device.ip_address}}", "kind": "{{event.identifier}}"}"#);
        let payload = renderer.render(&webhook, &context()).unwrap();
        assert_eq!(payload["source"], "203.0.113.7");
        assert_eq!(payload["kind"], "DOS_DETECTED");
    }

    #[test]
    fn test_json_helper_embeds_details() {
        let renderer = TemplateRenderer::new();
        let webhook = hook(r#"{"details": {{json details}}}"#);
        let payload = renderer.render(&webhook, &context()).unwrap();
        assert_eq!(payload["details"]["path"], "/api/data");
    }

    #[test]
    fn test_date_helper_formats() {
        let renderer = TemplateRenderer::new();
        let webhook = hook(r#"{"day": "{{date timestamp "%Y-%m-%d"}}"}"#);
        let payload = renderer.render(&webhook, &context()).unwrap();
        assert_eq!(payload["day"], "2026-03-01");
    }

    #[test]
    fn test_default_helper_falls_back() {
        let renderer = TemplateRenderer::new();
        let webhook = hook(r#"{"who": "{{default user "anonymous"}}"}"#);
        let payload = renderer.render(&webhook, &context()).unwrap();
        assert_eq!(payload["who"], "anonymous");
    }

    #[test]
    fn test_array_result_violates_contract() {
        let renderer = TemplateRenderer::new();
        let webhook = hook(r#"[{"kind": "{{event.identifier}}"}]"#);
        let err = renderer.render(&webhook, &context()).unwrap_err();
        assert!(matches!(err, WebhookError::ContractViolation { .. }));
    }

    #[test]
    fn test_scalar_result_violates_contract() {
        let renderer = TemplateRenderer::new();
        let err = renderer.render(&hook("42"), &context()).unwrap_err();
        assert!(matches!(err, WebhookError::ContractViolation { .. }));
    }

    #[test]
    fn test_unparsable_result_violates_contract() {
        let renderer = TemplateRenderer::new();
        let webhook = hook("plain text, not JSON");
        let err = renderer.render(&webhook, &context()).unwrap_err();
        assert!(matches!(err, WebhookError::ContractViolation { .. }));
    }

    #[test]
    fn test_syntax_error_reported() {
        let renderer = TemplateRenderer::new();
        let webhook = hook(r#"{"broken": "{{#if}}"}"#);
        let err = renderer.render(&webhook, &context()).unwrap_err();
        assert!(matches!(err, WebhookError::Template(_)));
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let renderer = TemplateRenderer::new();
        let webhook = hook(r#"{"who": "{{no_such_field}}"}"#);
        let payload = renderer.render(&webhook, &context()).unwrap();
        assert_eq!(payload["who"], "");
    }
}
