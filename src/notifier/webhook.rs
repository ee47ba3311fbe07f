use crate::config::{SourceConfig, WebhookConfig};
use crate::error::DispatchError;
use crate::events::Event;
use crate::notifier::provider::{excerpt, NotificationProvider};
use crate::notifier::transport::{HttpRequest, HttpResponse};
use crate::render::{BuiltinFormat, TemplateSelector};
use serde::Serialize;

/// JSON document posted to a webhook endpoint
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebhookPayload {
    pub title: String,
    pub message: String,
    pub event: Event,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_url: Option<String>,
}

/// Generic HTTP endpoint accepting JSON notifications
///
/// Any 2xx status means the notification was accepted.
#[derive(Debug, Clone)]
pub struct WebhookProvider {
    id: String,
    url: String,
    insecure: bool,
    headers: Vec<(String, String)>,
    template: TemplateSelector,
    source: SourceConfig,
}

impl WebhookProvider {
    pub fn from_config(id: impl Into<String>, config: &WebhookConfig, source: &SourceConfig) -> Self {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        headers.extend(
            config
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        if let Some(token) = config.token.as_deref().filter(|t| !t.trim().is_empty()) {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token.trim())));
        }

        Self {
            id: id.into(),
            url: config.url.trim().to_string(),
            insecure: config.insecure,
            headers,
            template: TemplateSelector::or_builtin(
                config.template.as_deref(),
                BuiltinFormat::Plaintext,
            ),
            source: source.clone(),
        }
    }
}

impl NotificationProvider for WebhookProvider {
    type Payload = WebhookPayload;

    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "webhook"
    }

    fn message_template(&self) -> &TemplateSelector {
        &self.template
    }

    fn build_payload(&self, title: &str, message: &str, event: &Event) -> WebhookPayload {
        WebhookPayload {
            title: title.to_string(),
            message: message.to_string(),
            event: event.clone(),
            snapshot_url: event
                .has_snapshot
                .then(|| self.source.snapshot_url(&event.id)),
        }
    }

    fn request(&self, body: Vec<u8>) -> HttpRequest {
        HttpRequest {
            url: self.url.clone(),
            insecure: self.insecure,
            headers: self.headers.clone(),
            body,
        }
    }

    fn interpret_response(&self, response: &HttpResponse) -> Result<(), DispatchError> {
        if response.is_success() {
            return Ok(());
        }

        let body = excerpt(&response.text(), 200);
        let description = if body.is_empty() {
            format!("HTTP {}", response.status)
        } else {
            format!("HTTP {}: {}", response.status, body)
        };
        Err(DispatchError::ProviderRejected { description })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn source() -> SourceConfig {
        SourceConfig {
            server: "http://nvr:5000".to_string(),
            public_url: "https://cams.example.com/".to_string(),
        }
    }

    fn provider(token: Option<&str>) -> WebhookProvider {
        let mut headers = BTreeMap::new();
        headers.insert("X-Source".to_string(), "camnotify".to_string());
        let config = WebhookConfig {
            url: "https://hooks.example.com/alerts".to_string(),
            token: token.map(str::to_string),
            headers,
            ..WebhookConfig::default()
        };
        WebhookProvider::from_config("webhook-0", &config, &source())
    }

    #[test]
    fn test_request_headers() {
        let request = provider(Some("s3cret")).request(Vec::new());

        assert_eq!(request.url, "https://hooks.example.com/alerts");
        assert_eq!(
            request.headers,
            vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Source".to_string(), "camnotify".to_string()),
                ("Authorization".to_string(), "Bearer s3cret".to_string()),
            ]
        );
    }

    #[test]
    fn test_blank_token_sends_no_authorization() {
        let request = provider(Some("  ")).request(Vec::new());
        assert!(!request.headers.iter().any(|(name, _)| name == "Authorization"));
    }

    #[test]
    fn test_default_template_is_plaintext() {
        assert_eq!(
            provider(None).message_template(),
            &TemplateSelector::Builtin(BuiltinFormat::Plaintext)
        );
    }

    #[test]
    fn test_payload_uses_public_snapshot_url() {
        let event = Event::new("abc", "car", 0.7)
            .with_camera("driveway")
            .with_snapshot(true);
        let provider = provider(None);
        let payload = provider.build_payload("Car", "Car on driveway", &event);
        let json: serde_json::Value =
            serde_json::from_slice(&provider.encode(&payload).unwrap()).unwrap();

        assert_eq!(json["title"], "Car");
        assert_eq!(json["message"], "Car on driveway");
        assert_eq!(json["event"]["id"], "abc");
        assert_eq!(json["event"]["camera"], "driveway");
        assert_eq!(
            json["snapshot_url"],
            "https://cams.example.com/api/events/abc/snapshot.jpg"
        );
    }

    #[test]
    fn test_payload_without_snapshot_omits_url() {
        let event = Event::new("abc", "car", 0.7);
        let payload = provider(None).build_payload("Car", "msg", &event);
        assert!(payload.snapshot_url.is_none());
    }

    #[test]
    fn test_interpret_response() {
        let provider = provider(None);
        assert!(provider
            .interpret_response(&HttpResponse::new(204, ""))
            .is_ok());
        // Body content is irrelevant for webhooks
        assert!(provider
            .interpret_response(&HttpResponse::new(200, r#"{"error":"x"}"#))
            .is_ok());
        assert_eq!(
            provider.interpret_response(&HttpResponse::new(403, "")),
            Err(DispatchError::ProviderRejected {
                description: "HTTP 403".to_string()
            })
        );
        assert_eq!(
            provider.interpret_response(&HttpResponse::new(500, "internal failure")),
            Err(DispatchError::ProviderRejected {
                description: "HTTP 500: internal failure".to_string()
            })
        );
    }
}
