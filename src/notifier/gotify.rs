//! Gotify push notifications
//!
//! Messages are posted to `{server}/message?token=...` as JSON. Gotify reports
//! rejected requests with an error envelope in the body, so every response is
//! checked for it regardless of its HTTP status.

use crate::config::{GotifyConfig, SourceConfig};
use crate::error::{ConfigError, DispatchError};
use crate::events::Event;
use crate::notifier::provider::{excerpt, NotificationProvider};
use crate::notifier::transport::{HttpRequest, HttpResponse};
use crate::render::{BuiltinFormat, TemplateSelector};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Substring identifying Gotify's error envelope in a non-JSON response body
const ERROR_MARKER: &str = "\"error\"";

/// Message format for the Gotify API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GotifyPayload {
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub title: String,
    pub priority: u8,
    pub extras: GotifyExtras,
}

/// Client hints understood by Gotify apps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GotifyExtras {
    #[serde(rename = "client::display")]
    pub client_display: ClientDisplay,
    #[serde(rename = "client::notification")]
    pub client_notification: ClientNotification,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientDisplay {
    #[serde(rename = "contentType")]
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientNotification {
    #[serde(rename = "bigImageUrl")]
    pub big_image_url: String,
}

/// Error envelope returned by Gotify
#[derive(Debug, Default, Deserialize)]
struct GotifyError {
    #[serde(default)]
    error: String,
    #[serde(default, rename = "errorCode")]
    error_code: u16,
    #[serde(default, rename = "errorDescription")]
    error_description: String,
}

/// Gotify server instance
#[derive(Debug, Clone)]
pub struct GotifyProvider {
    id: String,
    endpoint: String,
    insecure: bool,
    priority: u8,
    template: TemplateSelector,
    source: SourceConfig,
}

impl GotifyProvider {
    /// Create a provider from its configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the server address is not a
    /// valid URL.
    pub fn from_config(
        id: impl Into<String>,
        config: &GotifyConfig,
        source: &SourceConfig,
    ) -> Result<Self, ConfigError> {
        let id = id.into();
        let base = format!("{}/message", config.server.trim().trim_end_matches('/'));
        let endpoint = Url::parse_with_params(&base, &[("token", config.token.as_str())])
            .map_err(|e| {
                ConfigError::ValidationError(format!("{}: invalid server URL: {}", id, e))
            })?;

        Ok(Self {
            id,
            endpoint: endpoint.to_string(),
            insecure: config.insecure,
            priority: config.priority,
            template: TemplateSelector::or_builtin(
                config.template.as_deref(),
                BuiltinFormat::Markdown,
            ),
            source: source.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl NotificationProvider for GotifyProvider {
    type Payload = GotifyPayload;

    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "gotify"
    }

    fn message_template(&self) -> &TemplateSelector {
        &self.template
    }

    fn build_payload(&self, title: &str, message: &str, event: &Event) -> GotifyPayload {
        let snapshot_url = self.source.snapshot_url(&event.id);
        let mut message = message.to_string();

        if event.has_snapshot {
            message.push_str(&format!("\n\n![]({})", snapshot_url));
        }

        GotifyPayload {
            message,
            title: title.to_string(),
            priority: self.priority,
            extras: GotifyExtras {
                client_display: ClientDisplay {
                    content_type: "text/markdown".to_string(),
                },
                client_notification: ClientNotification {
                    big_image_url: snapshot_url,
                },
            },
        }
    }

    fn request(&self, body: Vec<u8>) -> HttpRequest {
        HttpRequest {
            url: self.endpoint.clone(),
            insecure: self.insecure,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body,
        }
    }

    fn interpret_response(&self, response: &HttpResponse) -> Result<(), DispatchError> {
        let text = response.text();

        if let Some(envelope) = error_envelope(&response.body, &text) {
            let description = if !envelope.error_description.is_empty() {
                envelope.error_description
            } else if !envelope.error.is_empty() {
                envelope.error
            } else {
                excerpt(&text, 200)
            };
            log::debug!(
                "Gotify rejected message: provider={} code={} status={}",
                self.id,
                envelope.error_code,
                response.status
            );
            return Err(DispatchError::ProviderRejected { description });
        }

        if !response.is_success() {
            return Err(DispatchError::ProviderRejected {
                description: format!("HTTP {}: {}", response.status, excerpt(&text, 200)),
            });
        }

        Ok(())
    }
}

/// Extract the error envelope from a response body, if it carries one
///
/// JSON bodies are rejections only when they have a top-level `error` key,
/// so a message echo whose title or text is "error" is still a success.
/// Bodies that are not JSON fall back to the marker substring.
fn error_envelope(body: &[u8], text: &str) -> Option<GotifyError> {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) if map.contains_key("error") => {
            Some(serde_json::from_value(serde_json::Value::Object(map)).unwrap_or_default())
        }
        Ok(_) => None,
        Err(_) if text.contains(ERROR_MARKER) => Some(GotifyError::default()),
        Err(_) => None,
    }
}
