//! Provider dispatch
//!
//! One dispatch renders, encodes, sends and interprets a single notification
//! for a single provider, then records the outcome in the status store. Every
//! failure stays local to that provider.

use crate::error::DispatchError;
use crate::events::Event;
use crate::notifier::provider::NotificationProvider;
use crate::notifier::status::DeliveryStatusStore;
use crate::notifier::transport::HttpTransport;
use crate::render::{render, RenderPurpose, TemplateSelector};
use log::{debug, info, warn};
use std::sync::Arc;

/// Outcome of one provider dispatch
pub type DispatchResult = Result<(), DispatchError>;

/// Sends provider payloads and tracks their delivery status
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn HttpTransport>,
    status: Arc<DeliveryStatusStore>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn HttpTransport>, status: Arc<DeliveryStatusStore>) -> Self {
        Self { transport, status }
    }

    pub fn status(&self) -> &Arc<DeliveryStatusStore> {
        &self.status
    }

    /// Render the event for `provider` and dispatch it
    ///
    /// Template errors are recorded as a failed delivery without any network
    /// call.
    pub async fn notify<P: NotificationProvider>(
        &self,
        provider: &P,
        event: &Event,
        title: &TemplateSelector,
    ) -> DispatchResult {
        let rendered = render(title, event, RenderPurpose::Title).and_then(|title| {
            render(provider.message_template(), event, RenderPurpose::Message)
                .map(|message| (title, message))
        });

        match rendered {
            Ok((title, message)) => {
                let payload = provider.build_payload(&title, &message, event);
                self.dispatch(provider, &event.id, &payload).await
            }
            Err(e) => self.finish(provider, &event.id, Err(e.into())),
        }
    }

    /// Encode, send and interpret one payload
    ///
    /// Encoding failures never reach the network. Any received response is
    /// handed to the provider, whatever its HTTP status.
    pub async fn dispatch<P: NotificationProvider>(
        &self,
        provider: &P,
        event_id: &str,
        payload: &P::Payload,
    ) -> DispatchResult {
        let body = match provider.encode(payload) {
            Ok(body) => body,
            Err(e) => return self.finish(provider, event_id, Err(e)),
        };

        let request = provider.request(body);
        debug!(
            "Posting notification: provider={} event_id={} bytes={}",
            provider.id(),
            event_id,
            request.body.len()
        );

        let result = match self.transport.post(&request).await {
            Ok(response) => provider.interpret_response(&response),
            Err(e) => Err(DispatchError::Transport(e)),
        };

        self.finish(provider, event_id, result)
    }

    fn finish<P: NotificationProvider>(
        &self,
        provider: &P,
        event_id: &str,
        result: DispatchResult,
    ) -> DispatchResult {
        match &result {
            Ok(()) => {
                info!(
                    "Alert sent: provider={} ({}) event_id={}",
                    provider.id(),
                    provider.kind(),
                    event_id
                );
                self.status.record_success(provider.id());
            }
            Err(e) => {
                warn!(
                    "Unable to send alert: provider={} ({}) event_id={}: {}",
                    provider.id(),
                    provider.kind(),
                    event_id,
                    e
                );
                self.status.record_failure(provider.id(), e.status_message());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GotifyConfig, SourceConfig};
    use crate::error::TransportError;
    use crate::notifier::gotify::GotifyProvider;
    use crate::notifier::status::DeliveryState;
    use crate::notifier::transport::stub::StubTransport;
    use crate::notifier::transport::{HttpRequest, HttpResponse};
    use serde::ser::Error as _;
    use serde::{Serialize, Serializer};

    const ENDPOINT: &str = "https://push.example.com/message";

    fn gotify(template: Option<&str>) -> GotifyProvider {
        let config = GotifyConfig {
            server: "https://push.example.com".to_string(),
            token: "token".to_string(),
            template: template.map(str::to_string),
            ..GotifyConfig::default()
        };
        let source = SourceConfig {
            server: "http://nvr.local:5000".to_string(),
            public_url: String::new(),
        };
        GotifyProvider::from_config("gotify-0", &config, &source).unwrap()
    }

    fn dispatcher(transport: Arc<StubTransport>) -> Dispatcher {
        Dispatcher::new(transport, Arc::new(DeliveryStatusStore::new()))
    }

    fn event() -> Event {
        Event::new("123", "person", 0.92)
            .with_camera("front")
            .with_snapshot(true)
    }

    fn default_title() -> TemplateSelector {
        TemplateSelector::Custom("Camera Alert".to_string())
    }

    #[tokio::test]
    async fn test_successful_send_records_ok() {
        let transport = Arc::new(StubTransport::new().respond(
            ENDPOINT,
            Ok(HttpResponse::new(200, r#"{"id":7,"message":"ok"}"#)),
        ));
        let dispatcher = dispatcher(Arc::clone(&transport));

        let result = dispatcher
            .notify(&gotify(None), &event(), &default_title())
            .await;

        assert!(result.is_ok());
        let status = dispatcher.status().get("gotify-0").unwrap();
        assert_eq!(status.state, DeliveryState::Ok);
        assert!(status.last_error.is_none());

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["title"], "Camera Alert");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .ends_with("![](http://nvr.local:5000/api/events/123/snapshot.jpg)"));
    }

    #[tokio::test]
    async fn test_error_envelope_on_http_200_records_failure() {
        let transport = Arc::new(StubTransport::new().respond(
            ENDPOINT,
            Ok(HttpResponse::new(
                200,
                r#"{"error":"Unauthorized","errorCode":401,"errorDescription":"invalid token"}"#,
            )),
        ));
        let dispatcher = dispatcher(transport);

        let result = dispatcher
            .notify(&gotify(None), &event(), &default_title())
            .await;

        assert!(matches!(result, Err(DispatchError::ProviderRejected { .. })));
        let status = dispatcher.status().get("gotify-0").unwrap();
        assert_eq!(status.state, DeliveryState::Failed);
        assert_eq!(status.last_error.as_deref(), Some("invalid token"));
    }

    #[tokio::test]
    async fn test_transport_failure_records_failure() {
        let transport =
            Arc::new(StubTransport::new().respond(ENDPOINT, Err(TransportError::Timeout)));
        let dispatcher = dispatcher(transport);

        let result = dispatcher
            .notify(&gotify(None), &event(), &default_title())
            .await;

        assert_eq!(
            result,
            Err(DispatchError::Transport(TransportError::Timeout))
        );
        let status = dispatcher.status().get("gotify-0").unwrap();
        assert_eq!(status.state, DeliveryState::Failed);
        assert_eq!(
            status.last_error.as_deref(),
            Some("Transport error: Request timed out")
        );
    }

    #[tokio::test]
    async fn test_template_error_skips_network() {
        let transport = Arc::new(StubTransport::new());
        let dispatcher = dispatcher(Arc::clone(&transport));

        let result = dispatcher
            .notify(&gotify(Some("{{ nope }}")), &event(), &default_title())
            .await;

        assert!(matches!(result, Err(DispatchError::Template(_))));
        assert!(transport.requests().is_empty());
        assert_eq!(
            dispatcher.status().get("gotify-0").unwrap().state,
            DeliveryState::Failed
        );
    }

    #[tokio::test]
    async fn test_success_after_failure_clears_error() {
        let failing = Arc::new(StubTransport::new().respond(ENDPOINT, Err(TransportError::Timeout)));
        let status = Arc::new(DeliveryStatusStore::new());
        let provider = gotify(None);

        Dispatcher::new(failing, Arc::clone(&status))
            .notify(&provider, &event(), &default_title())
            .await
            .unwrap_err();
        assert_eq!(status.get("gotify-0").unwrap().state, DeliveryState::Failed);

        Dispatcher::new(Arc::new(StubTransport::new()), Arc::clone(&status))
            .notify(&provider, &event(), &default_title())
            .await
            .unwrap();
        let current = status.get("gotify-0").unwrap();
        assert_eq!(current.state, DeliveryState::Ok);
        assert!(current.last_error.is_none());
    }

    /// Payload whose serialization always fails
    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("payload cannot be encoded"))
        }
    }

    struct BrokenProvider {
        template: TemplateSelector,
    }

    impl NotificationProvider for BrokenProvider {
        type Payload = Unencodable;

        fn id(&self) -> &str {
            "broken"
        }

        fn kind(&self) -> &'static str {
            "test"
        }

        fn message_template(&self) -> &TemplateSelector {
            &self.template
        }

        fn build_payload(&self, _title: &str, _message: &str, _event: &Event) -> Unencodable {
            Unencodable
        }

        fn request(&self, body: Vec<u8>) -> HttpRequest {
            HttpRequest {
                url: "http://unused".to_string(),
                insecure: false,
                headers: Vec::new(),
                body,
            }
        }

        fn interpret_response(&self, _response: &HttpResponse) -> DispatchResult {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_encoding_failure_makes_no_request() {
        let transport = Arc::new(StubTransport::new());
        let dispatcher = dispatcher(Arc::clone(&transport));
        let provider = BrokenProvider {
            template: TemplateSelector::Custom("{{ label }}".to_string()),
        };

        let result = dispatcher.dispatch(&provider, "123", &Unencodable).await;

        assert!(matches!(result, Err(DispatchError::Encoding(_))));
        assert!(transport.requests().is_empty());
        let status = dispatcher.status().get("broken").unwrap();
        assert_eq!(status.state, DeliveryState::Failed);
        assert!(status
            .last_error
            .unwrap()
            .contains("payload cannot be encoded"));
    }
}
