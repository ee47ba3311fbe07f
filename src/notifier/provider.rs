use crate::error::DispatchError;
use crate::events::Event;
use crate::notifier::transport::{HttpRequest, HttpResponse};
use crate::render::TemplateSelector;
use serde::Serialize;

/// Trait for notification destinations
///
/// A provider knows how to shape its wire payload, where to send it and how
/// to read the reply. The dispatcher drives these steps in order and never
/// needs to know which provider it is talking to.
pub trait NotificationProvider: Send + Sync {
    /// Wire payload of this provider
    type Payload: Serialize + Send + Sync;

    /// Instance identifier used for logging and delivery status
    fn id(&self) -> &str;

    /// Provider type name, e.g. "gotify"
    fn kind(&self) -> &'static str;

    /// Template used for the message body
    fn message_template(&self) -> &TemplateSelector;

    /// Build the payload from the rendered title and message
    fn build_payload(&self, title: &str, message: &str, event: &Event) -> Self::Payload;

    /// Serialize the payload for the wire
    fn encode(&self, payload: &Self::Payload) -> Result<Vec<u8>, DispatchError> {
        Ok(serde_json::to_vec(payload)?)
    }

    /// Build the outbound request carrying an encoded payload
    fn request(&self, body: Vec<u8>) -> HttpRequest;

    /// Decide whether a received response means the notification was accepted
    ///
    /// Called for every response, whatever its HTTP status, so providers that
    /// report failures in the body can be handled.
    fn interpret_response(&self, response: &HttpResponse) -> Result<(), DispatchError>;
}

/// Shorten provider response text for inclusion in error descriptions
pub(crate) fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
