/// Provider dispatch and status recording
pub mod dispatch;

/// Gotify push server provider
pub mod gotify;

/// Provider fan-out for admitted events
pub mod manager;

/// Notification provider trait
pub mod provider;

/// Per-provider delivery status
pub mod status;

/// HTTP transport abstraction
pub mod transport;

/// Generic JSON webhook provider
pub mod webhook;

pub use dispatch::{DispatchResult, Dispatcher};
pub use gotify::{GotifyPayload, GotifyProvider};
pub use manager::{ConfiguredProvider, DeliveryReport, NotificationManager};
pub use provider::NotificationProvider;
pub use status::{DeliveryState, DeliveryStatusStore, ProviderDeliveryStatus};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use webhook::{WebhookPayload, WebhookProvider};
