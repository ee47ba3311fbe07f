/// Error types for filtering, rendering and dispatch
pub mod error;

/// Camera detection events
pub mod events;

/// Configuration management
pub mod config;

/// Event filter rules and pipeline
pub mod filters;

/// Notification message rendering
pub mod render;

/// Notification providers, dispatch and delivery status
pub mod notifier;

// Re-export commonly used types
pub use error::{ConfigError, DispatchError, TemplateError, TransportError};
pub use events::Event;
