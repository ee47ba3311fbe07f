use thiserror::Error;

/// Errors that can occur while rendering a notification template
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown placeholder '{0}'")]
    UnknownPlaceholder(String),

    #[error("Empty placeholder at offset {0}")]
    EmptyPlaceholder(usize),

    #[error("Unterminated placeholder starting at offset {0}")]
    Unterminated(usize),
}

/// Errors raised by the HTTP transport before any response was received
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Errors that abort a single provider dispatch
///
/// Every variant is local to one provider and one event; none of them
/// affect filtering or dispatch to other providers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Unable to encode payload: {0}")]
    Encoding(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Provider rejected notification: {description}")]
    ProviderRejected { description: String },

    #[error("Dispatch task failed: {0}")]
    TaskFailed(String),
}

impl DispatchError {
    /// Description recorded in the delivery status tracker
    pub fn status_message(&self) -> String {
        match self {
            DispatchError::ProviderRejected { description } => description.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Encoding(err.to_string())
    }
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_rejected_status_message_is_bare_description() {
        let err = DispatchError::ProviderRejected {
            description: "invalid token".to_string(),
        };
        assert_eq!(err.status_message(), "invalid token");
        assert_eq!(
            err.to_string(),
            "Provider rejected notification: invalid token"
        );
    }

    #[test]
    fn test_transport_status_message_includes_kind() {
        let err = DispatchError::from(TransportError::Timeout);
        assert_eq!(err.status_message(), "Transport error: Request timed out");
    }

    #[test]
    fn test_task_failure_status_message() {
        let err = DispatchError::TaskFailed("task 3 panicked".to_string());
        assert_eq!(err.status_message(), "Dispatch task failed: task 3 panicked");
    }

    #[test]
    fn test_config_errors_name_their_source() {
        let read = ConfigError::ReadError("/etc/camnotify.toml: not found".to_string());
        assert_eq!(
            read.to_string(),
            "Failed to read config file: /etc/camnotify.toml: not found"
        );

        let toml_err = toml::from_str::<toml::Value>("a = ").unwrap_err();
        let err: ConfigError = toml_err.into();
        assert!(matches!(err, ConfigError::TomlError(_)));
        assert!(err.to_string().starts_with("TOML parse error: "));
    }

    #[test]
    fn test_template_error_converts_into_dispatch_error() {
        let err: DispatchError = TemplateError::UnknownPlaceholder("foo".to_string()).into();
        assert!(matches!(err, DispatchError::Template(_)));
        assert!(err.to_string().contains("foo"));
    }
}
