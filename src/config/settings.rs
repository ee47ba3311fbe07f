use crate::error::ConfigError;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Application configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Surveillance system the events come from
    pub source: SourceConfig,
    /// Outbound HTTP settings shared by all providers
    pub http: HttpConfig,
    /// Settings shared by every notification
    pub general: GeneralConfig,
    /// Rules deciding which events produce notifications
    pub filters: FilterConfig,
    /// Gotify server instances
    pub gotify: Vec<GotifyConfig>,
    /// Generic JSON webhook instances
    pub webhook: Vec<WebhookConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// Internal address of the surveillance server, e.g. "http://nvr:5000"
    pub server: String,
    /// Externally reachable address used in links sent to clients
    pub public_url: String,
}

impl SourceConfig {
    /// Base URL used for links embedded in notifications
    ///
    /// Prefers the public URL and falls back to the server address.
    pub fn link_base(&self) -> &str {
        let base = if self.public_url.trim().is_empty() {
            &self.server
        } else {
            &self.public_url
        };
        base.trim().trim_end_matches('/')
    }

    /// URL of the snapshot image for an event
    pub fn snapshot_url(&self, event_id: &str) -> String {
        format!("{}/api/events/{}/snapshot.jpg", self.link_base(), event_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Upper bound for a single provider request
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_seconds: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Title template, or a built-in format name for the default title
    pub title: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            title: "Camera Alert".to_string(),
        }
    }
}

/// Operator rules evaluated against every incoming event
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    /// Window during which no notifications are generated
    pub quiet: Option<QuietHours>,
    pub zones: ZoneFilter,
    pub labels: LabelFilter,
    pub sublabels: ListPolicy,
}

/// Time-of-day window, spanning midnight when `end` is before `start`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuietHours {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl QuietHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn spans_midnight(&self) -> bool {
        self.end < self.start
    }

    /// Whether `now` falls in `[start, end)`
    pub fn contains(&self, now: NaiveTime) -> bool {
        if self.spans_midnight() {
            now >= self.start || now < self.end
        } else {
            now >= self.start && now < self.end
        }
    }
}

/// What to do with events that are not inside any zone
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnzonedAction {
    #[default]
    Allow,
    Drop,
}

/// Block/allow list pair
///
/// The block list always wins. An empty allow list places no restriction;
/// a non-empty one is exhaustive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListPolicy {
    pub allow: Vec<String>,
    pub block: Vec<String>,
}

/// Outcome of checking one value against a [`ListPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListVerdict {
    Allowed,
    Blocked,
    NotAllowed,
}

impl ListPolicy {
    pub fn new<I, J, S, T>(allow: I, block: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            allow: allow.into_iter().map(Into::into).collect(),
            block: block.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_blocked(&self, value: &str) -> bool {
        self.block.iter().any(|b| b == value)
    }

    pub fn is_allow_listed(&self, value: &str) -> bool {
        self.allow.iter().any(|a| a == value)
    }

    pub fn restricts(&self) -> bool {
        !self.allow.is_empty()
    }

    /// Check a single value: block list first, then the allow list
    pub fn check(&self, value: &str) -> ListVerdict {
        if self.is_blocked(value) {
            ListVerdict::Blocked
        } else if !self.restricts() || self.is_allow_listed(value) {
            ListVerdict::Allowed
        } else {
            ListVerdict::NotAllowed
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ZoneFilter {
    pub unzoned: UnzonedAction,
    #[serde(flatten)]
    pub lists: ListPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LabelFilter {
    #[serde(flatten)]
    pub lists: ListPolicy,
    /// Minimum detection score, in percent
    pub min_score: f64,
}

/// Gotify push server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GotifyConfig {
    pub enabled: bool,
    /// Stable name used in logs and delivery status; defaults to "gotify-<index>"
    pub name: Option<String>,
    pub server: String,
    pub token: String,
    /// Skip TLS certificate verification
    pub insecure: bool,
    /// Message template or built-in format name
    pub template: Option<String>,
    pub priority: u8,
}

impl Default for GotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: None,
            server: String::new(),
            token: String::new(),
            insecure: false,
            template: None,
            priority: 5,
        }
    }
}

impl GotifyConfig {
    pub fn instance_id(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("gotify-{}", index))
    }
}

/// Generic HTTP endpoint receiving a JSON document per notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: bool,
    /// Stable name used in logs and delivery status; defaults to "webhook-<index>"
    pub name: Option<String>,
    pub url: String,
    /// Sent as a bearer token when present
    pub token: Option<String>,
    pub insecure: bool,
    pub template: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: None,
            url: String::new(),
            token: None,
            insecure: false,
            template: None,
            headers: BTreeMap::new(),
        }
    }
}

impl WebhookConfig {
    pub fn instance_id(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("webhook-{}", index))
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read, a TOML
    /// error if it is malformed and `ConfigError::ValidationError` if a value
    /// is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the filter and dispatch code rely on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.server.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "source.server must be set".to_string(),
            ));
        }
        if self.http.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "http.timeout_seconds must be greater than zero".to_string(),
            ));
        }

        let min_score = self.filters.labels.min_score;
        if !min_score.is_finite() || !(0.0..=100.0).contains(&min_score) {
            return Err(ConfigError::ValidationError(format!(
                "filters.labels.min_score must be between 0 and 100, got {}",
                min_score
            )));
        }

        let mut ids = HashSet::new();
        let mut enabled = 0;

        for (index, gotify) in self.gotify.iter().enumerate() {
            let id = gotify.instance_id(index);
            if !ids.insert(id.clone()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate provider name '{}'",
                    id
                )));
            }
            if !gotify.enabled {
                continue;
            }
            enabled += 1;
            require_http_url(&id, "server", &gotify.server)?;
            if gotify.token.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{}: token must be set",
                    id
                )));
            }
        }

        for (index, webhook) in self.webhook.iter().enumerate() {
            let id = webhook.instance_id(index);
            if !ids.insert(id.clone()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate provider name '{}'",
                    id
                )));
            }
            if !webhook.enabled {
                continue;
            }
            enabled += 1;
            require_http_url(&id, "url", &webhook.url)?;
        }

        if enabled == 0 {
            return Err(ConfigError::ValidationError(
                "no notification provider is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

fn require_http_url(id: &str, field: &str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{}: {} must be an http(s) URL, got '{}'",
            id, field, value
        )))
    }
}

/// Serde adapter for "HH:MM" time-of-day strings
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), FORMAT).map_err(|e| {
            serde::de::Error::custom(format!("invalid time '{}', expected HH:MM: {}", raw, e))
        })
    }
}
