/// Configuration model, loading and validation
pub mod settings;

/// Live-reloadable configuration snapshots
pub mod store;

pub use settings::{
    Config, FilterConfig, GeneralConfig, GotifyConfig, HttpConfig, LabelFilter, ListPolicy,
    ListVerdict, QuietHours, SourceConfig, UnzonedAction, WebhookConfig, ZoneFilter,
};
pub use store::ConfigStore;
