use crate::events::Timestamp;
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

/// Latest delivery outcome of one provider instance
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    #[default]
    Unknown,
    Ok,
    Failed,
}

/// Delivery status reported to health checks
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ProviderDeliveryStatus {
    pub state: DeliveryState,
    /// Description of the last failure, cleared by the next success
    pub last_error: Option<String>,
    /// When the state last changed
    pub updated_at: Option<Timestamp>,
}

/// Process-wide record of the latest delivery state per provider
///
/// Only the most recent outcome is kept. Safe to share between concurrent
/// dispatches; each update replaces one provider's entry atomically.
#[derive(Debug, Default)]
pub struct DeliveryStatusStore {
    entries: Mutex<HashMap<String, ProviderDeliveryStatus>>,
}

impl DeliveryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a provider visible with `unknown` state before its first send
    pub fn register(&self, provider_id: &str) {
        self.lock()
            .entry(provider_id.to_string())
            .or_default();
    }

    pub fn record_success(&self, provider_id: &str) {
        self.lock().insert(
            provider_id.to_string(),
            ProviderDeliveryStatus {
                state: DeliveryState::Ok,
                last_error: None,
                updated_at: Some(Utc::now()),
            },
        );
    }

    pub fn record_failure(&self, provider_id: &str, message: impl Into<String>) {
        self.lock().insert(
            provider_id.to_string(),
            ProviderDeliveryStatus {
                state: DeliveryState::Failed,
                last_error: Some(message.into()),
                updated_at: Some(Utc::now()),
            },
        );
    }

    pub fn get(&self, provider_id: &str) -> Option<ProviderDeliveryStatus> {
        self.lock().get(provider_id).cloned()
    }

    /// Copy of every provider's status, ordered by provider id
    pub fn snapshot(&self) -> BTreeMap<String, ProviderDeliveryStatus> {
        self.lock()
            .iter()
            .map(|(id, status)| (id.clone(), status.clone()))
            .collect()
    }

    /// True when no provider's latest attempt failed
    pub fn all_healthy(&self) -> bool {
        self.lock()
            .values()
            .all(|status| status.state != DeliveryState::Failed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ProviderDeliveryStatus>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
