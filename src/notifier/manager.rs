use crate::config::Config;
use crate::error::{ConfigError, DispatchError};
use crate::events::Event;
use crate::notifier::dispatch::{DispatchResult, Dispatcher};
use crate::notifier::gotify::GotifyProvider;
use crate::notifier::provider::NotificationProvider;
use crate::notifier::status::DeliveryStatusStore;
use crate::notifier::webhook::WebhookProvider;
use crate::render::{BuiltinFormat, TemplateSelector};
use log::{error, info};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A provider instance built from configuration
#[derive(Debug, Clone)]
pub enum ConfiguredProvider {
    Gotify(GotifyProvider),
    Webhook(WebhookProvider),
}

impl ConfiguredProvider {
    pub fn id(&self) -> &str {
        match self {
            ConfiguredProvider::Gotify(p) => p.id(),
            ConfiguredProvider::Webhook(p) => p.id(),
        }
    }

    async fn notify(
        &self,
        dispatcher: &Dispatcher,
        event: &Event,
        title: &TemplateSelector,
    ) -> DispatchResult {
        match self {
            ConfiguredProvider::Gotify(p) => dispatcher.notify(p, event, title).await,
            ConfiguredProvider::Webhook(p) => dispatcher.notify(p, event, title).await,
        }
    }
}

/// Per-provider result of notifying one event
#[derive(Debug)]
pub struct DeliveryReport {
    pub provider_id: String,
    pub result: DispatchResult,
}

/// Fans admitted events out to every enabled provider
///
/// Built from one configuration snapshot; rebuild it when the configuration
/// is reloaded.
pub struct NotificationManager {
    providers: Vec<Arc<ConfiguredProvider>>,
    title: TemplateSelector,
    dispatcher: Dispatcher,
}

impl NotificationManager {
    /// Create providers for every enabled `[[gotify]]` and `[[webhook]]` entry
    ///
    /// Each provider is registered with the status store so it shows up as
    /// `unknown` before its first delivery.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a provider cannot be built from its settings.
    pub fn from_config(config: &Config, dispatcher: Dispatcher) -> Result<Self, ConfigError> {
        let mut providers = Vec::new();

        for (index, gotify) in config.gotify.iter().enumerate() {
            if gotify.enabled {
                let provider =
                    GotifyProvider::from_config(gotify.instance_id(index), gotify, &config.source)?;
                providers.push(ConfiguredProvider::Gotify(provider));
            }
        }
        for (index, webhook) in config.webhook.iter().enumerate() {
            if webhook.enabled {
                let provider = WebhookProvider::from_config(
                    webhook.instance_id(index),
                    webhook,
                    &config.source,
                );
                providers.push(ConfiguredProvider::Webhook(provider));
            }
        }

        for provider in &providers {
            dispatcher.status().register(provider.id());
        }
        info!("Notification providers ready: {}", providers.len());

        Ok(Self {
            providers: providers.into_iter().map(Arc::new).collect(),
            title: TemplateSelector::or_builtin(
                Some(config.general.title.as_str()),
                BuiltinFormat::Markdown,
            ),
            dispatcher,
        })
    }

    pub fn provider_ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// Dispatch one admitted event to all providers concurrently
    ///
    /// Waits for every provider to finish. A failing provider does not affect
    /// the others.
    pub async fn notify(&self, event: &Event) -> Vec<DeliveryReport> {
        let handles: Vec<_> = self
            .providers
            .iter()
            .map(|provider| {
                let provider_id = provider.id().to_string();
                let provider = Arc::clone(provider);
                let dispatcher = self.dispatcher.clone();
                let event = event.clone();
                let title = self.title.clone();
                let handle = tokio::spawn(async move {
                    provider.notify(&dispatcher, &event, &title).await
                });
                (provider_id, handle)
            })
            .collect();

        collect_reports(handles, self.dispatcher.status()).await
    }
}

/// Await every dispatch task, yielding one report per provider
///
/// A task that panicked or was cancelled is reported and recorded as failed.
async fn collect_reports(
    handles: Vec<(String, JoinHandle<DispatchResult>)>,
    status: &DeliveryStatusStore,
) -> Vec<DeliveryReport> {
    let mut reports = Vec::with_capacity(handles.len());
    for (provider_id, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("Dispatch task for {} failed: {}", provider_id, e);
                let err = DispatchError::TaskFailed(e.to_string());
                status.record_failure(&provider_id, err.status_message());
                Err(err)
            }
        };
        reports.push(DeliveryReport {
            provider_id,
            result,
        });
    }
    reports
}
