//! Builder for configuring ForestechApi initialization.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::ResponseCache;
use crate::config::{BackendConfig, NotificationConfig, ServiceId};
use crate::error::Result;
use crate::network::{ClientFactory, ConnectionMonitor, HealthProbe, HttpHealthProbe, RetryConfig};
use crate::notify::Notifier;
use crate::services::{CrudService, InvoiceService, MovementService};
use crate::ForestechApi;

/// Builder for configuring ForestechApi initialization.
///
/// # Example
///
/// ```rust,ignore
/// use forestech_core::{BackendConfig, ForestechApi};
///
/// let api = ForestechApi::builder()
///     .config(BackendConfig::from_env()?)
///     .initial_probe(true)
///     .build()
///     .await?;
/// ```
pub struct ForestechApiBuilder {
    config: Option<BackendConfig>,
    probe: Option<Arc<dyn HealthProbe>>,
    retry: Option<RetryConfig>,
    cache: Option<ResponseCache>,
    notification_cooldown: Duration,
    initial_probe: bool,
}

impl Default for ForestechApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ForestechApiBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            probe: None,
            retry: None,
            cache: None,
            notification_cooldown: NotificationConfig::DEDUP_COOLDOWN,
            initial_probe: true,
        }
    }

    /// Backend addresses and timeouts.
    ///
    /// Default: [`BackendConfig::default`] (local gateway)
    pub fn config(mut self, config: BackendConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the HTTP health probe, e.g. with a fake in tests.
    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Override the retry policy from the backend config.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Share an existing response cache instead of starting empty.
    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_notification_cooldown(mut self, cooldown: Duration) -> Self {
        self.notification_cooldown = cooldown;
        self
    }

    /// Probe the backend in the background as soon as the API is built.
    ///
    /// Default: `true`
    pub fn initial_probe(mut self, enable: bool) -> Self {
        self.initial_probe = enable;
        self
    }

    /// Build the ForestechApi instance.
    pub async fn build(self) -> Result<ForestechApi> {
        let mut config = self.config.unwrap_or_default();
        if let Some(retry) = self.retry {
            config.retry = retry;
        }

        let probe: Arc<dyn HealthProbe> = match self.probe {
            Some(probe) => probe,
            None => Arc::new(HttpHealthProbe::from_config(&config)?),
        };
        let monitor = ConnectionMonitor::new(probe);
        let (notifier, feed) = Notifier::with_cooldown(self.notification_cooldown);

        let factory = ClientFactory::new(config.clone(), monitor.clone(), notifier.clone());
        let products = CrudService::new(factory.client(ServiceId::Catalog)?, "/products");
        let vehicles = CrudService::new(factory.client(ServiceId::Fleet)?, "/vehicles");
        let suppliers =
            CrudService::new(factory.client(ServiceId::Partners)?, "/suppliers").without_search();
        let movements = MovementService::new(factory.client(ServiceId::Inventory)?);
        let invoices = InvoiceService::new(factory.client(ServiceId::Invoicing)?);

        // Startup probe; fetchers wait briefly on `Checking` for it.
        if self.initial_probe {
            let monitor = monitor.clone();
            tokio::spawn(async move {
                monitor.check_connection().await;
            });
        }

        tracing::debug!("Forestech API ready (gateway {})", config.gateway_url);

        Ok(ForestechApi {
            config,
            monitor,
            notifier,
            feed: Mutex::new(Some(feed)),
            cache: self.cache.unwrap_or_default(),
            products,
            vehicles,
            suppliers,
            movements,
            invoices,
        })
    }
}
