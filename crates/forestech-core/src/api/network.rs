//! Connectivity, notification and caching methods on ForestechApi.

use std::future::Future;

use crate::cache::{CachedFetch, FetchOptions, ResponseCache};
use crate::network::{Banner, ConnectionMonitor, ConnectionStatus};
use crate::notify::{NotificationFeed, Notifier};
use crate::{ForestechApi, Result};

impl ForestechApi {
    // ========================================
    // Backend Connectivity
    // ========================================

    /// The shared connection monitor.
    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.monitor
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.monitor.status()
    }

    pub fn banner(&self) -> Banner {
        self.monitor.banner()
    }

    /// Probe the backend (the manual "reconnect" action).
    pub async fn check_connection(&self) -> bool {
        self.monitor.check_connection().await
    }

    // ========================================
    // Notifications
    // ========================================

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Hand the notification feed to the display surface.
    ///
    /// There is exactly one feed; later calls return `None`.
    pub fn take_notification_feed(&self) -> Option<NotificationFeed> {
        self.feed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    // ========================================
    // Cached Reads
    // ========================================

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Cached, connection-aware fetch with default options.
    pub fn cached<T, F, Fut>(&self, key: impl Into<String>, producer: F) -> CachedFetch<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.cached_with(key, producer, FetchOptions::default())
    }

    pub fn cached_with<T, F, Fut>(
        &self,
        key: impl Into<String>,
        producer: F,
        options: FetchOptions,
    ) -> CachedFetch<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        CachedFetch::new(
            key,
            producer,
            self.cache.clone(),
            Some(self.monitor.clone()),
            options,
        )
    }
}
