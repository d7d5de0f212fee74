//! Connection-aware read-through fetching.
//!
//! A [`CachedFetch`] belongs to one consumer (a panel, a CLI command). It
//! answers from the shared [`ResponseCache`] while entries are fresh, refuses
//! to touch the network while the backend is known to be down, and makes
//! sure a superseded request never overwrites newer data.

use crate::cache::store::ResponseCache;
use crate::config::CacheConfig;
use crate::network::{ConnectionMonitor, ConnectionStatus};
use crate::{ForestechError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-consumer fetch settings.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// When false, `load` and `refetch` do nothing.
    pub enabled: bool,
    /// Maximum age of a cache entry that is still served.
    pub ttl: Duration,
    /// How long to wait for the startup probe when status is `Checking`.
    pub checking_grace: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: CacheConfig::DEFAULT_TTL,
            checking_grace: CacheConfig::CHECKING_GRACE,
        }
    }
}

impl FetchOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_checking_grace(mut self, grace: Duration) -> Self {
        self.checking_grace = grace;
        self
    }
}

/// What a consumer renders.
#[derive(Debug)]
pub struct FetchState<T> {
    pub data: Option<Arc<T>>,
    pub loading: bool,
    pub error: Option<Arc<ForestechError>>,
    pub is_disconnected: bool,
}

impl<T> Clone for FetchState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            loading: self.loading,
            error: self.error.clone(),
            is_disconnected: self.is_disconnected,
        }
    }
}

impl<T> FetchState<T> {
    fn initial() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
            is_disconnected: false,
        }
    }
}

type Producer<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

struct InFlight {
    token: CancellationToken,
    abort: AbortHandle,
}

struct FetchInner<T> {
    key: String,
    producer: Producer<T>,
    cache: ResponseCache,
    monitor: Option<ConnectionMonitor>,
    options: FetchOptions,
    state: watch::Sender<FetchState<T>>,
}

impl<T: Send + Sync + 'static> FetchInner<T> {
    async fn run(self: Arc<Self>, forced: bool, token: CancellationToken) {
        let fail_fast = !forced && self.should_fail_fast().await;
        if token.is_cancelled() {
            return;
        }
        if fail_fast {
            debug!("Backend disconnected, not fetching {}", self.key);
            self.state.send_modify(|s| {
                s.is_disconnected = true;
                s.loading = false;
            });
            return;
        }

        if !forced {
            if let Some(data) = self.cache.get_fresh::<T>(&self.key, self.options.ttl) {
                self.state.send_modify(|s| {
                    s.data = Some(data);
                    s.loading = false;
                    s.is_disconnected = false;
                });
                return;
            }
        }

        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let ticket = self.cache.begin_fetch(&self.key);
        let Some(outcome) = token.run_until_cancelled((self.producer)()).await else {
            debug!("Fetch for {} superseded or dropped", self.key);
            return;
        };
        if token.is_cancelled() {
            return;
        }

        match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                let data = if self.cache.store_if_latest(&self.key, ticket, value.clone()) {
                    value
                } else {
                    // Another consumer's newer fetch already landed.
                    self.cache
                        .get_fresh::<T>(&self.key, self.options.ttl)
                        .unwrap_or(value)
                };
                self.state.send_modify(|s| {
                    s.data = Some(data);
                    s.loading = false;
                    s.error = None;
                    s.is_disconnected = false;
                });
            }
            Err(err) if err.is_cancelled() => {
                self.state.send_modify(|s| s.loading = false);
            }
            Err(err) => {
                warn!("Fetching {} failed: {}", self.key, err);
                let network = err.is_network();
                self.state.send_modify(|s| {
                    s.error = Some(Arc::new(err));
                    s.loading = false;
                    if network {
                        s.is_disconnected = true;
                    }
                });
            }
        }
    }

    /// Whether an unforced fetch should skip the network.
    async fn should_fail_fast(&self) -> bool {
        let Some(monitor) = &self.monitor else {
            return false;
        };

        if monitor.status() == ConnectionStatus::Checking {
            let mut events = monitor.subscribe();
            let settled = events.wait_for(|s| s.status != ConnectionStatus::Checking);
            if tokio::time::timeout(self.options.checking_grace, settled)
                .await
                .is_err()
            {
                debug!("Startup probe still running, fetching {} anyway", self.key);
            }
        }

        monitor.status() == ConnectionStatus::Disconnected
    }
}

/// A cached, cancellable fetch bound to one key.
///
/// Dropping the handle aborts whatever it still has in flight.
pub struct CachedFetch<T> {
    inner: Arc<FetchInner<T>>,
    current: Mutex<Option<InFlight>>,
}

impl<T: Send + Sync + 'static> CachedFetch<T> {
    pub fn new<F, Fut>(
        key: impl Into<String>,
        producer: F,
        cache: ResponseCache,
        monitor: Option<ConnectionMonitor>,
        options: FetchOptions,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let producer: Producer<T> = Arc::new(move || producer().boxed());
        let (state, _) = watch::channel(FetchState::initial());

        Self {
            inner: Arc::new(FetchInner {
                key: key.into(),
                producer,
                cache,
                monitor,
                options,
                state,
            }),
            current: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Initial read: cache first, network only when needed and reachable.
    pub async fn load(&self) -> FetchState<T> {
        let task = self.spawn_load();
        self.settle(task).await
    }

    /// Forced read that skips the cache and the disconnected check.
    pub async fn refetch(&self) -> FetchState<T> {
        let task = self.spawn_refetch();
        self.settle(task).await
    }

    /// Start a load without waiting for it.
    pub fn spawn_load(&self) -> JoinHandle<()> {
        self.start(false)
    }

    /// Start a forced refetch without waiting for it.
    pub fn spawn_refetch(&self) -> JoinHandle<()> {
        self.start(true)
    }

    /// Drop the cached entry for this key; the next read goes to the network.
    pub fn invalidate(&self) {
        self.inner.cache.invalidate(&self.inner.key);
    }

    pub fn state(&self) -> FetchState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.inner.state.subscribe()
    }

    fn start(&self, forced: bool) -> JoinHandle<()> {
        let token = CancellationToken::new();
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(previous) = current.take() {
            previous.token.cancel();
        }

        if !self.inner.options.enabled {
            self.inner.state.send_modify(|s| s.loading = false);
            return tokio::spawn(async {});
        }

        let task = tokio::spawn(Arc::clone(&self.inner).run(forced, token.clone()));
        *current = Some(InFlight {
            token,
            abort: task.abort_handle(),
        });
        task
    }

    async fn settle(&self, task: JoinHandle<()>) -> FetchState<T> {
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                warn!("Fetch task for {} panicked: {}", self.inner.key, e);
            }
        }
        self.state()
    }
}

impl<T> Drop for CachedFetch<T> {
    fn drop(&mut self) {
        let current = self
            .current
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(in_flight) = current.take() {
            in_flight.token.cancel();
            in_flight.abort.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::HealthProbe;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::sync::oneshot;
    use tokio::time::Instant;

    struct ScriptedProbe {
        up: bool,
        latency: Duration,
    }

    #[async_trait]
    impl HealthProbe for ScriptedProbe {
        async fn probe(&self) -> Result<()> {
            tokio::time::sleep(self.latency).await;
            if self.up {
                Ok(())
            } else {
                Err(ForestechError::Network {
                    message: "connection refused".into(),
                    cause: None,
                })
            }
        }
    }

    fn monitor(up: bool, latency: Duration) -> ConnectionMonitor {
        ConnectionMonitor::new(Arc::new(ScriptedProbe { up, latency }))
    }

    /// Producer returning `value` and counting its calls.
    fn counting(
        calls: &Arc<AtomicU32>,
        value: Vec<&'static str>,
    ) -> impl Fn() -> BoxFuture<'static, Result<Vec<&'static str>>> + Send + Sync + 'static {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let value = value.clone();
            async move { Ok(value) }.boxed()
        }
    }

    /// Producer whose n-th call resolves when the n-th sender fires.
    fn gated(
        calls: &Arc<AtomicU32>,
        gates: Vec<oneshot::Receiver<u32>>,
    ) -> impl Fn() -> BoxFuture<'static, Result<u32>> + Send + Sync + 'static {
        let calls = calls.clone();
        let gates = Arc::new(Mutex::new(VecDeque::from(gates)));
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let gate = gates.lock().unwrap().pop_front();
            async move {
                match gate {
                    Some(rx) => rx.await.map_err(|_| ForestechError::Cancelled),
                    None => Err(ForestechError::Other("no gate left".into())),
                }
            }
            .boxed()
        }
    }

    async fn wait_for_calls(calls: &AtomicU32, n: u32) {
        while calls.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_served_without_network() {
        let calls = Arc::new(AtomicU32::new(0));
        let cache = ResponseCache::new();
        let fetch = CachedFetch::new(
            "products",
            counting(&calls, vec!["diesel"]),
            cache.clone(),
            None,
            FetchOptions::default(),
        );

        let state = fetch.load().await;
        assert_eq!(state.data.as_deref(), Some(&vec!["diesel"]));
        assert!(!state.loading);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(4 * 60)).await;
        fetch.load().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        fetch.load().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_is_shared_between_consumers() {
        let calls = Arc::new(AtomicU32::new(0));
        let cache = ResponseCache::new();
        let first = CachedFetch::new(
            "suppliers",
            counting(&calls, vec!["Terpel"]),
            cache.clone(),
            None,
            FetchOptions::default(),
        );
        let second = CachedFetch::new(
            "suppliers",
            counting(&calls, vec!["Terpel"]),
            cache.clone(),
            None,
            FetchOptions::default(),
        );

        first.load().await;
        let state = second.load().await;
        assert_eq!(state.data.as_deref(), Some(&vec!["Terpel"]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refetch_and_invalidate_bypass_cache() {
        let calls = Arc::new(AtomicU32::new(0));
        let fetch = CachedFetch::new(
            "vehicles",
            counting(&calls, vec!["ABC-123"]),
            ResponseCache::new(),
            None,
            FetchOptions::default(),
        );

        fetch.load().await;
        fetch.refetch().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        fetch.invalidate();
        fetch.load().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_disconnected_fails_fast_until_forced() {
        let calls = Arc::new(AtomicU32::new(0));
        let monitor = monitor(false, Duration::ZERO);
        assert!(!monitor.check_connection().await);

        let fetch = CachedFetch::new(
            "movements",
            counting(&calls, vec!["entrada"]),
            ResponseCache::new(),
            Some(monitor),
            FetchOptions::default(),
        );

        let state = fetch.load().await;
        assert!(state.is_disconnected);
        assert!(!state.loading);
        assert!(state.data.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let state = fetch.refetch().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!state.is_disconnected);
        assert_eq!(state.data.as_deref(), Some(&vec!["entrada"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_checking_waits_for_grace_then_fetches() {
        let calls = Arc::new(AtomicU32::new(0));
        // No probe has run, so the monitor stays in Checking.
        let monitor = monitor(true, Duration::ZERO);

        let fetch = CachedFetch::new(
            "invoices",
            counting(&calls, vec!["FV-001"]),
            ResponseCache::new(),
            Some(monitor),
            FetchOptions::default(),
        );

        let started = Instant::now();
        let state = fetch.load().await;
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(state.data.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_checking_resolving_to_disconnected_fails_fast() {
        let calls = Arc::new(AtomicU32::new(0));
        let monitor = monitor(false, Duration::from_millis(100));
        let probing = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.check_connection().await }
        });
        tokio::task::yield_now().await;

        let fetch = CachedFetch::new(
            "stock",
            counting(&calls, vec!["42"]),
            ResponseCache::new(),
            Some(monitor),
            FetchOptions::default(),
        );

        let state = fetch.load().await;
        assert!(state.is_disconnected);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!probing.await.unwrap());
    }

    #[tokio::test]
    async fn test_superseded_fetch_never_overwrites() {
        let calls = Arc::new(AtomicU32::new(0));
        let (tx_a, rx_a) = oneshot::channel();
        let (tx_b, rx_b) = oneshot::channel();
        let cache = ResponseCache::new();
        let fetch = CachedFetch::new(
            "stock:7",
            gated(&calls, vec![rx_a, rx_b]),
            cache.clone(),
            None,
            FetchOptions::default(),
        );

        let a = fetch.spawn_load();
        wait_for_calls(&calls, 1).await;
        let b = fetch.spawn_refetch();
        wait_for_calls(&calls, 2).await;

        tx_b.send(2).unwrap();
        b.await.unwrap();
        let _ = tx_a.send(1);
        a.await.unwrap();

        assert_eq!(fetch.state().data.as_deref(), Some(&2));
        assert_eq!(
            cache.get_fresh::<u32>("stock:7", Duration::from_secs(60)).as_deref(),
            Some(&2)
        );
    }

    #[tokio::test]
    async fn test_slow_consumer_cannot_overwrite_newer_result() {
        let calls_a = Arc::new(AtomicU32::new(0));
        let calls_b = Arc::new(AtomicU32::new(0));
        let (tx_a, rx_a) = oneshot::channel();
        let (tx_b, rx_b) = oneshot::channel();
        let cache = ResponseCache::new();

        let panel_a = CachedFetch::new(
            "products",
            gated(&calls_a, vec![rx_a]),
            cache.clone(),
            None,
            FetchOptions::default(),
        );
        let panel_b = CachedFetch::new(
            "products",
            gated(&calls_b, vec![rx_b]),
            cache.clone(),
            None,
            FetchOptions::default(),
        );

        let a = panel_a.spawn_load();
        wait_for_calls(&calls_a, 1).await;
        let b = panel_b.spawn_load();
        wait_for_calls(&calls_b, 1).await;

        tx_b.send(20).unwrap();
        b.await.unwrap();
        tx_a.send(10).unwrap();
        a.await.unwrap();

        let ttl = Duration::from_secs(60);
        assert_eq!(cache.get_fresh::<u32>("products", ttl).as_deref(), Some(&20));
        assert_eq!(panel_a.state().data.as_deref(), Some(&20));
    }

    #[tokio::test]
    async fn test_network_error_marks_disconnected() {
        let fetch = CachedFetch::new(
            "products",
            || async {
                Err::<u32, _>(ForestechError::Network {
                    message: "connection refused".into(),
                    cause: None,
                })
            },
            ResponseCache::new(),
            None,
            FetchOptions::default(),
        );

        let state = fetch.load().await;
        assert!(state.is_disconnected);
        assert!(state.error.unwrap().is_network());
    }

    #[tokio::test]
    async fn test_client_error_is_not_a_disconnection() {
        let fetch = CachedFetch::new(
            "products",
            || async {
                Err::<u32, _>(ForestechError::Http {
                    service: "catalog".into(),
                    operation: "GET /products".into(),
                    status: 404,
                    body: String::new(),
                })
            },
            ResponseCache::new(),
            None,
            FetchOptions::default(),
        );

        let state = fetch.load().await;
        assert!(!state.is_disconnected);
        assert_eq!(state.error.unwrap().status(), Some(404));
    }

    #[tokio::test]
    async fn test_cancellation_error_is_swallowed() {
        let fetch = CachedFetch::new(
            "products",
            || async { Err::<u32, _>(ForestechError::Cancelled) },
            ResponseCache::new(),
            None,
            FetchOptions::default(),
        );

        let state = fetch.load().await;
        assert!(state.error.is_none());
        assert!(!state.is_disconnected);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_disabled_fetch_does_nothing() {
        let calls = Arc::new(AtomicU32::new(0));
        let fetch = CachedFetch::new(
            "products",
            counting(&calls, vec![]),
            ResponseCache::new(),
            None,
            FetchOptions::default().with_enabled(false),
        );

        let state = fetch.load().await;
        assert!(!state.loading);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_dropping_consumer_aborts_in_flight_fetch() {
        let calls = Arc::new(AtomicU32::new(0));
        let dropped = Arc::new(AtomicBool::new(false));
        let cache = ResponseCache::new();

        let fetch = CachedFetch::new(
            "products",
            {
                let calls = calls.clone();
                let dropped = dropped.clone();
                move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let flag = DropFlag(dropped.clone());
                    async move {
                        let _flag = flag;
                        futures::future::pending::<Result<u32>>().await
                    }
                }
            },
            cache.clone(),
            None,
            FetchOptions::default(),
        );

        let task = fetch.spawn_load();
        wait_for_calls(&calls, 1).await;
        drop(fetch);

        let _ = task.await;
        assert!(dropped.load(Ordering::SeqCst));
        assert!(cache.is_empty());
    }
}
