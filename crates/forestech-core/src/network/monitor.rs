//! ConnectionMonitor - single source of truth for backend reachability.
//!
//! Provides:
//! - The `Checking`/`Connected`/`Disconnected` state machine
//! - Health probing with at most one probe in flight
//! - Reactive disconnection from failed requests
//! - A watch channel of status snapshots for any number of observers

use crate::config::{BackendConfig, NotificationConfig};
use crate::{ForestechError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Backend connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Backend answered the last probe.
    Connected,
    /// Backend unreachable, either probed or reported by a failed request.
    Disconnected,
    /// A probe is running, or none has completed yet.
    Checking,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Checking => write!(f, "checking"),
        }
    }
}

/// Observable monitor state.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    /// Wall-clock time of the last transition.
    pub last_checked: Option<DateTime<Utc>>,
    /// When the backend last came back after being disconnected.
    pub reconnected_at: Option<Instant>,
}

impl ConnectionSnapshot {
    fn initial() -> Self {
        Self {
            status: ConnectionStatus::Checking,
            last_checked: None,
            reconnected_at: None,
        }
    }

    /// Banner the UI should render at `now`.
    pub fn banner(&self, now: Instant) -> Banner {
        match self.status {
            ConnectionStatus::Disconnected => Banner::Disconnected,
            ConnectionStatus::Connected => match self.reconnected_at {
                Some(at) if now.duration_since(at) < NotificationConfig::RECONNECTED_BANNER => {
                    Banner::Reconnected
                }
                _ => Banner::Hidden,
            },
            ConnectionStatus::Checking => Banner::Hidden,
        }
    }
}

/// Persistent connection banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    Hidden,
    /// Shown with a manual retry affordance.
    Disconnected,
    /// Short-lived success confirmation after recovering.
    Reconnected,
}

/// Lightweight reachability check against the backend.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Ok when the backend answered; Err on network-class failure.
    async fn probe(&self) -> Result<()>;
}

/// GET against the health endpoint. Any status below 500 counts as up.
pub struct HttpHealthProbe {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl HttpHealthProbe {
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForestechError::Network {
                message: format!("Failed to create probe client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(config.health_url.clone(), config.probe_timeout)
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| ForestechError::from_transport(e, "GET health", self.timeout))?;

        // 401/403 still prove the server is answering.
        let status = response.status();
        if status.as_u16() < 500 {
            Ok(())
        } else {
            Err(ForestechError::Http {
                service: "gateway".to_string(),
                operation: "GET health".to_string(),
                status: status.as_u16(),
                body: String::new(),
            })
        }
    }
}

type ProbeFuture = Shared<BoxFuture<'static, bool>>;

struct MonitorInner {
    probe: Arc<dyn HealthProbe>,
    state: watch::Sender<ConnectionSnapshot>,
    inflight: Mutex<Option<ProbeFuture>>,
}

impl MonitorInner {
    fn transition(&self, status: ConnectionStatus, recovered: bool) {
        let now = Instant::now();
        self.state.send_modify(|snapshot| {
            let previous = snapshot.status;
            snapshot.status = status;
            snapshot.last_checked = Some(Utc::now());
            if recovered {
                snapshot.reconnected_at = Some(now);
            }

            if previous != status {
                match status {
                    ConnectionStatus::Connected => info!("Backend connection established"),
                    ConnectionStatus::Disconnected => warn!("Backend connection lost"),
                    ConnectionStatus::Checking => debug!("Checking backend connection"),
                }
            }
        });
    }

    async fn run_probe(self: Arc<Self>) -> bool {
        let was_disconnected = self.state.borrow().status == ConnectionStatus::Disconnected;
        self.transition(ConnectionStatus::Checking, false);

        let connected = match self.probe.probe().await {
            Ok(()) => true,
            Err(e) => {
                debug!("Health probe failed: {}", e);
                false
            }
        };

        if connected {
            self.transition(ConnectionStatus::Connected, was_disconnected);
        } else {
            self.transition(ConnectionStatus::Disconnected, false);
        }

        *self
            .inflight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;

        connected
    }
}

/// Shared handle to the connection state machine.
///
/// Clones observe and drive the same state.
#[derive(Clone)]
pub struct ConnectionMonitor {
    inner: Arc<MonitorInner>,
}

impl ConnectionMonitor {
    pub fn new(probe: Arc<dyn HealthProbe>) -> Self {
        let (state, _) = watch::channel(ConnectionSnapshot::initial());

        Self {
            inner: Arc::new(MonitorInner {
                probe,
                state,
                inflight: Mutex::new(None),
            }),
        }
    }

    /// Monitor probing the configured health endpoint over HTTP.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpHealthProbe::from_config(config)?)))
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.borrow().status
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.inner.state.borrow().last_checked
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn is_disconnected(&self) -> bool {
        self.status() == ConnectionStatus::Disconnected
    }

    /// Banner to render right now.
    pub fn banner(&self) -> Banner {
        self.inner.state.borrow().banner(Instant::now())
    }

    /// Receive every status change. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.inner.state.subscribe()
    }

    /// Probe the backend and update the status.
    ///
    /// Never fails: an unreachable backend resolves to `false` and the
    /// `Disconnected` state. Callers arriving while a probe is in flight
    /// await that probe instead of starting another one. The probe runs on
    /// its own task, so a caller that gives up does not stall it.
    pub async fn check_connection(&self) -> bool {
        let probe = {
            let mut inflight = self
                .inner
                .inflight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            match inflight.as_ref() {
                Some(running) => {
                    debug!("Health probe already in flight, joining it");
                    running.clone()
                }
                None => {
                    // Spawned so the probe settles even if every caller stops waiting.
                    let task = tokio::spawn(Arc::clone(&self.inner).run_probe());
                    let running = async move {
                        task.await.unwrap_or_else(|e| {
                            warn!("Health probe task failed: {}", e);
                            false
                        })
                    }
                    .boxed()
                    .shared();
                    *inflight = Some(running.clone());
                    running
                }
            }
        };

        probe.await
    }

    /// Force `Disconnected` after a request failed at the network level.
    pub fn set_disconnected(&self) {
        self.inner.transition(ConnectionStatus::Disconnected, false);
    }
}

impl std::fmt::Debug for ConnectionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionMonitor")
            .field("snapshot", &*self.inner.state.borrow())
            .finish()
    }
}
