//! User-facing transient notifications.
//!
//! [`Notifier`] is the push side, cloned into every component that reports
//! to the user. [`NotificationFeed`] is the single consumer the display
//! surface drains in strict arrival order.
//!
//! HTTP failures go through [`Notifier::notify_http_status`], which maps the
//! handful of statuses worth telling the user about and drops duplicates for
//! the same status inside one cooldown bucket.

use crate::config::NotificationConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mini_moka::sync::Cache;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};
use uuid::Uuid;

/// Visual weight of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// How long a message of this severity stays on screen.
    pub fn display_duration(&self) -> Duration {
        match self {
            Severity::Success => NotificationConfig::SUCCESS_DISPLAY,
            Severity::Error => NotificationConfig::ERROR_DISPLAY,
            Severity::Info | Severity::Warning => NotificationConfig::DEFAULT_DISPLAY,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Success => write!(f, "success"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A queued message.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.into(),
            severity,
            created_at: Utc::now(),
        }
    }

    pub fn display_duration(&self) -> Duration {
        self.severity.display_duration()
    }
}

/// Message shown for an HTTP status, if the status warrants one.
pub fn status_message(status: u16) -> Option<(&'static str, Severity)> {
    match status {
        429 => Some((
            "Too many requests. Please slow down and try again in a moment.",
            Severity::Warning,
        )),
        503 => Some((
            "Service temporarily unavailable. Retrying shortly.",
            Severity::Warning,
        )),
        504 => Some((
            "The server took too long to respond. Please try again.",
            Severity::Warning,
        )),
        500 => Some((
            "Internal server error. The team has been notified.",
            Severity::Error,
        )),
        _ => None,
    }
}

pub const RECONNECTING_MESSAGE: &str = "Connection problem detected. Reconnecting...";

type DedupKey = (u16, u64);

struct NotifierInner {
    tx: mpsc::UnboundedSender<Notification>,
    /// Statuses already announced, keyed by cooldown bucket.
    seen: Cache<DedupKey, ()>,
    seen_gate: Mutex<()>,
    epoch: Instant,
    cooldown: Duration,
}

/// Cloneable handle for pushing notifications.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

impl Notifier {
    /// Create a notifier and the feed that receives its messages.
    pub fn new() -> (Self, NotificationFeed) {
        Self::with_cooldown(NotificationConfig::DEDUP_COOLDOWN)
    }

    pub fn with_cooldown(cooldown: Duration) -> (Self, NotificationFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (dismiss_tx, dismiss_rx) = mpsc::unbounded_channel();

        let notifier = Self {
            inner: Arc::new(NotifierInner {
                tx,
                seen: Cache::builder()
                    .time_to_live(cooldown)
                    .max_capacity(256)
                    .build(),
                seen_gate: Mutex::new(()),
                epoch: Instant::now(),
                cooldown,
            }),
        };

        let feed = NotificationFeed {
            rx,
            dismiss_tx,
            dismiss_rx,
        };

        (notifier, feed)
    }

    /// Queue a message.
    pub fn show(&self, message: impl Into<String>, severity: Severity) {
        let notification = Notification::new(message, severity);
        trace!("Queueing {} notification: {}", severity, notification.message);
        if self.inner.tx.send(notification).is_err() {
            debug!("Notification feed closed, dropping message");
        }
    }

    pub fn success(&self, message: impl Into<String>) {
        self.show(message, Severity::Success);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.show(message, Severity::Info);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.show(message, Severity::Warning);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.show(message, Severity::Error);
    }

    /// One-time warning emitted on the first retry of a request.
    pub fn reconnecting(&self) {
        self.warning(RECONNECTING_MESSAGE);
    }

    /// Announce a failed request's status.
    ///
    /// Returns true when a message was queued. Statuses without a mapping and
    /// repeats inside the current cooldown bucket queue nothing.
    pub fn notify_http_status(&self, status: u16) -> bool {
        let Some((message, severity)) = status_message(status) else {
            return false;
        };

        let key = (status, self.current_bucket());
        {
            let _gate = self
                .inner
                .seen_gate
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if self.inner.seen.contains_key(&key) {
                debug!("Suppressing duplicate notification for HTTP {}", status);
                return false;
            }
            self.inner.seen.insert(key, ());
        }

        self.show(message, severity);
        true
    }

    fn current_bucket(&self) -> u64 {
        let elapsed = Instant::now().duration_since(self.inner.epoch);
        let window = self.inner.cooldown.as_millis().max(1);
        (elapsed.as_millis() / window) as u64
    }
}

/// Display surface driven by [`NotificationFeed::present`].
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn show(&self, notification: &Notification);

    async fn hide(&self, _notification: &Notification) {}
}

/// Dismisses the message currently on screen.
#[derive(Clone)]
pub struct DismissHandle {
    tx: mpsc::UnboundedSender<Uuid>,
}

impl DismissHandle {
    pub fn dismiss(&self, id: Uuid) {
        let _ = self.tx.send(id);
    }
}

/// Single consumer of queued notifications, in arrival order.
pub struct NotificationFeed {
    rx: mpsc::UnboundedReceiver<Notification>,
    dismiss_tx: mpsc::UnboundedSender<Uuid>,
    dismiss_rx: mpsc::UnboundedReceiver<Uuid>,
}

impl NotificationFeed {
    /// Wait for the next message. `None` once every notifier is dropped.
    pub async fn next(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    /// Next message if one is already queued.
    pub fn try_next(&mut self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }

    pub fn dismiss_handle(&self) -> DismissHandle {
        DismissHandle {
            tx: self.dismiss_tx.clone(),
        }
    }

    /// Show messages one at a time until the notifiers are gone.
    ///
    /// Each message stays up for its severity's duration or until dismissed
    /// by id; the next one is shown only after the current one is hidden.
    pub async fn present<S: NotificationSink + ?Sized>(mut self, sink: &S) {
        while let Some(notification) = self.rx.recv().await {
            sink.show(&notification).await;

            let expiry = tokio::time::sleep(notification.display_duration());
            tokio::pin!(expiry);
            loop {
                tokio::select! {
                    _ = &mut expiry => break,
                    Some(id) = self.dismiss_rx.recv() => {
                        if id == notification.id {
                            break;
                        }
                        trace!("Ignoring dismiss for {} (not on screen)", id);
                    }
                }
            }

            sink.hide(&notification).await;
        }
    }
}
