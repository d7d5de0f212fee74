//! Console stand-ins for the desktop notification surface and banner.

use async_trait::async_trait;
use forestech_core::{Banner, ConnectionSnapshot, Notification, NotificationFeed, NotificationSink, Severity};

/// Prints each notification when it is shown.
pub struct ConsoleSink;

#[async_trait]
impl NotificationSink for ConsoleSink {
    async fn show(&self, notification: &Notification) {
        eprintln!("{}", render_notification(notification));
    }
}

pub fn render_notification(notification: &Notification) -> String {
    let marker = match notification.severity {
        Severity::Success => "ok",
        Severity::Info => "info",
        Severity::Warning => "warn",
        Severity::Error => "error",
    };
    format!("[{}] {}", marker, notification.message)
}

/// Print whatever is still queued, without waiting for display durations.
pub fn flush_notifications(feed: &mut NotificationFeed) {
    while let Some(notification) = feed.try_next() {
        eprintln!("{}", render_notification(&notification));
    }
}

pub fn render_snapshot(snapshot: &ConnectionSnapshot, banner: Banner) -> String {
    let checked = snapshot
        .last_checked
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());

    let banner = match banner {
        Banner::Hidden => "",
        Banner::Disconnected => " (backend unreachable, press Enter to retry)",
        Banner::Reconnected => " (reconnected)",
    };

    format!("status: {} (last checked {}){}", snapshot.status, checked, banner)
}
