//! Network layer: service clients, retries and backend reachability.
//!
//! This module provides:
//! - Retry logic with exponential backoff
//! - Per-service HTTP clients built by [`ClientFactory`]
//! - The [`ConnectionMonitor`] state machine and its health probe

mod client;
mod monitor;
mod retry;

pub use client::{ClientFactory, ServiceClient};
pub use monitor::{
    Banner, ConnectionMonitor, ConnectionSnapshot, ConnectionStatus, HealthProbe, HttpHealthProbe,
};
pub use retry::{retry_async, RetryConfig, RetryStats};
