//! Forestech Core - connection-aware client library for the Forestech backend.
//!
//! This crate talks to the Forestech fuel-inventory microservices (catalog,
//! fleet, inventory, partners, invoicing) and keeps the application usable
//! when they are not reachable: retries with backoff, a shared connection
//! state machine, deduplicated user notifications and a TTL response cache.
//!
//! # Example
//!
//! ```rust,ignore
//! use forestech_core::{BackendConfig, ForestechApi};
//!
//! #[tokio::main]
//! async fn main() -> forestech_core::Result<()> {
//!     let api = ForestechApi::builder()
//!         .config(BackendConfig::from_env()?)
//!         .build()
//!         .await?;
//!
//!     // Cached, connection-aware read
//!     let products = api.cached("products", {
//!         let service = api.products().clone();
//!         move || {
//!             let service = service.clone();
//!             async move { service.get_all().await }
//!         }
//!     });
//!     let state = products.load().await;
//!     println!("{} products", state.data.map(|p| p.len()).unwrap_or(0));
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod notify;
pub mod services;

mod api;

// Re-export commonly used types
pub use cache::{CachedFetch, FetchOptions, FetchState, ResponseCache};
pub use config::{BackendConfig, ServiceId};
pub use error::{FailureClass, ForestechError, Result};
pub use network::{
    Banner, ClientFactory, ConnectionMonitor, ConnectionSnapshot, ConnectionStatus, HealthProbe,
    HttpHealthProbe, RetryConfig, ServiceClient,
};
pub use notify::{Notification, NotificationFeed, NotificationSink, Notifier, Severity};
pub use services::{
    CrudService, InvoiceService, MovementService, ProductService, SupplierService, VehicleService,
};

// Re-export builder from api module
pub use api::ForestechApiBuilder;

use std::sync::Mutex;

/// Main API struct for Forestech operations.
///
/// Owns one connection monitor, one notifier, one response cache and a
/// client per backend service, all wired together so that a failure in any
/// service is reflected in the shared connection state and notifications.
pub struct ForestechApi {
    config: BackendConfig,
    monitor: ConnectionMonitor,
    notifier: Notifier,
    feed: Mutex<Option<NotificationFeed>>,
    cache: ResponseCache,
    products: ProductService,
    vehicles: VehicleService,
    suppliers: SupplierService,
    movements: MovementService,
    invoices: InvoiceService,
}

impl ForestechApi {
    /// Create a builder for configuring the API.
    pub fn builder() -> ForestechApiBuilder {
        ForestechApiBuilder::new()
    }

    /// Build an API for `config` with default options.
    pub async fn new(config: BackendConfig) -> Result<Self> {
        ForestechApiBuilder::new().config(config).build().await
    }
}

impl std::fmt::Debug for ForestechApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForestechApi")
            .field("gateway_url", &self.config.gateway_url.as_str())
            .field("status", &self.monitor.status())
            .field("cached_entries", &self.cache.len())
            .finish()
    }
}
