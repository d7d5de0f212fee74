//! Centralized configuration for the Forestech client core.
//!
//! Constant tables for network, cache and notification timing, the backend
//! service identifiers, and the runtime [`BackendConfig`] resolved from the
//! environment.

use crate::error::{ForestechError, Result};
use crate::network::RetryConfig;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Backend addressing defaults.
pub struct ApiConfig;

impl ApiConfig {
    pub const DEFAULT_GATEWAY_URL: &'static str = "http://localhost:8080/api";
    pub const HEALTH_PATH: &'static str = "/actuator/health";
    pub const GATEWAY_URL_ENV: &'static str = "FORESTECH_API_URL";
    pub const HEALTH_URL_ENV: &'static str = "FORESTECH_HEALTH_URL";
    pub const REQUEST_TIMEOUT_ENV: &'static str = "FORESTECH_REQUEST_TIMEOUT_MS";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const INVOICING_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
    pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);
    pub const USER_AGENT: &'static str = "Forestech-Desktop/0.1";
}

/// Response cache timing.
pub struct CacheConfig;

impl CacheConfig {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
    /// How long a fetch waits for the startup probe while status is `Checking`.
    pub const CHECKING_GRACE: Duration = Duration::from_millis(500);
}

/// Transient message timing.
pub struct NotificationConfig;

impl NotificationConfig {
    pub const DEDUP_COOLDOWN: Duration = Duration::from_secs(5);
    pub const DEFAULT_DISPLAY: Duration = Duration::from_secs(6);
    pub const ERROR_DISPLAY: Duration = Duration::from_secs(8);
    pub const SUCCESS_DISPLAY: Duration = Duration::from_secs(4);
    pub const RECONNECTED_BANNER: Duration = Duration::from_secs(3);
}

/// Backend microservices reachable through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceId {
    Catalog,
    Fleet,
    Inventory,
    Partners,
    Invoicing,
}

impl ServiceId {
    pub const ALL: [ServiceId; 5] = [
        ServiceId::Catalog,
        ServiceId::Fleet,
        ServiceId::Inventory,
        ServiceId::Partners,
        ServiceId::Invoicing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::Catalog => "catalog",
            ServiceId::Fleet => "fleet",
            ServiceId::Inventory => "inventory",
            ServiceId::Partners => "partners",
            ServiceId::Invoicing => "invoicing",
        }
    }

    /// Invoice creation is heavier than the other calls and gets more time.
    pub fn default_timeout(&self) -> Duration {
        match self {
            ServiceId::Invoicing => NetworkConfig::INVOICING_REQUEST_TIMEOUT,
            _ => NetworkConfig::REQUEST_TIMEOUT,
        }
    }

    /// Environment variable that overrides this service's base URL.
    pub fn url_env_var(&self) -> String {
        format!("FORESTECH_{}_URL", self.as_str().to_uppercase())
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "catalog" => Some(ServiceId::Catalog),
            "fleet" => Some(ServiceId::Fleet),
            "inventory" => Some(ServiceId::Inventory),
            "partners" => Some(ServiceId::Partners),
            "invoicing" => Some(ServiceId::Invoicing),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime backend configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Gateway URL every service defaults to.
    pub gateway_url: Url,
    /// Per-service base URL overrides.
    pub service_urls: HashMap<ServiceId, Url>,
    /// Health endpoint probed by the connection monitor.
    pub health_url: Url,
    /// Timeout for health probes.
    pub probe_timeout: Duration,
    /// Overrides every service's default timeout when set.
    pub request_timeout: Option<Duration>,
    /// Retry policy shared by all service clients.
    pub retry: RetryConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::for_gateway(ApiConfig::DEFAULT_GATEWAY_URL)
            .expect("default gateway URL is well-formed")
    }
}

impl BackendConfig {
    /// Configuration where every service and the health probe hang off one gateway.
    pub fn for_gateway(gateway_url: &str) -> Result<Self> {
        let gateway_url = parse_url(gateway_url)?;
        let health_url = derive_health_url(&gateway_url);

        Ok(Self {
            gateway_url,
            service_urls: HashMap::new(),
            health_url,
            probe_timeout: NetworkConfig::PROBE_TIMEOUT,
            request_timeout: None,
            retry: RetryConfig::default(),
        })
    }

    /// Create a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `FORESTECH_API_URL`: gateway URL (default: "http://localhost:8080/api")
    /// - `FORESTECH_<SERVICE>_URL`: per-service base URL override
    /// - `FORESTECH_HEALTH_URL`: health endpoint (default: gateway root + "/actuator/health")
    /// - `FORESTECH_REQUEST_TIMEOUT_MS`: request timeout for every service
    pub fn from_env() -> Result<Self> {
        let gateway = std::env::var(ApiConfig::GATEWAY_URL_ENV)
            .unwrap_or_else(|_| ApiConfig::DEFAULT_GATEWAY_URL.to_string());
        let mut config = Self::for_gateway(&gateway)?;

        for service in ServiceId::ALL {
            if let Ok(value) = std::env::var(service.url_env_var()) {
                config.service_urls.insert(service, parse_url(&value)?);
            }
        }

        if let Ok(value) = std::env::var(ApiConfig::HEALTH_URL_ENV) {
            config.health_url = parse_url(&value)?;
        }

        if let Ok(value) = std::env::var(ApiConfig::REQUEST_TIMEOUT_ENV) {
            let millis: u64 = value.parse().map_err(|e| ForestechError::Config {
                message: format!("invalid {}: {}", ApiConfig::REQUEST_TIMEOUT_ENV, e),
            })?;
            config.request_timeout = Some(Duration::from_millis(millis));
        }

        Ok(config)
    }

    /// Base URL for a service, falling back to the gateway.
    pub fn base_url(&self, service: ServiceId) -> &Url {
        self.service_urls.get(&service).unwrap_or(&self.gateway_url)
    }

    /// Effective request timeout for a service.
    pub fn timeout(&self, service: ServiceId) -> Duration {
        self.request_timeout
            .unwrap_or_else(|| service.default_timeout())
    }

    pub fn with_service_url(mut self, service: ServiceId, url: &str) -> Result<Self> {
        self.service_urls.insert(service, parse_url(url)?);
        Ok(self)
    }

    pub fn with_health_url(mut self, url: &str) -> Result<Self> {
        self.health_url = parse_url(url)?;
        Ok(self)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| ForestechError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })
}

/// The health endpoint lives on the gateway root, not under `/api`.
fn derive_health_url(gateway: &Url) -> Url {
    let mut root = gateway.clone();
    let path = gateway.path().trim_end_matches('/');
    let stripped = path.strip_suffix("/api").unwrap_or(path);
    root.set_path(&format!("{}{}", stripped, ApiConfig::HEALTH_PATH));
    root.set_query(None);
    root
}
