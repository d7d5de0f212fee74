//! Per-service HTTP clients.
//!
//! Provides a wrapper around reqwest with:
//! - JSON default headers and a per-service timeout
//! - Retries for network failures, and for 5xx other than 503 on idempotent methods
//! - Failure reporting to the connection monitor and the notifier

use crate::config::{BackendConfig, NetworkConfig, ServiceId};
use crate::network::monitor::ConnectionMonitor;
use crate::network::retry::{retry_async, RetryConfig};
use crate::notify::Notifier;
use crate::{ForestechError, Result};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// HTTP client bound to one backend service.
#[derive(Clone)]
pub struct ServiceClient {
    service: ServiceId,
    client: Client,
    base_url: Url,
    timeout: Duration,
    retry: RetryConfig,
    monitor: ConnectionMonitor,
    notifier: Notifier,
}

impl ServiceClient {
    pub fn new(
        service: ServiceId,
        base_url: Url,
        timeout: Duration,
        retry: RetryConfig,
        monitor: ConnectionMonitor,
        notifier: Notifier,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| ForestechError::Network {
                message: format!("Failed to create HTTP client for {}: {}", service, e),
                cause: None,
            })?;

        Ok(Self {
            service,
            client,
            base_url,
            timeout,
            retry,
            monitor,
            notifier,
        })
    }

    pub fn service(&self) -> ServiceId {
        self.service
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Make a GET request and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.send(Method::GET, path, &[], None).await?;
        self.decode(&body, path)
    }

    /// GET with query parameters.
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let body = self.send(Method::GET, path, query, None).await?;
        self.decode(&body, path)
    }

    /// Make a POST request with JSON body.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let body = self.send(Method::POST, path, &[], Some(&body)).await?;
        self.decode(&body, path)
    }

    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let body = self.send(Method::PUT, path, &[], Some(&body)).await?;
        self.decode(&body, path)
    }

    /// DELETE, ignoring any response body.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, path, &[], None).await?;
        Ok(())
    }

    /// POST an empty JSON object, ignoring any response body.
    pub async fn post_empty(&self, path: &str) -> Result<()> {
        let body = serde_json::json!({});
        self.send(Method::POST, path, &[], Some(&body)).await?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Run one request with retries and return the full response body.
    ///
    /// The body is read inside the retried operation so a stall or reset
    /// after the headers is handled like any other transport failure.
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<Vec<u8>> {
        let url = self.endpoint(path);
        let operation = format!("{} {}", method, path);
        let idempotent = method.is_idempotent();
        debug!("{} {}", self.service, operation);

        let (result, stats) = retry_async(
            &self.retry,
            || {
                let mut request = self.client.request(method.clone(), &url);
                if !query.is_empty() {
                    request = request.query(query);
                }
                if let Some(body) = body {
                    request = request.json(body);
                }
                let operation = operation.as_str();
                async move {
                    let response = request
                        .send()
                        .await
                        .map_err(|e| ForestechError::from_transport(e, operation, self.timeout))?;
                    let response = self.check_response_status(response, operation).await?;
                    let bytes = response.bytes().await.map_err(|e| {
                        ForestechError::from_transport(
                            e,
                            &format!("reading body of {}", operation),
                            self.timeout,
                        )
                    })?;
                    Ok(bytes.to_vec())
                }
            },
            |err: &ForestechError| err.is_retryable_for(idempotent),
            |retry, _, _| {
                if retry == 1 {
                    self.notifier.reconnecting();
                }
            },
        )
        .await;

        if let Err(err) = &result {
            if stats.retries() > 0 {
                warn!(
                    "{} {} gave up after {} attempts: {}",
                    self.service, operation, stats.attempts, err
                );
            }
            self.report(err);
        }

        result
    }

    async fn check_response_status(&self, response: Response, operation: &str) -> Result<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());

            return Err(ForestechError::RateLimited {
                service: self.service.to_string(),
                retry_after_secs: retry_after,
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(ForestechError::Http {
            service: self.service.to_string(),
            operation: operation.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8], path: &str) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| ForestechError::Json {
            message: format!("{} {} returned unexpected JSON: {}", self.service, path, e),
            source: Some(e),
        })
    }

    /// Side-channel reporting once a request has finally failed.
    fn report(&self, err: &ForestechError) {
        if err.is_cancelled() {
            return;
        }
        if err.is_network() {
            self.monitor.set_disconnected();
        }
        if let Some(status) = err.status() {
            self.notifier.notify_http_status(status);
        }
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("service", &self.service)
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builds [`ServiceClient`]s sharing one monitor and one notifier.
#[derive(Clone)]
pub struct ClientFactory {
    config: BackendConfig,
    monitor: ConnectionMonitor,
    notifier: Notifier,
}

impl ClientFactory {
    pub fn new(config: BackendConfig, monitor: ConnectionMonitor, notifier: Notifier) -> Self {
        Self {
            config,
            monitor,
            notifier,
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Client for a service using its configured base URL and timeout.
    pub fn client(&self, service: ServiceId) -> Result<ServiceClient> {
        ServiceClient::new(
            service,
            self.config.base_url(service).clone(),
            self.config.timeout(service),
            self.config.retry.clone(),
            self.monitor.clone(),
            self.notifier.clone(),
        )
    }

    /// Client with an explicit base address. Only URL syntax is checked.
    pub fn create_client(
        &self,
        service: ServiceId,
        base_url: &str,
        timeout: Duration,
    ) -> Result<ServiceClient> {
        let base_url = Url::parse(base_url).map_err(|e| ForestechError::InvalidUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;

        ServiceClient::new(
            service,
            base_url,
            timeout,
            self.config.retry.clone(),
            self.monitor.clone(),
            self.notifier.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::monitor::{ConnectionStatus, HealthProbe};
    use crate::notify::{NotificationFeed, Severity, RECONNECTING_MESSAGE};
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct AlwaysUp;

    #[async_trait]
    impl HealthProbe for AlwaysUp {
        async fn probe(&self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
        name: String,
    }

    async fn connected_monitor() -> ConnectionMonitor {
        let monitor = ConnectionMonitor::new(Arc::new(AlwaysUp));
        monitor.check_connection().await;
        monitor
    }

    async fn client_for(
        base: &str,
        retry: RetryConfig,
    ) -> (ServiceClient, ConnectionMonitor, NotificationFeed) {
        client_with_timeout(base, retry, Duration::from_secs(5)).await
    }

    async fn client_with_timeout(
        base: &str,
        retry: RetryConfig,
        timeout: Duration,
    ) -> (ServiceClient, ConnectionMonitor, NotificationFeed) {
        let monitor = connected_monitor().await;
        let (notifier, feed) = Notifier::new();
        let client = ServiceClient::new(
            ServiceId::Catalog,
            Url::parse(base).unwrap(),
            timeout,
            retry,
            monitor.clone(),
            notifier,
        )
        .unwrap();
        (client, monitor, feed)
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::new().with_base_delay(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_get_json_joins_base_path_and_sends_json_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products/1"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 1,
                "name": "Diesel"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _, _) = client_for(&format!("{}/api", server.uri()), fast_retry()).await;
        let item: Item = client.get_json("/products/1").await.unwrap();
        assert_eq!(item, Item { id: 1, name: "Diesel".into() });
    }

    #[tokio::test]
    async fn test_query_and_body_are_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("type", "ENTRADA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/items"))
            .and(body_json(serde_json::json!({"name": "Gasoline"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 9,
                "name": "Gasoline"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _, _) = client_for(&server.uri(), fast_retry()).await;
        let listed: Vec<Item> = client
            .get_json_with_query("/items", &[("type", "ENTRADA".to_string())])
            .await
            .unwrap();
        assert!(listed.is_empty());

        let created: Item = client
            .post_json("/items", &serde_json::json!({"name": "Gasoline"}))
            .await
            .unwrap();
        assert_eq!(created.id, 9);
    }

    #[tokio::test]
    async fn test_delete_accepts_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/items/3"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _, _) = client_for(&server.uri(), fast_retry()).await;
        client.delete("/items/3").await.unwrap();
    }

    #[tokio::test]
    async fn test_service_unavailable_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let (client, monitor, mut feed) = client_for(&server.uri(), fast_retry()).await;
        let err = client.get_json::<Item>("/items/1").await.unwrap_err();

        assert_eq!(err.status(), Some(503));
        assert_eq!(monitor.status(), ConnectionStatus::Connected);
        let shown = feed.try_next().unwrap();
        assert_eq!(shown.severity, Severity::Warning);
        assert!(feed.try_next().is_none());
    }

    #[tokio::test]
    async fn test_rate_limited_is_not_retried_and_keeps_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _, mut feed) = client_for(&server.uri(), fast_retry()).await;
        let err = client.get_json::<Item>("/items/1").await.unwrap_err();

        match err {
            ForestechError::RateLimited {
                retry_after_secs, ..
            } => assert_eq!(retry_after_secs, Some(7)),
            other => panic!("expected rate limit, got {:?}", other),
        }
        assert!(feed.try_next().is_some());
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried_or_announced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such product"))
            .expect(1)
            .mount(&server)
            .await;

        let (client, monitor, mut feed) = client_for(&server.uri(), fast_retry()).await;
        let err = client.get_json::<Item>("/products/404").await.unwrap_err();

        match &err {
            ForestechError::Http { status, body, .. } => {
                assert_eq!(*status, 404);
                assert_eq!(body, "no such product");
            }
            other => panic!("expected HTTP error, got {:?}", other),
        }
        assert!(feed.try_next().is_none());
        assert!(monitor.is_connected());
    }

    #[tokio::test]
    async fn test_server_error_retried_until_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&server)
            .await;

        let (client, monitor, mut feed) = client_for(&server.uri(), fast_retry()).await;
        let err = client.get_json::<Item>("/items/1").await.unwrap_err();
        assert_eq!(err.status(), Some(500));

        // One reconnecting warning for the whole request, then the 500 message.
        let first = feed.try_next().unwrap();
        assert_eq!(first.message, RECONNECTING_MESSAGE);
        let second = feed.try_next().unwrap();
        assert_eq!(second.severity, Severity::Error);
        assert!(feed.try_next().is_none());

        // Server errors do not flip connectivity.
        assert!(monitor.is_connected());
    }

    #[tokio::test]
    async fn test_post_server_error_is_sent_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/invoices"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _, mut feed) = client_for(&server.uri(), fast_retry()).await;
        let err = client
            .post_json::<_, Item>("/invoices", &serde_json::json!({"numeroFactura": "F-1"}))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));

        // No retry, so no reconnecting message before the error.
        assert_eq!(feed.try_next().unwrap().severity, Severity::Error);
        assert!(feed.try_next().is_none());
    }

    #[tokio::test]
    async fn test_put_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/items/5"))
            .respond_with(ResponseTemplate::new(502))
            .expect(4)
            .mount(&server)
            .await;

        let (client, _, _) = client_for(&server.uri(), fast_retry()).await;
        let err = client
            .put_json::<_, Item>("/items/5", &serde_json::json!({"name": "Diesel"}))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    async fn test_body_stall_is_retried_and_disconnects() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Sends headers promising 100 bytes, then one byte, then stalls.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicU32::new(0));
        let server = tokio::spawn({
            let accepted = accepted.clone();
            async move {
                loop {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        break;
                    };
                    accepted.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(async move {
                        let mut buf = [0u8; 2048];
                        let _ = socket.read(&mut buf).await;
                        let _ = socket
                            .write_all(
                                b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{",
                            )
                            .await;
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        drop(socket);
                    });
                }
            }
        });

        let (client, monitor, _) = client_with_timeout(
            &format!("http://{}", addr),
            fast_retry(),
            Duration::from_millis(200),
        )
        .await;

        let err = client.get_json::<Item>("/items/1").await.unwrap_err();
        server.abort();

        assert!(err.is_network(), "unexpected error: {:?}", err);
        assert!(matches!(err, ForestechError::Timeout(t) if t == Duration::from_millis(200)));
        assert_eq!(accepted.load(Ordering::SeqCst), 4);
        assert_eq!(monitor.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 2,
                "name": "Kerosene"
            })))
            .mount(&server)
            .await;

        let (client, _, mut feed) = client_for(&server.uri(), fast_retry()).await;
        let item: Item = client.get_json("/items/2").await.unwrap();
        assert_eq!(item.id, 2);
        assert_eq!(feed.try_next().unwrap().message, RECONNECTING_MESSAGE);
    }

    #[tokio::test]
    async fn test_network_failure_marks_backend_disconnected() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (client, monitor, _) = client_for(
            &format!("http://{}", addr),
            RetryConfig::new().with_base_delay(Duration::from_millis(1)),
        )
        .await;
        assert!(monitor.is_connected());

        let err = client.get_json::<Item>("/items").await.unwrap_err();
        assert!(err.is_network(), "unexpected error: {:?}", err);
        assert_eq!(monitor.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_factory_applies_service_defaults() {
        let monitor = connected_monitor().await;
        let (notifier, _) = Notifier::new();
        let config = BackendConfig::default()
            .with_service_url(ServiceId::Invoicing, "http://billing.local:8085/api")
            .unwrap();
        let factory = ClientFactory::new(config, monitor, notifier);

        let invoicing = factory.client(ServiceId::Invoicing).unwrap();
        assert_eq!(invoicing.timeout(), Duration::from_secs(30));
        assert_eq!(invoicing.base_url().as_str(), "http://billing.local:8085/api");

        let catalog = factory.client(ServiceId::Catalog).unwrap();
        assert_eq!(catalog.timeout(), Duration::from_secs(10));

        assert!(factory
            .create_client(ServiceId::Fleet, "not a url", Duration::from_secs(1))
            .is_err());
    }
}
