//! Integration tests for the forestech binary.
//!
//! Each test runs the real binary against a wiremock gateway and checks its
//! exit status and output.

use std::path::PathBuf;
use std::process::Output;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_forestech"))
}

/// Run the binary with `--gateway <gateway>` followed by `args`.
async fn run(gateway: &str, args: &[&str]) -> Output {
    tokio::process::Command::new(binary())
        .arg("--gateway")
        .arg(gateway)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .await
        .expect("failed to run forestech")
}

async fn gateway_with_health() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/actuator/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn closed_gateway() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api", addr)
}

#[tokio::test]
async fn test_health_reports_connected() {
    let server = gateway_with_health().await;
    let output = run(&format!("{}/api", server.uri()), &["health"]).await;

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("status: connected"));
}

#[tokio::test]
async fn test_health_fails_when_unreachable() {
    let output = run(&closed_gateway(), &["health"]).await;

    assert!(!output.status.success());
    assert!(stdout(&output).contains("status: disconnected"));
    assert!(stderr(&output).contains("backend unreachable"));
}

#[tokio::test]
async fn test_list_products_as_json() {
    let server = gateway_with_health().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "p-1",
            "name": "ACPM",
            "unitPrice": 10500.0,
            "measurementUnit": "GALON"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let output = run(&format!("{}/api", server.uri()), &["list", "products", "--json"]).await;
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let products: Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(products[0]["name"], "ACPM");
    assert_eq!(products[0]["measurementUnit"], "GALON");
}

#[tokio::test]
async fn test_list_movements_filters_by_type() {
    let server = gateway_with_health().await;
    Mock::given(method("GET"))
        .and(path("/api/movements"))
        .and(query_param("type", "SALIDA"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let output = run(
        &format!("{}/api", server.uri()),
        &["list", "movements", "--type", "salida"],
    )
    .await;

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("(none)"));
}

#[tokio::test]
async fn test_list_fails_fast_when_unreachable() {
    let output = run(&closed_gateway(), &["list", "vehicles"]).await;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("backend unreachable"));
}

#[tokio::test]
async fn test_cancel_invoice_confirms() {
    let server = gateway_with_health().await;
    Mock::given(method("POST"))
        .and(path("/api/invoices/f-9/cancel"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let output = run(&format!("{}/api", server.uri()), &["cancel-invoice", "f-9"]).await;

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("[ok] Invoice f-9 cancelled"));
}
