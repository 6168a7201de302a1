//! HTTP API tests against a live server backed by the mock database.

use std::sync::Arc;

use psqueelie::config::EnvConfig;
use psqueelie::db::{MockConnector, QueryOutput, Row, Value};
use psqueelie::history::{HistoryLog, HISTORY_KEY};
use psqueelie::persistence::MemoryStorage;
use psqueelie::server::{self, AppState};
use serde_json::{json, Value as JsonValue};

fn env() -> EnvConfig {
    EnvConfig {
        database: Some("shop".to_string()),
        user: Some("alice".to_string()),
        password: Some("secret".to_string()),
        ..Default::default()
    }
}

/// Starts the API on an ephemeral port and returns its base URL.
async fn spawn_server(connector: MockConnector, env: EnvConfig) -> (String, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let history = HistoryLog::new(storage.clone());
    let state = AppState::new(Arc::new(connector), env, Some("mock".to_string()), history);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server::router(state)).await.unwrap();
    });

    (format!("http://{addr}"), storage)
}

#[tokio::test]
async fn test_connection_check() {
    let (base, _) = spawn_server(MockConnector::new(), env()).await;

    let resp = reqwest::get(format!("{base}/api/db/connect")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: JsonValue = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Connection successful");
    assert!(body["version"].as_str().unwrap().starts_with("PostgreSQL"));
}

#[tokio::test]
async fn test_connection_check_without_config() {
    let (base, _) = spawn_server(MockConnector::new(), EnvConfig::default()).await;

    let resp = reqwest::get(format!("{base}/api/db/connect")).await.unwrap();
    assert_eq!(resp.status(), 500);

    let body: JsonValue = resp.json().await.unwrap();
    assert_eq!(body["error"], "Configuration error");
    assert_eq!(
        body["missing"],
        json!(["POSTGRES_DATABASE", "POSTGRES_USER", "POSTGRES_PASSWORD"])
    );
    assert!(body["setup"].as_str().unwrap().contains("POSTGRES_HOST=localhost"));
}

#[tokio::test]
async fn test_query_round_trip_through_history() {
    let rows = vec![
        Row::from_iter([("region", Value::from("north")), ("orders", Value::Int(12))]),
        Row::from_iter([("region", Value::Null), ("orders", Value::Int(7))]),
    ];
    let connector = MockConnector::new().with_result(
        "SELECT region, orders FROM sales",
        QueryOutput::with_rows(vec![], rows),
    );
    let (base, storage) = spawn_server(connector, env()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/query"))
        .json(&json!({ "query": "SELECT region, orders FROM sales" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: JsonValue = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["rowCount"], 2);
    assert_eq!(body["data"][1]["region"], JsonValue::Null);
    assert!(body["executionTime"].is_u64());
    let id = body["id"].as_str().unwrap().to_string();
    assert!(storage.contains(HISTORY_KEY));

    let history: JsonValue = client
        .get(format!("{base}/api/history"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history[0]["id"], id.as_str());
    assert_eq!(history[0]["queryPreview"], "SELECT region, orders FROM sales");

    let view: JsonValue = client
        .get(format!("{base}/api/history/{id}/view"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["rowBadge"], "2 rows");
    assert_eq!(view["tabs"], json!(["table", "chart"]));
    assert_eq!(view["chart"]["data"][1]["name"], "Unknown");

    let csv = client
        .get(format!("{base}/api/history/{id}/csv"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(csv, "region,orders\nnorth,12\n,7\n");

    let resp = client
        .delete(format!("{base}/api/history"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(!storage.contains(HISTORY_KEY));

    let resp = client
        .get(format!("{base}/api/history/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_empty_query_is_bad_request() {
    let connector = MockConnector::new();
    let (base, _) = spawn_server(connector.clone(), env()).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/query"))
        .json(&json!({ "query": "" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: JsonValue = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Query is required" }));
    assert_eq!(connector.stats().connects, 0);
}

#[tokio::test]
async fn test_query_error_is_reported() {
    let connector = MockConnector::new().with_query_error("SELEC 1", "syntax error at or near \"SELEC\"");
    let (base, _) = spawn_server(connector.clone(), env()).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/query"))
        .json(&json!({ "query": "SELEC 1" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body: JsonValue = resp.json().await.unwrap();
    assert_eq!(body["error"], "Query execution failed");
    assert_eq!(body["details"], "syntax error at or near \"SELEC\"");

    let stats = connector.stats();
    assert_eq!(stats.connects, stats.closes);
}

#[tokio::test]
async fn test_form_connection_check() {
    let (base, _) = spawn_server(MockConnector::new(), EnvConfig::default()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/db/connect"))
        .json(&json!({ "host": "localhost", "port": "5432", "database": "shop" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{base}/api/db/connect"))
        .json(&json!({
            "host": "localhost",
            "port": "5432",
            "database": "shop",
            "username": "alice",
            "password": "secret"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_malformed_body_returns_json_error() {
    let connector = MockConnector::new();
    let (base, _) = spawn_server(connector.clone(), env()).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/query"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: JsonValue = resp.json().await.unwrap();
    assert_eq!(body["error"], "Invalid request body");
    assert!(body["details"].as_str().unwrap().contains("JSON"));
    assert_eq!(connector.stats().connects, 0);
}
