//! Query execution integration tests.
//!
//! Tests SQL execution through the executor against a real server.

use std::sync::Arc;
use std::time::Duration;

use psqueelie::chart::{self, ChartConfig};
use psqueelie::config::ConnectionConfig;
use psqueelie::db::{PostgresConnector, Value};
use psqueelie::error::ConsoleError;
use psqueelie::query::QueryExecutor;

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

fn setup() -> Option<(QueryExecutor, ConnectionConfig)> {
    let config = ConnectionConfig::from_connection_string(&get_test_database_url()?).ok()?;
    let executor = QueryExecutor::new(Arc::new(PostgresConnector::new(Duration::from_secs(5))));
    Some((executor, config))
}

#[tokio::test]
async fn test_execute_simple_select() {
    let Some((executor, config)) = setup() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor
        .execute(&config, "SELECT 1 AS num, 'hello' AS greeting")
        .await
        .unwrap();

    assert_eq!(result.row_count(), 1);
    assert_eq!(result.fields().len(), 2);
    assert_eq!(result.fields()[0].name, "num");
    assert_eq!(result.fields()[0].data_type_id, 23);
    assert_eq!(result.fields()[0].data_type_size, 4);
    assert_eq!(result.fields()[1].name, "greeting");

    let row = &result.rows()[0];
    assert_eq!(row.get("num"), Some(&Value::Int(1)));
    assert_eq!(row.get("greeting"), Some(&Value::from("hello")));
}

#[tokio::test]
async fn test_nulls_and_types() {
    let Some((executor, config)) = setup() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor
        .execute(
            &config,
            "SELECT NULL::int AS nothing, true AS flag, 2.5::float8 AS ratio, 10.50::numeric AS price",
        )
        .await
        .unwrap();

    let row = &result.rows()[0];
    assert_eq!(row.get("nothing"), Some(&Value::Null));
    assert_eq!(row.get("flag"), Some(&Value::Bool(true)));
    assert_eq!(row.get("ratio"), Some(&Value::Float(2.5)));
    assert_eq!(row.get("price"), Some(&Value::from("10.50")));
}

#[tokio::test]
async fn test_ddl_and_dml_are_permitted() {
    let Some((executor, config)) = setup() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor
        .execute(
            &config,
            "CREATE TEMP TABLE psq_items (name text, qty int); \
             INSERT INTO psq_items VALUES ('a', 1), ('b', 2), ('c', 3)",
        )
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(result.row_count(), 0);
    assert_eq!(result.rows_affected(), 3);
}

#[tokio::test]
async fn test_batch_result_charts() {
    let Some((executor, config)) = setup() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor
        .execute(
            &config,
            "SELECT 'north' AS region, 12 AS orders UNION ALL SELECT 'south', 7",
        )
        .await
        .unwrap();

    match chart::classify(result.rows()) {
        Some(ChartConfig::Categorical {
            label_column,
            value_column,
            data,
            ..
        }) => {
            assert_eq!(label_column, "region");
            assert_eq!(value_column, "orders");
            assert_eq!(data.len(), 2);
        }
        other => panic!("Expected categorical chart, got {:?}", other),
    }
}

#[tokio::test]
async fn test_syntax_error_carries_engine_message() {
    let Some((executor, config)) = setup() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = executor.execute(&config, "SELEC 1").await.unwrap_err();

    assert!(matches!(err, ConsoleError::Query(_)));
    assert!(err.details().contains("syntax error"));
}

#[tokio::test]
async fn test_missing_table() {
    let Some((executor, config)) = setup() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = executor
        .execute(&config, "SELECT * FROM psq_table_that_does_not_exist")
        .await
        .unwrap_err();

    assert!(err.details().contains("does not exist"));
}
