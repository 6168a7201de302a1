//! Integration tests for the history store on the local state database.

use std::sync::Arc;
use std::time::Duration;

use psqueelie::db::{QueryOutput, Row, Value};
use psqueelie::history::{HistoryLog, HISTORY_KEY, MAX_HISTORY_ENTRIES};
use psqueelie::persistence::{BlobStorage, StateDb};
use psqueelie::query::QueryResult;
use tempfile::tempdir;

async fn create_test_db() -> (Arc<StateDb>, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test_state.db");
    let db = StateDb::open(&path).await.unwrap();
    (Arc::new(db), dir)
}

fn result(sql: &str, value: i64) -> QueryResult {
    let rows = vec![Row::from_iter([("label", Value::from(sql)), ("v", Value::Int(value))])];
    QueryResult::new(sql, QueryOutput::with_rows(vec![], rows), Duration::from_millis(4), None)
}

#[tokio::test]
async fn test_history_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.db");

    let recorded = {
        let db = Arc::new(StateDb::open(&path).await.unwrap());
        let mut log = HistoryLog::load(db.clone()).await;
        log.record(result("SELECT 1", 1)).await;
        let recorded = log.record(result("SELECT 2", 2)).await;
        db.close().await;
        recorded
    };

    let db = Arc::new(StateDb::open(&path).await.unwrap());
    let log = HistoryLog::load(db).await;

    assert_eq!(log.len(), 2);
    let newest = log.entries().next().unwrap();
    assert_eq!(newest.id(), recorded.id());
    assert_eq!(newest.timestamp(), recorded.timestamp());
    assert_eq!(newest.rows(), recorded.rows());
}

#[tokio::test]
async fn test_history_cap_on_disk() {
    let (db, _dir) = create_test_db().await;
    let mut log = HistoryLog::load(db.clone()).await;

    for i in 0..(MAX_HISTORY_ENTRIES as i64 + 5) {
        log.record(result(&format!("SELECT {i}"), i)).await;
    }

    let restored = HistoryLog::load(db).await;
    assert_eq!(restored.len(), MAX_HISTORY_ENTRIES);
    assert_eq!(restored.entries().next().unwrap().query(), "SELECT 54");
}

#[tokio::test]
async fn test_corrupt_history_blob_is_discarded() {
    let (db, _dir) = create_test_db().await;
    db.write(HISTORY_KEY, "[{\"id\": 42").await.unwrap();

    let mut log = HistoryLog::load(db.clone()).await;
    assert!(log.is_empty());

    // The next append replaces the corrupt blob.
    log.record(result("SELECT 1", 1)).await;
    assert_eq!(HistoryLog::load(db).await.len(), 1);
}

#[tokio::test]
async fn test_clear_removes_blob() {
    let (db, _dir) = create_test_db().await;
    let mut log = HistoryLog::load(db.clone()).await;
    log.record(result("SELECT 1", 1)).await;

    log.clear().await.unwrap();

    assert_eq!(db.read(HISTORY_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn test_blob_is_json_array_newest_first() {
    let (db, _dir) = create_test_db().await;
    let mut log = HistoryLog::load(db.clone()).await;
    log.record(result("SELECT 1", 1)).await;
    log.record(result("SELECT 2", 2)).await;

    let blob = db.read(HISTORY_KEY).await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(&blob).unwrap();

    let queries: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["query"].as_str().unwrap())
        .collect();
    assert_eq!(queries, vec!["SELECT 2", "SELECT 1"]);
}
