//! Query history log.
//!
//! Keeps the 50 most recent results, newest first, and mirrors the whole log
//! into [`BlobStorage`] under a single key after every change.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ConsoleError, Result};
use crate::persistence::BlobStorage;
use crate::query::QueryResult;

/// Storage key holding the serialized log.
pub const HISTORY_KEY: &str = "sql-dashboard-history";

/// Maximum number of results kept.
pub const MAX_HISTORY_ENTRIES: usize = 50;

/// Characters of SQL shown in a history list item.
const PREVIEW_CHARS: usize = 200;

/// Bounded, most-recent-first list of executed queries.
pub struct HistoryLog {
    entries: VecDeque<Arc<QueryResult>>,
    storage: Arc<dyn BlobStorage>,
}

impl HistoryLog {
    /// Creates an empty log that persists into `storage`.
    pub fn new(storage: Arc<dyn BlobStorage>) -> Self {
        Self {
            entries: VecDeque::new(),
            storage,
        }
    }

    /// Restores the log from storage.
    ///
    /// Unreadable or corrupt data yields an empty log; a stored log longer than
    /// the limit is truncated.
    pub async fn load(storage: Arc<dyn BlobStorage>) -> Self {
        let mut log = Self::new(storage);

        let blob = match log.storage.read(HISTORY_KEY).await {
            Ok(Some(blob)) => blob,
            Ok(None) => return log,
            Err(e) => {
                warn!("Failed to read saved history: {e}");
                return log;
            }
        };

        match serde_json::from_str::<Vec<QueryResult>>(&blob) {
            Ok(results) => {
                log.entries = results
                    .into_iter()
                    .take(MAX_HISTORY_ENTRIES)
                    .map(Arc::new)
                    .collect();
                debug!("Loaded {} history entries", log.entries.len());
            }
            Err(e) => warn!("Failed to parse saved history, starting empty: {e}"),
        }

        log
    }

    /// Adds a result at the front, evicting the oldest past the limit.
    ///
    /// The log is persisted afterwards; a persistence failure is logged and
    /// does not undo the append.
    pub async fn record(&mut self, result: QueryResult) -> Arc<QueryResult> {
        let entry = Arc::new(result);
        self.entries.push_front(Arc::clone(&entry));
        self.entries.truncate(MAX_HISTORY_ENTRIES);

        if let Err(e) = self.persist().await {
            warn!("Failed to save query history: {e}");
        }

        entry
    }

    /// Returns a shared reference to the entry with the given id.
    pub fn select(&self, id: Uuid) -> Option<Arc<QueryResult>> {
        self.entries.iter().find(|entry| entry.id() == id).cloned()
    }

    /// Empties the log and deletes the persisted copy.
    pub async fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.storage.remove(HISTORY_KEY).await
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &Arc<QueryResult>> {
        self.entries.iter()
    }

    /// List items for the history view, newest first.
    pub fn summaries(&self) -> Vec<HistorySummary> {
        self.entries
            .iter()
            .map(|entry| HistorySummary::from(entry.as_ref()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn persist(&self) -> Result<()> {
        let results: Vec<&QueryResult> = self.entries.iter().map(Arc::as_ref).collect();
        let blob = serde_json::to_string(&results)
            .map_err(|e| ConsoleError::internal(format!("Failed to serialize history: {e}")))?;
        self.storage.write(HISTORY_KEY, &blob).await
    }
}

/// One line in the history list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub id: Uuid,
    pub query_preview: String,
    pub row_count: usize,
    pub execution_time: u64,
    pub timestamp: DateTime<Utc>,
}

impl From<&QueryResult> for HistorySummary {
    fn from(result: &QueryResult) -> Self {
        Self {
            id: result.id(),
            query_preview: preview(result.query()),
            row_count: result.row_count(),
            execution_time: result.execution_time_ms(),
            timestamp: result.timestamp(),
        }
    }
}

fn preview(sql: &str) -> String {
    match sql.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &sql[..cut]),
        None => sql.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{QueryOutput, Row, Value};
    use crate::persistence::MemoryStorage;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn result(sql: &str) -> QueryResult {
        let rows = vec![Row::from_iter([("n", Value::Int(1))])];
        QueryResult::new(sql, QueryOutput::with_rows(vec![], rows), Duration::from_millis(3), None)
    }

    struct FailingStorage;

    #[async_trait]
    impl BlobStorage for FailingStorage {
        async fn read(&self, _key: &str) -> Result<Option<String>> {
            Err(ConsoleError::storage("unavailable"))
        }

        async fn write(&self, _key: &str, _value: &str) -> Result<()> {
            Err(ConsoleError::storage("read-only"))
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Err(ConsoleError::storage("read-only"))
        }
    }

    #[tokio::test]
    async fn test_record_is_newest_first_and_persisted() {
        let storage = Arc::new(MemoryStorage::new());
        let mut log = HistoryLog::new(storage.clone());

        log.record(result("SELECT 1")).await;
        log.record(result("SELECT 2")).await;

        let queries: Vec<&str> = log.entries().map(|e| e.query()).collect();
        assert_eq!(queries, vec!["SELECT 2", "SELECT 1"]);

        let restored = HistoryLog::load(storage).await;
        let queries: Vec<&str> = restored.entries().map(|e| e.query()).collect();
        assert_eq!(queries, vec!["SELECT 2", "SELECT 1"]);
    }

    #[tokio::test]
    async fn test_fifty_first_entry_evicts_oldest() {
        let mut log = HistoryLog::new(Arc::new(MemoryStorage::new()));

        for i in 0..=MAX_HISTORY_ENTRIES {
            log.record(result(&format!("SELECT {i}"))).await;
        }

        assert_eq!(log.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(log.entries().next().unwrap().query(), "SELECT 50");
        assert_eq!(log.entries().last().unwrap().query(), "SELECT 1");
    }

    #[tokio::test]
    async fn test_select_returns_shared_entry() {
        let mut log = HistoryLog::new(Arc::new(MemoryStorage::new()));
        let recorded = log.record(result("SELECT 1")).await;

        let selected = log.select(recorded.id()).unwrap();
        assert!(Arc::ptr_eq(&recorded, &selected));
        assert!(log.select(Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_persisted_copy() {
        let storage = Arc::new(MemoryStorage::new());
        let mut log = HistoryLog::new(storage.clone());
        log.record(result("SELECT 1")).await;
        assert!(storage.contains(HISTORY_KEY));

        log.clear().await.unwrap();

        assert!(log.is_empty());
        assert!(!storage.contains(HISTORY_KEY));
        assert!(HistoryLog::load(storage).await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_blob_loads_empty() {
        let storage = Arc::new(MemoryStorage::with_blob(HISTORY_KEY, "{not json"));
        let log = HistoryLog::load(storage).await;
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_edited_row_count_is_ignored_on_load() {
        let mut blob = serde_json::to_value(vec![result("SELECT 1")]).unwrap();
        blob[0]["rowCount"] = serde_json::json!(7);
        let storage = Arc::new(MemoryStorage::with_blob(HISTORY_KEY, blob.to_string()));

        let log = HistoryLog::load(storage).await;

        let entry = log.entries().next().unwrap();
        assert_eq!(entry.row_count(), 1);
        assert_eq!(log.summaries()[0].row_count, 1);
    }

    #[tokio::test]
    async fn test_overlong_stored_log_is_truncated() {
        let results: Vec<QueryResult> = (0..60).map(|i| result(&format!("SELECT {i}"))).collect();
        let blob = serde_json::to_string(&results).unwrap();
        let storage = Arc::new(MemoryStorage::with_blob(HISTORY_KEY, blob));

        let log = HistoryLog::load(storage).await;

        assert_eq!(log.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(log.entries().next().unwrap().query(), "SELECT 0");
    }

    #[tokio::test]
    async fn test_storage_failures_do_not_lose_results() {
        let mut log = HistoryLog::load(Arc::new(FailingStorage)).await;
        assert!(log.is_empty());

        log.record(result("SELECT 1")).await;
        assert_eq!(log.len(), 1);

        assert!(log.clear().await.is_err());
        assert!(log.is_empty());
    }

    #[test]
    fn test_summary_preview_is_truncated() {
        let long_sql = format!("SELECT '{}'", "x".repeat(300));
        let summary = HistorySummary::from(&result(&long_sql));

        assert_eq!(summary.query_preview.chars().count(), PREVIEW_CHARS + 3);
        assert!(summary.query_preview.ends_with("..."));
        assert_eq!(summary.row_count, 1);

        let summary = HistorySummary::from(&result("SELECT 1"));
        assert_eq!(summary.query_preview, "SELECT 1");
    }
}
