//! The captured output of one executed query.

use crate::db::{FieldDescriptor, QueryOutput, Row};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// One executed SQL batch with its rows and metadata.
///
/// Immutable once created: there are accessors but no setters. Serialized
/// field names match the JSON returned by the query endpoint. A stored
/// `rowCount` is ignored on load and recomputed from `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredQueryResult")]
pub struct QueryResult {
    id: Uuid,
    query: String,
    data: Vec<Row>,
    fields: Vec<FieldDescriptor>,
    row_count: usize,
    #[serde(default)]
    rows_affected: u64,
    /// Milliseconds.
    execution_time: u64,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    connection_name: Option<String>,
}

/// On-disk form of a [`QueryResult`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredQueryResult {
    id: Uuid,
    query: String,
    data: Vec<Row>,
    fields: Vec<FieldDescriptor>,
    #[serde(default)]
    rows_affected: u64,
    execution_time: u64,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    connection_name: Option<String>,
}

impl From<StoredQueryResult> for QueryResult {
    fn from(stored: StoredQueryResult) -> Self {
        Self {
            id: stored.id,
            query: stored.query,
            row_count: stored.data.len(),
            data: stored.data,
            fields: stored.fields,
            rows_affected: stored.rows_affected,
            execution_time: stored.execution_time,
            timestamp: stored.timestamp,
            connection_name: stored.connection_name,
        }
    }
}

impl QueryResult {
    /// Captures `output` as a new result with a fresh id and the current time.
    pub fn new(
        query: impl Into<String>,
        output: QueryOutput,
        execution_time: Duration,
        connection_name: Option<String>,
    ) -> Self {
        let QueryOutput {
            fields,
            rows,
            rows_affected,
        } = output;

        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            row_count: rows.len(),
            data: rows,
            fields,
            rows_affected,
            execution_time: u64::try_from(execution_time.as_millis()).unwrap_or(u64::MAX),
            timestamp: Utc::now(),
            connection_name,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The SQL text exactly as submitted.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn rows(&self) -> &[Row] {
        &self.data
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Number of rows returned; always equal to `rows().len()`.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Execution latency in whole milliseconds.
    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn connection_name(&self) -> Option<&str> {
        self.connection_name.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Value;
    use pretty_assertions::assert_eq;

    fn sample() -> QueryResult {
        let rows = vec![
            Row::from_iter([("name", Value::from("a")), ("count", Value::Int(3))]),
            Row::from_iter([("name", Value::from("b")), ("count", Value::Int(7))]),
        ];
        let fields = vec![FieldDescriptor::new("name", 25), FieldDescriptor::new("count", 23)];
        QueryResult::new(
            "SELECT name, count FROM t",
            QueryOutput::with_rows(fields, rows),
            Duration::from_millis(12),
            Some("local".to_string()),
        )
    }

    #[test]
    fn test_row_count_matches_rows() {
        let result = sample();
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.rows().len(), result.row_count());
        assert_eq!(result.execution_time_ms(), 12);
        assert_eq!(result.connection_name(), Some("local"));
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(sample().id(), sample().id());
    }

    #[test]
    fn test_wire_shape() {
        let result = sample();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["query"], "SELECT name, count FROM t");
        assert_eq!(json["rowCount"], 2);
        assert_eq!(json["executionTime"], 12);
        assert_eq!(json["data"][1]["count"], 7);
        assert_eq!(json["fields"][0]["dataTypeID"], 25);
        assert_eq!(json["connectionName"], "local");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_timestamp_survives_serialization() {
        let result = sample();
        let text = serde_json::to_string(&result).unwrap();
        let restored: QueryResult = serde_json::from_str(&text).unwrap();

        assert_eq!(restored.timestamp(), result.timestamp());
        assert_eq!(restored, result);
    }

    #[test]
    fn test_stored_row_count_is_recomputed() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["rowCount"] = serde_json::json!(99);

        let restored: QueryResult = serde_json::from_value(json).unwrap();
        assert_eq!(restored.row_count(), 2);
        assert_eq!(restored.rows().len(), restored.row_count());
    }
}
