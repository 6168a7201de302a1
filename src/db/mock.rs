//! Mock database connector for testing and `--mock-db` mode.
//!
//! Returns scripted results without a real server and counts how many
//! connections were opened and closed.

use super::{Connector, DatabaseClient, FieldDescriptor, QueryOutput, Row};
use crate::config::ConnectionConfig;
use crate::error::{ConsoleError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const MOCK_VERSION: &str = "PostgreSQL 16.0 (psqueelie mock)";

#[derive(Default)]
struct MockState {
    scripted: Mutex<HashMap<String, std::result::Result<QueryOutput, String>>>,
    described: Mutex<HashMap<String, Vec<FieldDescriptor>>>,
    connect_error: Mutex<Option<String>>,
    query_delay: Mutex<Option<Duration>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

/// Connection counters observed by a [`MockConnector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockStats {
    pub connects: usize,
    pub closes: usize,
}

/// A connector whose clients answer from a script.
///
/// Unscripted `SELECT` statements return one text row; anything else returns
/// an empty result.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the output returned for an exact SQL string.
    pub fn with_result(self, sql: impl Into<String>, output: QueryOutput) -> Self {
        if let Ok(mut scripted) = self.state.scripted.lock() {
            scripted.insert(sql.into(), Ok(output));
        }
        self
    }

    /// Scripts an engine error for an exact SQL string.
    pub fn with_query_error(self, sql: impl Into<String>, message: impl Into<String>) -> Self {
        if let Ok(mut scripted) = self.state.scripted.lock() {
            scripted.insert(sql.into(), Err(message.into()));
        }
        self
    }

    /// Scripts the columns reported when describing an exact SQL string.
    pub fn with_described_fields(self, sql: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        if let Ok(mut described) = self.state.described.lock() {
            described.insert(sql.into(), fields);
        }
        self
    }

    /// Makes every connection attempt fail with the given message.
    pub fn failing_connect(self, message: impl Into<String>) -> Self {
        if let Ok(mut error) = self.state.connect_error.lock() {
            *error = Some(message.into());
        }
        self
    }

    /// Delays every round trip, to make latency measurable.
    pub fn with_query_delay(self, delay: Duration) -> Self {
        if let Ok(mut slot) = self.state.query_delay.lock() {
            *slot = Some(delay);
        }
        self
    }

    /// Returns connection open/close counts so far.
    pub fn stats(&self) -> MockStats {
        MockStats {
            connects: self.state.connects.load(Ordering::SeqCst),
            closes: self.state.closes.load(Ordering::SeqCst),
        }
    }

    /// Returns every SQL string sent to the mock, oldest first.
    pub fn executed(&self) -> Vec<String> {
        self.state
            .executed
            .lock()
            .map(|executed| executed.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
        let connect_error = self
            .state
            .connect_error
            .lock()
            .map_err(|_| ConsoleError::internal("mock state poisoned"))?
            .clone();

        if let Some(message) = connect_error {
            return Err(ConsoleError::connection(message));
        }

        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDatabaseClient {
            state: Arc::clone(&self.state),
        }))
    }
}

/// A client handed out by [`MockConnector`].
pub struct MockDatabaseClient {
    state: Arc<MockState>,
}

impl MockDatabaseClient {
    async fn round_trip(&self) {
        let delay = self.state.query_delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn default_output(sql: &str) -> QueryOutput {
        if sql.trim_start().to_uppercase().starts_with("SELECT") {
            let mut row = Row::new();
            row.insert("result", format!("Mock result for: {sql}"));
            QueryOutput::with_rows(vec![FieldDescriptor::new("result", 25)], vec![row])
        } else {
            QueryOutput::default()
        }
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute_batch(&mut self, sql: &str) -> Result<QueryOutput> {
        self.round_trip().await;

        if let Ok(mut executed) = self.state.executed.lock() {
            executed.push(sql.to_string());
        }

        let scripted = self
            .state
            .scripted
            .lock()
            .map_err(|_| ConsoleError::internal("mock state poisoned"))?
            .get(sql)
            .cloned();

        match scripted {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(ConsoleError::query(message)),
            None => Ok(Self::default_output(sql)),
        }
    }

    async fn describe_fields(&mut self, sql: &str) -> Vec<FieldDescriptor> {
        self.round_trip().await;
        self.state
            .described
            .lock()
            .ok()
            .and_then(|described| described.get(sql).cloned())
            .unwrap_or_default()
    }

    async fn server_version(&mut self) -> Result<String> {
        Ok(MOCK_VERSION.to_string())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
