//! Ad-hoc query execution.
//!
//! Each call opens a connection, runs the SQL verbatim, measures how long the
//! engine took and closes the connection again, whether or not the query
//! succeeded.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::db::Connector;
use crate::error::{ConsoleError, Result};
use crate::query::QueryResult;

/// Runs ad-hoc SQL against the configured database.
#[derive(Clone)]
pub struct QueryExecutor {
    connector: Arc<dyn Connector>,
}

impl QueryExecutor {
    /// Creates a new query executor.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Executes `sql` and captures its result.
    ///
    /// Blank input is rejected before any connection is attempted. There is
    /// no parsing, restriction or retry: engine errors come back as
    /// [`ConsoleError::Query`] carrying the engine's message.
    pub async fn execute(&self, config: &ConnectionConfig, sql: &str) -> Result<QueryResult> {
        if sql.trim().is_empty() {
            return Err(ConsoleError::invalid_input("Query is required"));
        }

        let mut client = self.connector.connect(config).await?;
        debug!("Executing query on {}", config.display_string());

        let start = Instant::now();
        let outcome = client.execute_batch(sql).await;
        let execution_time = start.elapsed();

        // Row-less statements carry no column metadata; look it up outside
        // the timed window.
        let outcome = match outcome {
            Ok(mut output) if output.rows.is_empty() && output.fields.is_empty() => {
                output.fields = client.describe_fields(sql).await;
                Ok(output)
            }
            other => other,
        };

        if let Err(e) = client.close().await {
            warn!("Failed to close connection cleanly: {e}");
        }

        match outcome {
            Ok(output) => {
                let result =
                    QueryResult::new(sql, output, execution_time, config.label.clone());
                info!(
                    "Query returned {} rows in {}ms",
                    result.row_count(),
                    result.execution_time_ms()
                );
                Ok(result)
            }
            Err(e) => {
                warn!("Query execution failed: {}", e.details());
                Err(e)
            }
        }
    }
}
