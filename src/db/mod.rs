//! Database abstraction layer for psqueelie.
//!
//! Every operation opens its own connection through a [`Connector`], uses it
//! for exactly one job and closes it again. There is no pool.

mod mock;
mod postgres;
mod types;

pub use mock::{MockConnector, MockDatabaseClient, MockStats};
pub use postgres::{PostgresClient, PostgresConnector};
pub use types::{FieldDescriptor, QueryOutput, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Opens single-use database connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establishes a new connection for the given configuration.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>>;
}

/// Trait defining the interface for database clients.
///
/// All database operations are async and return Results with ConsoleError.
#[async_trait]
pub trait DatabaseClient: Send {
    /// Sends `sql` to the engine verbatim and returns the output of the last
    /// statement in the batch.
    ///
    /// Field metadata is only filled in from returned rows; see
    /// [`DatabaseClient::describe_fields`] for row-less statements.
    async fn execute_batch(&mut self, sql: &str) -> Result<QueryOutput>;

    /// Looks up the result columns of `sql` without running it.
    ///
    /// Best effort: statements that cannot be described yield no fields.
    async fn describe_fields(&mut self, _sql: &str) -> Vec<FieldDescriptor> {
        Vec::new()
    }

    /// Returns the engine's version string.
    async fn server_version(&mut self) -> Result<String>;

    /// Closes the database connection.
    async fn close(self: Box<Self>) -> Result<()>;
}
