//! PostgreSQL database client implementation.
//!
//! Provides [`PostgresConnector`] and [`PostgresClient`], which open a single
//! `PgConnection` per operation using sqlx.

use crate::config::ConnectionConfig;
use crate::db::{Connector, DatabaseClient, FieldDescriptor, QueryOutput, Row, Value};
use crate::error::{ConsoleError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgColumn, PgConnection, PgRow};
use sqlx::{
    Column as SqlxColumn, ConnectOptions, Connection, Either, Executor, Row as SqlxRow, TypeInfo,
};
use std::time::Duration;
use tracing::debug;

/// Opens one PostgreSQL connection per operation.
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    connect_timeout: Duration,
}

impl PostgresConnector {
    /// Creates a connector that gives up connecting after `connect_timeout`.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
        let client = PostgresClient::connect(config, self.connect_timeout).await?;
        Ok(Box::new(client))
    }
}

/// A single, exclusively owned PostgreSQL connection.
#[derive(Debug)]
pub struct PostgresClient {
    conn: PgConnection,
}

impl PostgresClient {
    /// Connects to the database described by `config`.
    ///
    /// No retries: a failure is reported straight back to the caller.
    pub async fn connect(config: &ConnectionConfig, connect_timeout: Duration) -> Result<Self> {
        debug!("Connecting to {}", config.display_string());

        let conn = tokio::time::timeout(connect_timeout, config.connect_options().connect())
            .await
            .map_err(|_| {
                ConsoleError::connection(format!(
                    "Connection to {}:{} timed out after {} seconds.",
                    config.host,
                    config.port,
                    connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| map_connection_error(e, config))?;

        debug!("Connected to {}", config.display_string());
        Ok(Self { conn })
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn execute_batch(&mut self, sql: &str) -> Result<QueryOutput> {
        let mut current: Vec<PgRow> = Vec::new();
        let mut last: Option<(Vec<PgRow>, u64)> = None;

        {
            // Simple-query protocol: the batch goes to the engine as typed.
            let mut stream = sqlx::raw_sql(sql).fetch_many(&mut self.conn);

            while let Some(item) = stream
                .try_next()
                .await
                .map_err(|e| ConsoleError::query(format_query_error(e)))?
            {
                match item {
                    Either::Left(done) => {
                        last = Some((std::mem::take(&mut current), done.rows_affected()));
                    }
                    Either::Right(row) => current.push(row),
                }
            }
        }

        if !current.is_empty() {
            let count = current.len() as u64;
            last = Some((current, count));
        }

        let (pg_rows, rows_affected) = last.unwrap_or_default();

        let fields = pg_rows
            .first()
            .map(|first| first.columns().iter().map(field_descriptor).collect())
            .unwrap_or_default();

        let rows = pg_rows.iter().map(convert_row).collect();

        Ok(QueryOutput {
            fields,
            rows,
            rows_affected,
        })
    }

    async fn describe_fields(&mut self, sql: &str) -> Vec<FieldDescriptor> {
        match (&mut self.conn).describe(sql).await {
            Ok(described) => described.columns().iter().map(field_descriptor).collect(),
            Err(e) => {
                debug!("Could not describe statement: {e}");
                Vec::new()
            }
        }
    }

    async fn server_version(&mut self) -> Result<String> {
        sqlx::query_scalar::<_, String>("SELECT version()")
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| ConsoleError::query(format_query_error(e)))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| ConsoleError::connection(format!("Failed to close connection: {e}")))
    }
}

/// Builds a field descriptor from driver column metadata.
fn field_descriptor(column: &PgColumn) -> FieldDescriptor {
    let type_info = column.type_info();
    let data_type_id = type_info.oid().map(|oid| oid.0).unwrap_or(0);

    FieldDescriptor {
        name: column.name().to_string(),
        data_type_id,
        data_type_size: builtin_type_size(data_type_id),
        data_type_modifier: -1,
        format: "text".to_string(),
    }
}

/// Fixed storage length (`pg_type.typlen`) of common built-in types.
fn builtin_type_size(oid: u32) -> i16 {
    match oid {
        16 | 18 => 1, // bool, "char"
        19 => 64, // name
        21 => 2, // int2
        23 | 26 | 700 | 1082 => 4, // int4, oid, float4, date
        20 | 701 | 790 | 1083 | 1114 | 1184 => 8, // int8, float8, money, time, timestamp(tz)
        1266 => 12, // timetz
        1186 | 2950 => 16, // interval, uuid
        _ => -1,
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            (
                col.name().to_string(),
                convert_value(row, i, col.type_info().name()),
            )
        })
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
///
/// Values arrive in text format. Booleans, integers and floats get native
/// tags; everything else keeps the engine's text rendering.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        _ => row
            .try_get_unchecked::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Maps sqlx connection errors to human-readable diagnostics.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> ConsoleError {
    let host = &config.host;
    let port = config.port;
    let user = &config.user;
    let database = &config.database;

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        ConsoleError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        ConsoleError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        ConsoleError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        ConsoleError::connection("Server requires SSL/TLS and the connection could not be secured.")
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        ConsoleError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        ConsoleError::connection(error.to_string())
    }
}

/// Formats a query error with detail and hint lines when the engine sent them.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
