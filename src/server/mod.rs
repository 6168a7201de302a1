//! HTTP surface of the console.
//!
//! Routes:
//! - `GET  /api/db/connect`          probe the environment configuration
//! - `POST /api/db/connect`          probe connection details from the form
//! - `POST /api/query`               run SQL and record it in history
//! - `GET  /api/history`             history list items
//! - `DELETE /api/history`           clear history
//! - `GET  /api/history/:id`         one stored result
//! - `GET  /api/history/:id/view`    display model of a stored result
//! - `GET  /api/history/:id/csv`     CSV download of a stored result

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::EnvConfig;
use crate::connection::ConnectionProbe;
use crate::db::Connector;
use crate::error::{ConsoleError, Result};
use crate::history::HistoryLog;
use crate::query::QueryExecutor;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub(crate) env: Arc<EnvConfig>,
    pub(crate) label: Option<String>,
    pub(crate) executor: QueryExecutor,
    pub(crate) probe: ConnectionProbe,
    pub(crate) history: Arc<Mutex<HistoryLog>>,
}

impl AppState {
    /// Builds the state around one connector.
    ///
    /// `env` is resolved on every request, so a missing variable is reported
    /// each time rather than once at startup.
    pub fn new(
        connector: Arc<dyn Connector>,
        env: EnvConfig,
        label: Option<String>,
        history: HistoryLog,
    ) -> Self {
        Self {
            env: Arc::new(env),
            label,
            executor: QueryExecutor::new(Arc::clone(&connector)),
            probe: ConnectionProbe::new(connector),
            history: Arc::new(Mutex::new(history)),
        }
    }
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/db/connect",
            get(api::api_check_connection).post(api::api_test_connection),
        )
        .route("/api/query", post(api::api_query))
        .route(
            "/api/history",
            get(api::api_history).delete(api::api_clear_history),
        )
        .route("/api/history/:id", get(api::api_history_entry))
        .route("/api/history/:id/view", get(api::api_history_view))
        .route("/api/history/:id/csv", get(api::api_history_csv))
        .with_state(state)
}

/// Serves the API on `bind` until Ctrl-C.
pub async fn serve(state: AppState, bind: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| ConsoleError::config(format!("Failed to bind {bind}: {e}")))?;

    let local = listener
        .local_addr()
        .map_err(|e| ConsoleError::internal(format!("Failed to read bound address: {e}")))?;
    info!("psqueelie listening on http://{local}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ConsoleError::internal(format!("Server error: {e}")))?;

    info!("psqueelie stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
