//! Request handlers for the console API.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::config::{ConnectionConfig, ConnectionForm};
use crate::error::ConsoleError;
use crate::history::HistorySummary;
use crate::query::QueryResult;
use crate::view::{self, ResultView};

// ── Request/response types ───────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub success: bool,
    pub message: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Option<String>,
}

/// A query result with the success flag the client checks first.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: Arc<QueryResult>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Names of absent connection variables.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    /// Sample `.env` for configuration errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
}

type ApiFailure = (StatusCode, Json<ApiError>);

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiFailure {
    (
        status,
        Json(ApiError {
            error: msg.into(),
            details: None,
            missing: Vec::new(),
            setup: None,
        }),
    )
}

fn api_error_with_details(status: StatusCode, msg: &str, err: &ConsoleError) -> ApiFailure {
    let (status, Json(mut body)) = api_error(status, msg);
    body.details = Some(err.details());
    (status, Json(body))
}

fn config_error(err: &ConsoleError) -> ApiFailure {
    let (status, Json(mut body)) =
        api_error_with_details(StatusCode::INTERNAL_SERVER_ERROR, "Configuration error", err);
    if let ConsoleError::MissingConfig(missing) = err {
        body.missing = missing.clone();
    }
    body.setup = Some(view::env_template());
    (status, Json(body))
}

fn resolve_config(state: &AppState) -> Result<ConnectionConfig, ApiFailure> {
    state
        .env
        .resolve()
        .map(|config| config.with_label(state.label.clone()))
        .map_err(|e| {
            warn!("Connection is not configured: {}", e.details());
            config_error(&e)
        })
}

/// Unwraps a JSON body, answering malformed input with a JSON error.
fn request_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiFailure> {
    body.map(|Json(value)| value).map_err(|rejection| {
        let err = ConsoleError::invalid_input(rejection.body_text());
        debug!("Rejected request body: {}", err.details());
        api_error_with_details(rejection.status(), "Invalid request body", &err)
    })
}

fn not_found(id: Uuid) -> ApiFailure {
    api_error(StatusCode::NOT_FOUND, format!("No history entry with id {id}"))
}

async fn history_entry(state: &AppState, id: Uuid) -> Result<Arc<QueryResult>, ApiFailure> {
    state.history.lock().await.select(id).ok_or_else(|| not_found(id))
}

// ── GET /api/db/connect ──────────────────────────────────────────

pub async fn api_check_connection(
    State(state): State<AppState>,
) -> Result<Json<ConnectResponse>, ApiFailure> {
    let config = resolve_config(&state)?;

    let report = state.probe.probe(&config).await.map_err(|e| {
        error!("Database connection error: {}", e.details());
        api_error_with_details(StatusCode::INTERNAL_SERVER_ERROR, "Connection failed", &e)
    })?;

    Ok(Json(ConnectResponse {
        success: true,
        message: "Connection successful".to_string(),
        version: report.version,
    }))
}

// ── POST /api/db/connect ─────────────────────────────────────────

pub async fn api_test_connection(
    State(state): State<AppState>,
    body: Result<Json<ConnectionForm>, JsonRejection>,
) -> Result<Json<ConnectResponse>, ApiFailure> {
    let form = request_body(body)?;
    let config = form.validate().map_err(|e| {
        debug!("Rejected connection form: {}", e.details());
        api_error_with_details(StatusCode::BAD_REQUEST, "Invalid connection details", &e)
    })?;

    let report = state.probe.probe(&config).await.map_err(|e| {
        warn!("Connection test for {} failed", config.display_string());
        api_error_with_details(StatusCode::INTERNAL_SERVER_ERROR, "Connection failed", &e)
    })?;

    Ok(Json(ConnectResponse {
        success: true,
        message: "Connection successful".to_string(),
        version: report.version,
    }))
}

// ── POST /api/query ──────────────────────────────────────────────

pub async fn api_query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiFailure> {
    let req = request_body(body)?;
    let sql = req.query.unwrap_or_default();
    if sql.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Query is required"));
    }

    let config = resolve_config(&state)?;

    let result = state.executor.execute(&config, &sql).await.map_err(|e| {
        error!("Query execution error: {}", e.details());
        api_error_with_details(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Query execution failed",
            &e,
        )
    })?;

    let entry = state.history.lock().await.record(result).await;
    info!("Recorded query {} in history", entry.id());

    Ok(Json(QueryResponse {
        success: true,
        result: entry,
    }))
}

// ── /api/history ─────────────────────────────────────────────────

pub async fn api_history(State(state): State<AppState>) -> Json<Vec<HistorySummary>> {
    Json(state.history.lock().await.summaries())
}

pub async fn api_clear_history(
    State(state): State<AppState>,
) -> Result<Json<ClearResponse>, ApiFailure> {
    state.history.lock().await.clear().await.map_err(|e| {
        error!("Failed to clear history: {e}");
        api_error_with_details(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to clear history",
            &e,
        )
    })?;

    info!("Query history cleared");
    Ok(Json(ClearResponse { success: true }))
}

pub async fn api_history_entry(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Arc<QueryResult>>, ApiFailure> {
    history_entry(&state, id).await.map(Json)
}

pub async fn api_history_view(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<ResultView>, ApiFailure> {
    let entry = history_entry(&state, id).await?;
    Ok(Json(ResultView::new(&entry)))
}

pub async fn api_history_csv(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<impl IntoResponse, ApiFailure> {
    let entry = history_entry(&state, id).await?;

    let csv = view::to_csv(entry.rows())
        .map_err(|e| {
            error!("CSV export failed: {e}");
            api_error_with_details(StatusCode::INTERNAL_SERVER_ERROR, "CSV export failed", &e)
        })?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "No data to export"))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        view::csv_file_name(Utc::now())
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}
