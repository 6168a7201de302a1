//! Presentation models for query results.
//!
//! Everything here is pure: a [`QueryResult`] goes in, display-ready text and
//! structures come out. The HTTP layer serializes these; the CLI prints them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chart::{self, ChartConfig};
use crate::config::{ENV_DATABASE, ENV_HOST, ENV_PASSWORD, ENV_PORT, ENV_USER};
use crate::db::{Row, Value};
use crate::error::{ConsoleError, Result};
use crate::query::QueryResult;

/// Rows shown in the table preview.
pub const MAX_PREVIEW_ROWS: usize = 100;

pub const EMPTY_RESULT_MESSAGE: &str = "No data returned from query";

/// Tabs offered for a non-empty result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultTab {
    Table,
    Chart,
}

/// Display model of one query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub query: String,
    /// `1 row` or `N rows`.
    pub row_badge: String,
    pub execution_time: u64,
    pub columns: Vec<String>,
    /// At most [`MAX_PREVIEW_ROWS`] rows of display text, nulls as `null`.
    pub rows: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation_note: Option<String>,
    pub tabs: Vec<ResultTab>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<&'static str>,
}

impl ResultView {
    pub fn new(result: &QueryResult) -> Self {
        let row_badge = row_badge(result.row_count());

        if result.is_empty() {
            return Self {
                query: result.query().to_string(),
                row_badge,
                execution_time: result.execution_time_ms(),
                columns: column_names(result),
                rows: Vec::new(),
                truncation_note: None,
                tabs: Vec::new(),
                chart: None,
                empty_message: Some(EMPTY_RESULT_MESSAGE),
            };
        }

        let columns = column_names(result);
        let rows = result
            .rows()
            .iter()
            .take(MAX_PREVIEW_ROWS)
            .map(|row| display_cells(row, &columns))
            .collect();

        let truncation_note = (result.rows().len() > MAX_PREVIEW_ROWS).then(|| {
            format!(
                "Showing first {MAX_PREVIEW_ROWS} rows of {} total rows",
                result.rows().len()
            )
        });

        let chart = chart::classify(result.rows());
        let mut tabs = vec![ResultTab::Table];
        if chart.is_some() {
            tabs.push(ResultTab::Chart);
        }

        Self {
            query: result.query().to_string(),
            row_badge,
            execution_time: result.execution_time_ms(),
            columns,
            rows,
            truncation_note,
            tabs,
            chart,
            empty_message: None,
        }
    }
}

/// `1 row` for one, `N rows` otherwise.
pub fn row_badge(count: usize) -> String {
    if count == 1 {
        "1 row".to_string()
    } else {
        format!("{count} rows")
    }
}

/// Table headers: the field descriptors, or the first row's keys when the
/// engine reported none.
fn column_names(result: &QueryResult) -> Vec<String> {
    if !result.fields().is_empty() {
        return result.fields().iter().map(|f| f.name.clone()).collect();
    }

    result
        .rows()
        .first()
        .map(|row| row.columns().map(String::from).collect())
        .unwrap_or_default()
}

fn display_cells(row: &Row, columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .map(|column| {
            row.get(column)
                .map(Value::to_display_string)
                .unwrap_or_else(|| "null".to_string())
        })
        .collect()
}

/// Renders the rows as CSV with a header taken from the first row.
///
/// Nulls become empty cells. Returns `None` for a result without rows.
pub fn to_csv(rows: &[Row]) -> Result<Option<String>> {
    let Some(first) = rows.first() else {
        return Ok(None);
    };
    let headers: Vec<&str> = first.columns().collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&headers).map_err(csv_error)?;

    for row in rows {
        let record = headers.iter().map(|column| match row.get(column) {
            None | Some(Value::Null) => String::new(),
            Some(value) => value.to_display_string(),
        });
        writer.write_record(record).map_err(csv_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ConsoleError::internal(format!("Failed to finish CSV export: {e}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| ConsoleError::internal(format!("CSV export is not valid UTF-8: {e}")))?;

    Ok(Some(text))
}

fn csv_error(e: csv::Error) -> ConsoleError {
    ConsoleError::internal(format!("Failed to write CSV: {e}"))
}

/// Download name for a CSV export made at `at`.
pub fn csv_file_name(at: DateTime<Utc>) -> String {
    format!("query-results-{}.csv", at.format("%Y-%m-%dT%H:%M:%S"))
}

/// Formats a result as an aligned plain-text table for terminal output.
pub fn format_table(result: &QueryResult) -> String {
    let headers = column_names(result);
    if headers.is_empty() {
        return format!(
            "Query executed in {}ms. {} row(s) affected.",
            result.execution_time_ms(),
            result.rows_affected()
        );
    }

    let rows: Vec<Vec<String>> = result
        .rows()
        .iter()
        .map(|row| display_cells(row, &headers))
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut output = String::new();

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, width)| format!("{h:width$}"))
        .collect();
    output.push_str(&header_line.join(" │ "));
    output.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    output.push_str(&separator.join("─┼─"));
    output.push('\n');

    for row in &rows {
        let row_line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:width$}"))
            .collect();
        output.push_str(row_line.join(" │ ").trim_end());
        output.push('\n');
    }

    output.push_str(&format!(
        "({}, {}ms)",
        row_badge(result.row_count()),
        result.execution_time_ms()
    ));
    output
}

/// Sample `.env` listing every connection variable.
pub fn env_template() -> String {
    format!(
        "# PostgreSQL Database Configuration\n\
         {ENV_HOST}=localhost\n\
         {ENV_PORT}=5432\n\
         {ENV_DATABASE}=your_database_name\n\
         {ENV_USER}=your_username\n\
         {ENV_PASSWORD}=your_password"
    )
}

/// Step-by-step instructions shown when the connection is not configured.
pub fn setup_guide(error: &ConsoleError) -> String {
    format!(
        "Database Configuration Required\n\n\
         Error: {}\n\n\
         To get started, you need to set up your database environment variables.\n\
         1. Create a .env file in your project root\n\
         2. Add your PostgreSQL connection details (see template below)\n\
         3. Restart psqueelie\n\
         4. Test the connection again\n\n\
         {}\n\n\
         Replace the placeholder values with your actual PostgreSQL credentials.",
        error.details(),
        env_template()
    )
}
