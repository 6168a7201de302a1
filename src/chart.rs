//! Chart classification for query results.
//!
//! Looks at the shape of a result's rows and decides whether a chart makes
//! sense. The heuristic never fails: anything it cannot chart simply gets no
//! chart, and the table view remains.

use serde::Serialize;

use crate::db::{Row, Value};

/// At most this many rows are plotted.
pub const MAX_CHART_POINTS: usize = 20;

/// Number of distinct series colours before they repeat.
const PALETTE_SIZE: usize = 5;

/// How a result should be charted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChartConfig {
    /// Bar chart of one numeric column against one label column.
    #[serde(rename_all = "camelCase")]
    Categorical {
        label_column: String,
        value_column: String,
        series: SeriesStyle,
        data: Vec<CategoryPoint>,
    },

    /// Line chart with one series per numeric column, indexed by row position.
    #[serde(rename = "numeric")]
    NumericSeries {
        series: Vec<SeriesStyle>,
        data: Vec<SeriesPoint>,
    },
}

impl ChartConfig {
    /// Number of plotted points.
    pub fn len(&self) -> usize {
        match self {
            Self::Categorical { data, .. } => data.len(),
            Self::NumericSeries { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Label and colour token for one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesStyle {
    /// Column the series reads from.
    pub key: String,
    pub label: String,
    pub color: String,
}

impl SeriesStyle {
    fn new(column: &str, position: usize) -> Self {
        Self {
            key: column.to_string(),
            label: column.to_string(),
            color: format!("hsl(var(--chart-{}))", (position % PALETTE_SIZE) + 1),
        }
    }
}

/// One bar of a categorical chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryPoint {
    pub name: String,
    pub value: f64,
}

/// One x position of a numeric multi-series chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub index: usize,
    /// One value per series, in series order.
    pub values: Vec<f64>,
}

/// Decides whether and how `rows` can be charted.
///
/// Column order comes from the first row. A column is numeric when every
/// value in it is null, missing, or coerces to a number.
pub fn classify(rows: &[Row]) -> Option<ChartConfig> {
    let first = rows.first()?;

    let (numeric, other): (Vec<&str>, Vec<&str>) = first
        .columns()
        .partition(|column| is_numeric_column(rows, column));

    match (other.first(), numeric.first()) {
        (Some(label), Some(value)) => Some(categorical(rows, label, value)),
        (None, _) if numeric.len() >= 2 => Some(numeric_series(rows, &numeric)),
        _ => None,
    }
}

fn is_numeric_column(rows: &[Row], column: &str) -> bool {
    rows.iter().all(|row| match row.get(column) {
        None | Some(Value::Null) => true,
        Some(value) => value.as_number().is_some(),
    })
}

fn categorical(rows: &[Row], label: &str, value: &str) -> ChartConfig {
    let data = rows
        .iter()
        .take(MAX_CHART_POINTS)
        .map(|row| CategoryPoint {
            name: label_text(row.get(label)),
            value: number_or_zero(row.get(value)),
        })
        .collect();

    ChartConfig::Categorical {
        label_column: label.to_string(),
        value_column: value.to_string(),
        series: SeriesStyle::new(value, 0),
        data,
    }
}

fn numeric_series(rows: &[Row], columns: &[&str]) -> ChartConfig {
    let series = columns
        .iter()
        .enumerate()
        .map(|(position, column)| SeriesStyle::new(column, position))
        .collect();

    let data = rows
        .iter()
        .take(MAX_CHART_POINTS)
        .enumerate()
        .map(|(index, row)| SeriesPoint {
            index,
            values: columns
                .iter()
                .map(|column| number_or_zero(row.get(column)))
                .collect(),
        })
        .collect();

    ChartConfig::NumericSeries { series, data }
}

fn label_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "Unknown".to_string(),
        Some(Value::String(s)) if s.is_empty() => "Unknown".to_string(),
        Some(value) => value.to_display_string(),
    }
}

fn number_or_zero(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_number).unwrap_or(0.0)
}
