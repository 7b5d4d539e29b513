//! Turns raw Athena rows into typed tables or legend-grouped time series.

use std::sync::LazyLock;

use athenaviz_core::{QueryTarget, Series, Table, TableColumn, TargetResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::AthenaError;
use crate::result::AthenaQueryResult;

static LEGEND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(.+?)\s*\}\}").expect("legend regex is valid"));

const DATE_LAYOUT: &str = "%Y-%m-%d";
const TIMESTAMP_LAYOUT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeLayout<'a> {
    Date,
    Timestamp,
    /// RFC 3339 when empty, else a chrono strftime pattern.
    Custom(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind<'a> {
    Text,
    Int,
    Float,
    Bool,
    Time(TimeLayout<'a>),
}

impl CellKind<'_> {
    fn table_type(self) -> &'static str {
        match self {
            CellKind::Text => "string",
            CellKind::Int | CellKind::Float => "number",
            CellKind::Bool => "boolean",
            CellKind::Time(_) => "time",
        }
    }
}

/// Column options taken from a panel target.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameOptions<'a> {
    pub timestamp_column: &'a str,
    pub value_column: &'a str,
    pub legend_format: &'a str,
    pub time_format: &'a str,
}

impl<'a> From<&'a QueryTarget> for FrameOptions<'a> {
    fn from(t: &'a QueryTarget) -> Self {
        Self {
            timestamp_column: &t.timestamp_column,
            value_column: &t.value_column,
            legend_format: &t.legend_format,
            time_format: &t.time_format,
        }
    }
}

struct Layout<'a> {
    kinds: Vec<CellKind<'a>>,
    timestamp_index: Option<usize>,
    value_index: Option<usize>,
    warnings: Vec<String>,
}

fn layout<'a>(result: &AthenaQueryResult, opts: &FrameOptions<'a>) -> Layout<'a> {
    let mut warnings = Vec::new();
    let mut timestamp_index = None;
    let mut value_index = None;

    let kinds = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let mut kind = match column.data_type.as_str() {
                "varchar" => CellKind::Text,
                "tinyint" | "smallint" | "integer" | "bigint" => CellKind::Int,
                "float" | "double" => CellKind::Float,
                "boolean" => CellKind::Bool,
                "date" => CellKind::Time(TimeLayout::Date),
                "timestamp" => CellKind::Time(TimeLayout::Timestamp),
                other => {
                    warnings.push(format!("unknown column type: {other}"));
                    CellKind::Text
                }
            };
            if !opts.timestamp_column.is_empty() && column.name == opts.timestamp_column {
                timestamp_index = Some(i);
                if column.data_type == "varchar" {
                    kind = CellKind::Time(TimeLayout::Custom(opts.time_format));
                }
            }
            if !opts.value_column.is_empty() && column.name == opts.value_column {
                value_index = Some(i);
                kind = CellKind::Float;
            }
            kind
        })
        .collect();

    Layout {
        kinds,
        timestamp_index,
        value_index,
        warnings,
    }
}

fn parse_time(raw: &str, layout: TimeLayout<'_>) -> Result<i64, AthenaError> {
    let bad = |e: chrono::ParseError| AthenaError::ParseError(format!("invalid time '{raw}': {e}"));
    let parsed: DateTime<Utc> = match layout {
        TimeLayout::Date => NaiveDate::parse_from_str(raw, DATE_LAYOUT)
            .map_err(bad)?
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AthenaError::ParseError(format!("invalid date '{raw}'")))?
            .and_utc(),
        TimeLayout::Timestamp => NaiveDateTime::parse_from_str(raw, TIMESTAMP_LAYOUT)
            .map_err(bad)?
            .and_utc(),
        TimeLayout::Custom("") => DateTime::parse_from_rfc3339(raw).map_err(bad)?.with_timezone(&Utc),
        TimeLayout::Custom(format) => match DateTime::parse_from_str(raw, format) {
            Ok(t) => t.with_timezone(&Utc),
            Err(_) => match NaiveDateTime::parse_from_str(raw, format) {
                Ok(t) => t.and_utc(),
                Err(_) => NaiveDate::parse_from_str(raw, format)
                    .map_err(bad)?
                    .and_hms_opt(0, 0, 0)
                    .ok_or_else(|| AthenaError::ParseError(format!("invalid date '{raw}'")))?
                    .and_utc(),
            },
        },
    };
    Ok(parsed.timestamp_millis())
}

fn parse_float(raw: &str) -> Result<f64, AthenaError> {
    raw.trim()
        .parse()
        .map_err(|e| AthenaError::ParseError(format!("invalid number '{raw}': {e}")))
}

fn convert_cell(kind: CellKind<'_>, raw: &str) -> Result<Value, AthenaError> {
    Ok(match kind {
        CellKind::Text => Value::String(raw.to_string()),
        CellKind::Int => {
            let v: i64 = raw
                .trim()
                .parse()
                .map_err(|e| AthenaError::ParseError(format!("invalid integer '{raw}': {e}")))?;
            Value::from(v)
        }
        CellKind::Float => serde_json::Number::from_f64(parse_float(raw)?)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        CellKind::Bool => Value::Bool(raw == "true"),
        CellKind::Time(layout) => Value::from(parse_time(raw, layout)?),
    })
}

/// Drop rows without a timestamp and order the rest by time.
fn rows_by_time<'r>(
    result: &'r AthenaQueryResult,
    index: usize,
    layout: TimeLayout<'_>,
) -> Result<Vec<(i64, &'r [Option<String>])>, AthenaError> {
    let mut rows = Vec::with_capacity(result.rows.len());
    for row in &result.rows {
        let Some(Some(raw)) = row.get(index) else {
            continue;
        };
        rows.push((parse_time(raw, layout)?, row.as_slice()));
    }
    rows.sort_by_key(|(t, _)| *t);
    Ok(rows)
}

/// Render a legend from `labels` (column, value) pairs.
///
/// An empty format yields `{col="v",...}`; otherwise `{{ col }}` placeholders
/// are replaced and unknown ones kept verbatim.
pub fn format_legend(labels: &[(&str, &str)], legend_format: &str) -> String {
    if legend_format.is_empty() {
        let parts: Vec<String> = labels.iter().map(|(k, v)| format!("{k}=\"{v}\"")).collect();
        return format!("{{{}}}", parts.join(","));
    }
    LEGEND_RE
        .replace_all(legend_format, |caps: &Captures<'_>| {
            let column = caps[1].trim();
            labels
                .iter()
                .find(|(k, _)| *k == column)
                .map(|(_, v)| v.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Convert to one typed table. Rows are time-ordered when a timestamp
/// column is configured.
pub fn to_table(result: &AthenaQueryResult, opts: &FrameOptions<'_>) -> Result<(Table, Vec<String>), AthenaError> {
    let layout = layout(result, opts);
    let ordered: Vec<&[Option<String>]> = match layout.timestamp_index {
        Some(i) => {
            let CellKind::Time(time_layout) = layout.kinds[i] else {
                return Err(AthenaError::ParseError(format!(
                    "timestamp column '{}' is not a time column",
                    opts.timestamp_column
                )));
            };
            rows_by_time(result, i, time_layout)?
                .into_iter()
                .map(|(_, row)| row)
                .collect()
        }
        None => result.rows.iter().map(Vec::as_slice).collect(),
    };

    let columns = result
        .columns
        .iter()
        .zip(&layout.kinds)
        .map(|(c, kind)| TableColumn {
            text: c.name.clone(),
            data_type: kind.table_type().to_string(),
        })
        .collect();

    let mut rows = Vec::with_capacity(ordered.len());
    for row in ordered {
        let mut cells = Vec::with_capacity(layout.kinds.len());
        for (i, kind) in layout.kinds.iter().enumerate() {
            let cell = match row.get(i) {
                Some(Some(raw)) => convert_cell(*kind, raw)?,
                _ => Value::Null,
            };
            cells.push(cell);
        }
        rows.push(cells);
    }

    Ok((Table { columns, rows }, layout.warnings))
}

/// Convert to series grouped by legend, in order of first appearance.
pub fn to_series(result: &AthenaQueryResult, opts: &FrameOptions<'_>) -> Result<(Vec<Series>, Vec<String>), AthenaError> {
    let layout = layout(result, opts);
    let ts_index = layout.timestamp_index.ok_or_else(|| {
        AthenaError::ParseError(format!("timestamp column '{}' not found", opts.timestamp_column))
    })?;
    let value_index = layout
        .value_index
        .ok_or_else(|| AthenaError::ParseError(format!("value column '{}' not found", opts.value_column)))?;
    let CellKind::Time(time_layout) = layout.kinds[ts_index] else {
        return Err(AthenaError::ParseError(format!(
            "timestamp column '{}' is not a time column",
            opts.timestamp_column
        )));
    };

    let mut series: Vec<Series> = Vec::new();
    for (t, row) in rows_by_time(result, ts_index, time_layout)? {
        let labels: Vec<(&str, &str)> = result
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != ts_index && *i != value_index)
            .filter_map(|(i, c)| Some((c.name.as_str(), row.get(i)?.as_deref()?)))
            .collect();
        let name = format_legend(&labels, opts.legend_format);

        let value = match row.get(value_index) {
            Some(Some(raw)) => Some(parse_float(raw)?),
            _ => None,
        };

        match series.iter_mut().find(|s| s.name == name) {
            Some(s) => s.points.push((value, t)),
            None => series.push(Series {
                name,
                points: vec![(value, t)],
            }),
        }
    }

    Ok((series, layout.warnings))
}

/// Convert according to the target's format.
pub fn convert(result: &AthenaQueryResult, target: &QueryTarget) -> Result<TargetResult, AthenaError> {
    let opts = FrameOptions::from(target);
    if target.is_table() {
        let (table, warnings) = to_table(result, &opts)?;
        Ok(TargetResult {
            tables: vec![table],
            warnings,
            ..TargetResult::default()
        })
    } else {
        let (series, warnings) = to_series(result, &opts)?;
        Ok(TargetResult {
            series,
            warnings,
            ..TargetResult::default()
        })
    }
}
