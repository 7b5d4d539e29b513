use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::duration::serde_duration;

// ── Suggestions ───────────────────────────────────────────────

/// One entry of a variable-picker suggestion list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionItem {
    pub text: String,
    pub value: String,
}

impl SuggestionItem {
    pub fn new(text: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: value.into(),
        }
    }

    /// Item whose label is its value.
    pub fn same(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            text: value.clone(),
            value,
        }
    }
}

// ── Dashboard time ────────────────────────────────────────────

/// The active dashboard time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// A range ending now. Spans reaching past the representable past start
    /// at the earliest representable instant.
    pub fn last(span: chrono::Duration) -> Self {
        let to = Utc::now();
        let from = to.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { from, to }
    }

    /// Upper bound as an ISO-8601 timestamp, e.g. `2024-05-01T12:00:00.000Z`.
    pub fn to_iso(&self) -> String {
        self.to.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Source of the current dashboard time range, read once per lookup.
pub trait TimeRangeSource: Send + Sync {
    fn time_range(&self) -> TimeRange;
}

impl TimeRangeSource for TimeRange {
    fn time_range(&self) -> TimeRange {
        *self
    }
}

// ── Execution records ─────────────────────────────────────────

/// One past query execution as reported by the backend.
///
/// Keys are PascalCase on the wire. Every field is optional so a reply
/// with a drifted shape still deserializes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecutionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_execution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecutionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<ExecutionStatistics>,
}

impl ExecutionRecord {
    pub fn state(&self) -> Option<&str> {
        self.status.as_ref()?.state.as_deref()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.status.as_ref()?.completion_date_time
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecutionStatus {
    /// `QUEUED`, `RUNNING`, `SUCCEEDED`, `FAILED` or `CANCELLED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecutionStatistics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_scanned_in_bytes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_execution_time_in_millis: Option<i64>,
}

// ── Panel queries ─────────────────────────────────────────────

pub const FORMAT_TIME_SERIES: &str = "timeserie";
pub const FORMAT_TABLE: &str = "table";

/// A single execution whose results a panel target reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryInput {
    pub query_execution_id: String,
}

/// A panel query as submitted to the backend.
///
/// Created by the UI layer; the adapter only substitutes template
/// variables in `region` and the execution ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryTarget {
    pub ref_id: String,
    pub hide: bool,
    pub format: String,
    pub region: String,
    /// Raw id field from the editor; may be a template variable.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub query_execution_id: String,
    pub inputs: Vec<QueryInput>,
    #[serde(rename = "workgroup")]
    pub work_group: String,
    pub max_rows: String,
    #[serde(with = "serde_duration")]
    pub cache_duration: Duration,
    pub query_string: String,
    pub output_location: String,
    pub timestamp_column: String,
    pub value_column: String,
    pub legend_format: String,
    pub time_format: String,
}

impl QueryTarget {
    pub fn is_table(&self) -> bool {
        self.format == FORMAT_TABLE
    }
}

/// Body of a panel query request. `from`/`to` are epoch milliseconds as
/// strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub from: String,
    pub to: String,
    pub queries: Vec<QueryTarget>,
}

impl QueryRequest {
    pub fn time_range(&self) -> Option<TimeRange> {
        let from = DateTime::from_timestamp_millis(self.from.parse().ok()?)?;
        let to = DateTime::from_timestamp_millis(self.to.parse().ok()?)?;
        Some(TimeRange { from, to })
    }
}

// ── Panel results ─────────────────────────────────────────────

/// A named time series. Each point is `[value, epoch_ms]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<(Option<f64>, i64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    pub text: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub data_type: String,
}

/// Tabular result. Cells are typed JSON values; `null` is SQL NULL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<TableColumn>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Backend result for one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetResult {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<Series>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<Table>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl TargetResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Backend reply to a [`QueryRequest`], keyed by `refId`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: BTreeMap<String, TargetResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn to_iso_uses_millis_and_z() {
        let to = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let range = TimeRange::new(to - chrono::Duration::hours(6), to);
        assert_eq!(range.to_iso(), "2024-05-01T12:00:00.000Z");
    }

    #[test]
    fn execution_record_tolerates_missing_fields() {
        let rec: ExecutionRecord = serde_json::from_str(r#"{"QueryExecutionId":"q1"}"#).unwrap();
        assert_eq!(rec.query_execution_id.as_deref(), Some("q1"));
        assert_eq!(rec.state(), None);
        assert_eq!(rec.completed_at(), None);

        let rec: ExecutionRecord = serde_json::from_str(
            r#"{
                "QueryExecutionId": "q2",
                "Query": "SELECT 1",
                "Status": {"State": "SUCCEEDED", "CompletionDateTime": "2024-05-01T10:00:00Z"},
                "Unexpected": 42
            }"#,
        )
        .unwrap();
        assert_eq!(rec.state(), Some("SUCCEEDED"));
        assert_eq!(
            rec.completed_at(),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn query_target_defaults_and_wire_names() {
        let target: QueryTarget = serde_json::from_str(
            r#"{
                "refId": "A",
                "region": "us-east-1",
                "queryExecutionId": "$exec",
                "workgroup": "analytics",
                "maxRows": "-1",
                "cacheDuration": "5m"
            }"#,
        )
        .unwrap();
        assert_eq!(target.ref_id, "A");
        assert!(!target.hide);
        assert_eq!(target.format, "");
        assert_eq!(target.work_group, "analytics");
        assert_eq!(target.cache_duration, Duration::from_secs(300));
        assert!(target.inputs.is_empty());
    }

    #[test]
    fn oversized_cache_duration_is_rejected() {
        let err = serde_json::from_str::<QueryTarget>(
            r#"{"refId":"A","cacheDuration":"99999999999999999999h"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("99999999999999999999h"));
    }

    #[test]
    fn last_clamps_huge_spans() {
        let range = TimeRange::last(chrono::Duration::MAX);
        assert_eq!(range.from, DateTime::<Utc>::MIN_UTC);
        assert!(range.to > range.from);
    }

    #[test]
    fn query_request_time_range() {
        let req = QueryRequest {
            from: "1714550400000".into(),
            to: "1714572000000".into(),
            queries: vec![],
        };
        let range = req.time_range().unwrap();
        assert_eq!(range.to_iso(), "2024-05-01T14:00:00.000Z");

        let bad = QueryRequest {
            from: "yesterday".into(),
            ..req
        };
        assert!(bad.time_range().is_none());
    }

    #[test]
    fn target_result_skips_empty_sections() {
        let json = serde_json::to_value(TargetResult::failed("boom")).unwrap();
        assert_eq!(json, serde_json::json!({"error": "boom"}));
    }
}
