//! The panel query path: request building and result reshaping.

use std::sync::Arc;

use athenaviz_core::{
    QueryBackend, QueryInput, QueryRequest, QueryResponse, QueryTarget, ResolveMode, TableColumn,
    TemplateResolver, TimeRange, FORMAT_TIME_SERIES,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::QueryError;

/// One renderable item of a panel reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PanelData {
    Series {
        target: String,
        datapoints: Vec<(Option<f64>, i64)>,
    },
    Table {
        columns: Vec<TableColumn>,
        rows: Vec<Vec<serde_json::Value>>,
    },
}

/// A target the backend reported as failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetError {
    pub ref_id: String,
    pub message: String,
}

/// Reshaped panel data plus the targets that failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelReply {
    pub data: Vec<PanelData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<TargetError>,
}

impl PanelReply {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The status message for the first failure, as `Query A failed: ...`.
    pub fn message(&self) -> Option<String> {
        self.errors
            .first()
            .map(|e| format!("Query {} failed: {}", e.ref_id, e.message))
    }
}

/// Split a resolved execution id field into individual ids. Accepts
/// `a`, `a,b` and the multi-value form `{a,b}`.
pub fn split_execution_ids(value: &str) -> Vec<String> {
    let value = value.trim();
    let inner = value
        .strip_prefix('{')
        .and_then(|v| v.strip_suffix('}'))
        .unwrap_or(value);
    inner
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build the backend request for the visible `targets`.
pub fn build_query_request(
    targets: &[QueryTarget],
    range: &TimeRange,
    resolver: &dyn TemplateResolver,
    default_region: &str,
) -> QueryRequest {
    let queries = targets
        .iter()
        .filter(|t| !t.hide)
        .map(|t| {
            let mut target = t.clone();
            if target.format.is_empty() {
                target.format = FORMAT_TIME_SERIES.to_string();
            }

            let region = resolver.resolve(&target.region, ResolveMode::Plain);
            target.region = if region.trim().is_empty() {
                default_region.to_string()
            } else {
                region
            };

            if !target.query_execution_id.is_empty() {
                let ids = resolver.resolve(&target.query_execution_id, ResolveMode::Plain);
                target.inputs = split_execution_ids(&ids)
                    .into_iter()
                    .map(|query_execution_id| QueryInput { query_execution_id })
                    .collect();
                target.query_execution_id = ids;
            }
            target
        })
        .collect();

    QueryRequest {
        from: range.from.timestamp_millis().to_string(),
        to: range.to.timestamp_millis().to_string(),
        queries,
    }
}

/// Fan the per-target results out into one flat list in target order.
///
/// Targets absent from the reply, or with neither series nor tables, are
/// dropped. Failed targets contribute no data and are listed in `errors`;
/// the other targets are still returned.
pub fn reshape(targets: &[QueryTarget], response: &QueryResponse) -> PanelReply {
    let mut reply = PanelReply::default();
    for target in targets {
        let Some(result) = response.results.get(&target.ref_id) else {
            continue;
        };
        if let Some(message) = &result.error {
            warn!(ref_id = %target.ref_id, error = %message, "Panel target failed");
            reply.errors.push(TargetError {
                ref_id: target.ref_id.clone(),
                message: message.clone(),
            });
            continue;
        }
        reply.data.extend(result.series.iter().map(|s| PanelData::Series {
            target: s.name.clone(),
            datapoints: s.points.clone(),
        }));
        reply.data.extend(result.tables.iter().map(|t| PanelData::Table {
            columns: t.columns.clone(),
            rows: t.rows.clone(),
        }));
    }
    reply
}

/// Runs panel queries against a [`QueryBackend`].
#[derive(Clone)]
pub struct PanelQuery {
    backend: Arc<dyn QueryBackend>,
    resolver: Arc<dyn TemplateResolver>,
    default_region: String,
}

impl PanelQuery {
    pub fn new(
        backend: Arc<dyn QueryBackend>,
        resolver: Arc<dyn TemplateResolver>,
        default_region: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            resolver,
            default_region: default_region.into(),
        }
    }

    /// Query the visible targets. Only a failed backend call is an error;
    /// per-target failures come back in [`PanelReply::errors`].
    pub async fn run(&self, targets: &[QueryTarget], range: &TimeRange) -> Result<PanelReply, QueryError> {
        let request = build_query_request(targets, range, self.resolver.as_ref(), &self.default_region);
        if request.queries.is_empty() {
            debug!("No visible targets, skipping backend call");
            return Ok(PanelReply::default());
        }
        let response = self.backend.query(&request).await?;
        Ok(reshape(&request.queries, &response))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use athenaviz_core::{
        BackendError, Series, Table, TargetResult, TemplateVariable, VariableResolver, FORMAT_TABLE,
    };
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    fn range() -> TimeRange {
        TimeRange::new(
            Utc.timestamp_millis_opt(1_714_550_400_000).unwrap(),
            Utc.timestamp_millis_opt(1_714_572_000_000).unwrap(),
        )
    }

    fn target(ref_id: &str) -> QueryTarget {
        QueryTarget {
            ref_id: ref_id.into(),
            ..QueryTarget::default()
        }
    }

    #[test]
    fn split_execution_ids_forms() {
        assert_eq!(split_execution_ids("e1"), ["e1"]);
        assert_eq!(split_execution_ids("e1, e2"), ["e1", "e2"]);
        assert_eq!(split_execution_ids("{e1,e2}"), ["e1", "e2"]);
        assert!(split_execution_ids("  ").is_empty());
    }

    #[test]
    fn request_builder_resolves_and_defaults() {
        let resolver = VariableResolver::new()
            .with("exec", TemplateVariable::multi(["e1", "e2"]))
            .with("region", TemplateVariable::single("eu-west-1"));

        let mut a = target("A");
        a.region = "$region".into();
        a.query_execution_id = "$exec".into();
        let mut b = target("B");
        b.hide = true;
        let mut c = target("C");
        c.format = FORMAT_TABLE.into();
        c.inputs = vec![QueryInput {
            query_execution_id: "kept".into(),
        }];

        let request = build_query_request(&[a, b, c], &range(), &resolver, "us-east-1");
        assert_eq!(request.from, "1714550400000");
        assert_eq!(request.to, "1714572000000");
        assert_eq!(request.queries.len(), 2);

        let a = &request.queries[0];
        assert_eq!(a.format, FORMAT_TIME_SERIES);
        assert_eq!(a.region, "eu-west-1");
        let ids: Vec<&str> = a.inputs.iter().map(|i| i.query_execution_id.as_str()).collect();
        assert_eq!(ids, ["e1", "e2"]);

        let c = &request.queries[1];
        assert_eq!(c.ref_id, "C");
        assert_eq!(c.format, FORMAT_TABLE);
        assert_eq!(c.region, "us-east-1");
        assert_eq!(c.inputs[0].query_execution_id, "kept");
    }

    #[test]
    fn reshape_keeps_target_order_and_drops_empty() {
        let targets = [target("A"), target("B"), target("C"), target("D")];
        let mut response = QueryResponse::default();
        response.results.insert(
            "C".into(),
            TargetResult {
                tables: vec![Table {
                    columns: vec![TableColumn {
                        text: "n".into(),
                        data_type: String::new(),
                    }],
                    rows: vec![vec![json!(1)]],
                }],
                ..TargetResult::default()
            },
        );
        response.results.insert(
            "A".into(),
            TargetResult {
                series: vec![
                    Series {
                        name: "s1".into(),
                        points: vec![(Some(1.0), 1000)],
                    },
                    Series {
                        name: "s2".into(),
                        points: vec![(None, 2000)],
                    },
                ],
                ..TargetResult::default()
            },
        );
        response.results.insert("B".into(), TargetResult::default());

        let reply = reshape(&targets, &response);
        assert!(reply.is_ok());
        let data = reply.data;
        assert_eq!(data.len(), 3);
        assert!(matches!(&data[0], PanelData::Series { target, .. } if target == "s1"));
        assert!(matches!(&data[1], PanelData::Series { target, .. } if target == "s2"));
        assert!(matches!(&data[2], PanelData::Table { rows, .. } if rows.len() == 1));

        let json = serde_json::to_value(&data[0]).unwrap();
        assert_eq!(json, json!({"target": "s1", "datapoints": [[1.0, 1000]]}));
    }

    #[test]
    fn failed_target_keeps_the_others() {
        let mut response = QueryResponse::default();
        response
            .results
            .insert("A".into(), TargetResult::failed("execution not found"));
        response.results.insert(
            "B".into(),
            TargetResult {
                series: vec![Series {
                    name: "ok".into(),
                    points: vec![(Some(2.0), 1000)],
                }],
                ..TargetResult::default()
            },
        );

        let reply = reshape(&[target("A"), target("B")], &response);
        assert!(!reply.is_ok());
        assert_eq!(reply.data.len(), 1);
        assert!(matches!(&reply.data[0], PanelData::Series { target, .. } if target == "ok"));
        assert_eq!(
            reply.errors,
            vec![TargetError {
                ref_id: "A".into(),
                message: "execution not found".into(),
            }]
        );
        assert_eq!(reply.message().as_deref(), Some("Query A failed: execution not found"));

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["errors"], json!([{"refId": "A", "message": "execution not found"}]));
    }

    #[derive(Default)]
    struct CountingBackend {
        requests: Mutex<Vec<QueryRequest>>,
    }

    #[async_trait::async_trait]
    impl QueryBackend for CountingBackend {
        async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, BackendError> {
            self.requests.lock().unwrap().push(request.clone());
            let mut response = QueryResponse::default();
            for q in &request.queries {
                response.results.insert(
                    q.ref_id.clone(),
                    TargetResult {
                        series: vec![Series {
                            name: q.region.clone(),
                            points: vec![],
                        }],
                        ..TargetResult::default()
                    },
                );
            }
            Ok(response)
        }
    }

    #[tokio::test]
    async fn no_visible_targets_skips_backend() {
        let backend = Arc::new(CountingBackend::default());
        let panel = PanelQuery::new(backend.clone(), Arc::new(VariableResolver::new()), "us-east-1");
        let mut hidden = target("A");
        hidden.hide = true;
        assert_eq!(panel.run(&[hidden], &range()).await.unwrap(), PanelReply::default());
        assert!(panel.run(&[], &range()).await.unwrap().data.is_empty());
        assert!(backend.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_queries_backend_once() {
        let backend = Arc::new(CountingBackend::default());
        let panel = PanelQuery::new(backend.clone(), Arc::new(VariableResolver::new()), "us-west-2");
        let reply = panel.run(&[target("A")], &range()).await.unwrap();
        assert!(reply.is_ok());
        assert_eq!(
            reply.data,
            vec![PanelData::Series {
                target: "us-west-2".into(),
                datapoints: vec![],
            }]
        );
        assert_eq!(backend.requests.lock().unwrap().len(), 1);
    }
}
