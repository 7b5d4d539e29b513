//! Named resource lookups served to the query editor and metric finder.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use athenaviz_core::{BackendError, ExecutionRecord, ParamValue, ResourceClient, ResourceParams};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::api::{self, ApiProvider, AthenaApi, NamedQuery};
use crate::cache::TtlCache;
use crate::config::AthenaConfig;
use crate::error::AthenaError;

/// Regions Athena is offered in.
pub const ATHENA_REGIONS: &[&str] = &[
    "af-south-1",
    "ap-east-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-south-1",
    "ap-south-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ca-central-1",
    "cn-north-1",
    "cn-northwest-1",
    "eu-central-1",
    "eu-central-2",
    "eu-north-1",
    "eu-south-1",
    "eu-south-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "il-central-1",
    "me-central-1",
    "me-south-1",
    "sa-east-1",
    "us-east-1",
    "us-east-2",
    "us-gov-east-1",
    "us-gov-west-1",
    "us-west-1",
    "us-west-2",
];

/// Every resource name [`AthenaResources`] answers to.
pub const RESOURCE_NAMES: &[&str] = &[
    "regions",
    "workgroup_names",
    "named_query_names",
    "named_query_queries",
    "query_executions",
    "query_execution_ids",
    "query_executions_by_name",
];

const STATE_SUCCEEDED: &str = "SUCCEEDED";

/// Execution listing of one region/workgroup, tagged with the newest id it
/// was built from.
#[derive(Clone)]
struct Listing {
    newest: String,
    records: Arc<Vec<ExecutionRecord>>,
}

/// Filters applied to a workgroup's execution history.
struct ExecutionFilter {
    pattern: Regex,
    limit: i64,
    to: DateTime<Utc>,
}

/// Answers resource lookups straight from Athena.
pub struct AthenaResources {
    provider: Arc<dyn ApiProvider>,
    config: AthenaConfig,
    listings: TtlCache<Listing>,
}

impl AthenaResources {
    pub fn new(provider: Arc<dyn ApiProvider>, config: AthenaConfig) -> Self {
        let listings = TtlCache::new(config.cache_capacity);
        Self {
            provider,
            config,
            listings,
        }
    }

    pub fn config(&self) -> &AthenaConfig {
        &self.config
    }

    async fn api(&self, params: &ResourceParams) -> Result<(String, Arc<dyn AthenaApi>), AthenaError> {
        let region = self.config.resolve_region(&text(params, "region")).to_string();
        let api = self.provider.api(&region).await?;
        Ok((region, api))
    }

    /// `"default"` followed by every Athena region, sorted.
    pub fn regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = ATHENA_REGIONS.iter().map(|r| r.to_string()).collect();
        regions.push("default".to_string());
        regions.sort();
        regions
    }

    async fn work_group_names(&self, params: &ResourceParams) -> Result<Vec<String>, AthenaError> {
        let (_, api) = self.api(params).await?;
        api.list_work_groups().await
    }

    async fn named_queries(&self, params: &ResourceParams) -> Result<Vec<NamedQuery>, AthenaError> {
        let (_, api) = self.api(params).await?;
        let ids = api.list_named_query_ids(work_group(params).as_deref()).await?;
        api::named_queries(api.as_ref(), &ids).await
    }

    async fn named_query_names(&self, params: &ResourceParams) -> Result<Vec<String>, AthenaError> {
        Ok(self
            .named_queries(params)
            .await?
            .into_iter()
            .map(|q| q.name)
            .collect())
    }

    /// SQL of every named query whose name matches `pattern`.
    async fn named_query_queries(&self, params: &ResourceParams) -> Result<Vec<String>, AthenaError> {
        let pattern = pattern(params)?;
        Ok(self
            .named_queries(params)
            .await?
            .into_iter()
            .filter(|q| pattern.is_match(&q.name))
            .map(|q| q.query_string)
            .collect())
    }

    /// Every execution of the workgroup, reusing the cached listing while the
    /// newest id is unchanged.
    async fn all_executions(&self, params: &ResourceParams) -> Result<Arc<Vec<ExecutionRecord>>, AthenaError> {
        let (region, api) = self.api(params).await?;
        let work_group = work_group(params);
        let key = format!("{region}/{}", work_group.as_deref().unwrap_or(""));

        let cached = self.listings.get(&key);
        let ids = api
            .list_query_execution_ids(
                work_group.as_deref(),
                cached.as_ref().map(|c| c.newest.as_str()),
            )
            .await?;
        let Some(newest) = ids.first() else {
            return Ok(Arc::new(Vec::new()));
        };

        if let Some(listing) = cached.filter(|c| &c.newest == newest) {
            debug!(key = %key, executions = listing.records.len(), "Execution listing cache hit");
            return Ok(listing.records);
        }

        let records = Arc::new(api::query_executions(api.as_ref(), &ids).await?);
        debug!(key = %key, executions = records.len(), "Execution listing refreshed");
        self.listings.insert(
            key,
            Listing {
                newest: newest.clone(),
                records: records.clone(),
            },
            Duration::from_secs(self.config.execution_cache_secs),
        );
        Ok(records)
    }

    /// Succeeded executions finished by `to` whose SQL matches, newest first.
    async fn select_executions(
        &self,
        params: &ResourceParams,
        filter: &ExecutionFilter,
    ) -> Result<Vec<ExecutionRecord>, AthenaError> {
        let all = self.all_executions(params).await?;
        let mut selected: Vec<ExecutionRecord> = all
            .iter()
            .filter(|r| r.state() == Some(STATE_SUCCEEDED))
            .filter(|r| r.completed_at().is_some_and(|done| done <= filter.to))
            .filter(|r| r.query.as_deref().is_some_and(|q| filter.pattern.is_match(q)))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.completed_at().cmp(&a.completed_at()));
        if let Ok(limit) = usize::try_from(filter.limit) {
            selected.truncate(limit);
        }
        Ok(selected)
    }

    async fn query_executions(&self, params: &ResourceParams) -> Result<Vec<ExecutionRecord>, AthenaError> {
        let filter = ExecutionFilter {
            pattern: pattern(params)?,
            limit: limit(params)?,
            to: to(params)?,
        };
        self.select_executions(params, &filter).await
    }

    async fn query_execution_ids(&self, params: &ResourceParams) -> Result<Vec<String>, AthenaError> {
        Ok(self
            .query_executions(params)
            .await?
            .into_iter()
            .filter_map(|r| r.query_execution_id)
            .collect())
    }

    /// Executions of the first named query whose name matches `pattern`.
    async fn query_executions_by_name(
        &self,
        params: &ResourceParams,
    ) -> Result<Vec<ExecutionRecord>, AthenaError> {
        let name_pattern = pattern(params)?;
        let limit = limit(params)?;
        let to = to(params)?;

        let named = self
            .named_queries(params)
            .await?
            .into_iter()
            .find(|q| name_pattern.is_match(&q.name))
            .ok_or_else(|| AthenaError::NamedQueryNotFound(name_pattern.as_str().to_string()))?;

        let sql = named.query_string.trim_end_matches(' ').trim_end_matches(';');
        let anchored = format!("^{}$", regex::escape(sql));
        let pattern = Regex::new(&anchored).map_err(|e| AthenaError::InvalidPattern {
            pattern: anchored.clone(),
            reason: e.to_string(),
        })?;

        self.select_executions(params, &ExecutionFilter { pattern, limit, to })
            .await
    }

    async fn lookup(&self, resource: &str, params: &ResourceParams) -> Result<Value, AthenaError> {
        let value = match resource {
            "regions" => json!(self.regions()),
            "workgroup_names" => json!(self.work_group_names(params).await?),
            "named_query_names" => json!(self.named_query_names(params).await?),
            "named_query_queries" => json!(self.named_query_queries(params).await?),
            "query_executions" => json!(self.query_executions(params).await?),
            "query_execution_ids" => json!(self.query_execution_ids(params).await?),
            "query_executions_by_name" => json!(self.query_executions_by_name(params).await?),
            other => return Err(AthenaError::UnknownResource(other.to_string())),
        };
        let mut reply = Map::new();
        reply.insert(resource.to_string(), value);
        Ok(Value::Object(reply))
    }
}

#[async_trait]
impl ResourceClient for AthenaResources {
    async fn fetch(&self, resource: &str, params: &ResourceParams) -> Result<Value, BackendError> {
        debug!(resource = %resource, ?params, "Resource lookup");
        Ok(self.lookup(resource, params).await?)
    }
}

fn text(params: &ResourceParams, name: &str) -> String {
    params
        .get(name)
        .map(|v| v.as_text().trim().to_string())
        .unwrap_or_default()
}

fn work_group(params: &ResourceParams) -> Option<String> {
    Some(text(params, "workGroup")).filter(|wg| !wg.is_empty())
}

fn pattern(params: &ResourceParams) -> Result<Regex, AthenaError> {
    let raw = params.get("pattern").map(ParamValue::as_text).unwrap_or_default();
    Regex::new(&raw).map_err(|e| AthenaError::InvalidPattern {
        pattern: raw.to_string(),
        reason: e.to_string(),
    })
}

fn limit(params: &ResourceParams) -> Result<i64, AthenaError> {
    let value = params.get("limit").ok_or(AthenaError::MissingParameter("limit"))?;
    value.as_int().ok_or_else(|| AthenaError::InvalidParameter {
        name: "limit",
        value: value.to_string(),
        reason: "not an integer".into(),
    })
}

fn to(params: &ResourceParams) -> Result<DateTime<Utc>, AthenaError> {
    let value = params.get("to").ok_or(AthenaError::MissingParameter("to"))?;
    DateTime::parse_from_rfc3339(value.as_text().trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AthenaError::InvalidParameter {
            name: "to",
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::testing::{execution, MockAthenaApi, MockProvider};

    fn at(hour: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap())
    }

    fn params(pairs: &[(&str, ParamValue)]) -> ResourceParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn resources(api: MockAthenaApi) -> (Arc<MockAthenaApi>, Arc<MockProvider>, AthenaResources) {
        let api = Arc::new(api);
        let provider = Arc::new(MockProvider::new(api.clone()));
        let resources = AthenaResources::new(provider.clone(), AthenaConfig::default());
        (api, provider, resources)
    }

    fn history() -> MockAthenaApi {
        // Inserted oldest first; listed newest first.
        MockAthenaApi::new()
            .with_execution(execution("e1", "SELECT 1", "primary", "SUCCEEDED", at(9)))
            .with_execution(execution("e2", "SELECT * FROM logs", "primary", "FAILED", at(10)))
            .with_execution(execution("e3", "SELECT * FROM logs", "primary", "SUCCEEDED", at(11)))
            .with_execution(execution("e4", "SELECT * FROM logs", "adhoc", "SUCCEEDED", at(12)))
            .with_execution(execution("e5", "SELECT * FROM logs", "primary", "SUCCEEDED", at(15)))
            .with_execution(execution("e6", "SELECT * FROM logs", "primary", "RUNNING", None))
    }

    fn execution_params(pattern: &str, limit: i64) -> ResourceParams {
        params(&[
            ("region", "us-east-1".into()),
            ("workGroup", "primary".into()),
            ("pattern", pattern.into()),
            ("limit", limit.into()),
            ("to", "2024-05-01T14:00:00.000Z".into()),
        ])
    }

    fn ids(reply: &Value, resource: &str) -> Vec<String> {
        reply[resource]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["QueryExecutionId"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn regions_are_sorted_with_default() {
        let (_, _, resources) = resources(MockAthenaApi::new());
        let reply = resources.fetch("regions", &ResourceParams::new()).await.unwrap();
        let regions: Vec<&str> = reply["regions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(regions.contains(&"default"));
        assert!(regions.contains(&"us-east-1"));
        assert!(regions.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn default_region_resolves_to_configured_region() {
        let api = MockAthenaApi::new().with_work_group("primary", None).with_work_group("etl", Some(1));
        let (_, provider, resources) = resources(api);

        let reply = resources
            .fetch("workgroup_names", &params(&[("region", "default".into())]))
            .await
            .unwrap();
        assert_eq!(reply, json!({"workgroup_names": ["primary", "etl"]}));
        assert_eq!(provider.regions(), vec!["us-east-1"]);
    }

    #[tokio::test]
    async fn named_queries_filter_by_workgroup_and_pattern() {
        let api = MockAthenaApi::new()
            .with_named_query(Some("primary"), "daily_errors", "SELECT * FROM errors")
            .with_named_query(Some("primary"), "hourly", "SELECT 2")
            .with_named_query(Some("etl"), "daily_load", "SELECT 3");
        let (_, _, resources) = resources(api);

        let names = resources
            .fetch("named_query_names", &params(&[("workGroup", "primary".into())]))
            .await
            .unwrap();
        assert_eq!(names, json!({"named_query_names": ["daily_errors", "hourly"]}));

        let queries = resources
            .fetch(
                "named_query_queries",
                &params(&[("pattern", "^daily".into())]),
            )
            .await
            .unwrap();
        assert_eq!(
            queries,
            json!({"named_query_queries": ["SELECT * FROM errors", "SELECT 3"]})
        );
    }

    #[tokio::test]
    async fn named_query_batches_are_chunked() {
        let mut api = MockAthenaApi::new();
        for i in 0..120 {
            api = api.with_named_query(None, &format!("q{i}"), "SELECT 1");
        }
        let (api, _, resources) = resources(api);

        let reply = resources.fetch("named_query_names", &ResourceParams::new()).await.unwrap();
        assert_eq!(reply["named_query_names"].as_array().unwrap().len(), 120);
        assert_eq!(
            api.calls()
                .into_iter()
                .filter(|c| c.starts_with("batch_get_named_queries"))
                .collect::<Vec<_>>(),
            vec![
                "batch_get_named_queries:50",
                "batch_get_named_queries:50",
                "batch_get_named_queries:20"
            ]
        );
    }

    #[tokio::test]
    async fn executions_are_filtered_and_sorted_newest_first() {
        let (_, _, resources) = resources(history());

        let reply = resources
            .fetch("query_executions", &execution_params("logs", -1))
            .await
            .unwrap();
        // e2 failed, e4 is another workgroup, e5 finished after `to`, e6 runs.
        assert_eq!(ids(&reply, "query_executions"), vec!["e3"]);

        let reply = resources
            .fetch("query_executions", &execution_params(".*", -1))
            .await
            .unwrap();
        assert_eq!(ids(&reply, "query_executions"), vec!["e3", "e1"]);
        assert_eq!(reply["query_executions"][0]["Status"]["State"], "SUCCEEDED");
    }

    #[tokio::test]
    async fn limit_caps_the_selection() {
        let (_, _, resources) = resources(history());

        let reply = resources
            .fetch("query_execution_ids", &execution_params(".*", 1))
            .await
            .unwrap();
        assert_eq!(reply, json!({"query_execution_ids": ["e3"]}));

        let reply = resources
            .fetch("query_execution_ids", &execution_params(".*", 0))
            .await
            .unwrap();
        assert_eq!(reply, json!({"query_execution_ids": []}));
    }

    #[tokio::test]
    async fn listing_is_reused_until_a_new_execution_appears() {
        let (api, _, resources) = resources(history());
        let p = execution_params(".*", -1);

        resources.fetch("query_execution_ids", &p).await.unwrap();
        resources.fetch("query_execution_ids", &p).await.unwrap();
        assert_eq!(api.count_calls("batch_get_query_executions"), 1);
        assert_eq!(api.count_calls("list_query_execution_ids"), 2);

        api.push_execution(execution("e7", "SELECT 7", "primary", "SUCCEEDED", at(13)));
        let reply = resources.fetch("query_execution_ids", &p).await.unwrap();
        assert_eq!(api.count_calls("batch_get_query_executions"), 2);
        assert_eq!(reply, json!({"query_execution_ids": ["e7", "e3", "e1"]}));
    }

    #[tokio::test]
    async fn empty_history_yields_empty_list() {
        let (_, _, resources) = resources(MockAthenaApi::new());
        let reply = resources
            .fetch("query_executions", &execution_params(".*", -1))
            .await
            .unwrap();
        assert_eq!(reply, json!({"query_executions": []}));
    }

    #[tokio::test]
    async fn executions_by_name_match_the_saved_sql() {
        let api = history()
            .with_named_query(Some("primary"), "log_scan", "SELECT * FROM logs;  ")
            .with_named_query(Some("primary"), "log_scan_2", "SELECT 1");
        let (_, _, resources) = resources(api);

        let reply = resources
            .fetch("query_executions_by_name", &execution_params("^log_scan", -1))
            .await
            .unwrap();
        assert_eq!(ids(&reply, "query_executions_by_name"), vec!["e3"]);
    }

    #[tokio::test]
    async fn executions_by_unknown_name_fail() {
        let (_, _, resources) = resources(history());
        let err = resources
            .fetch("query_executions_by_name", &execution_params("missing", -1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No query with that name found"));
    }

    #[tokio::test]
    async fn parameter_errors() {
        let (_, _, resources) = resources(history());

        let mut p = execution_params(".*", 1);
        p.remove("limit");
        let err = resources.fetch("query_executions", &p).await.unwrap_err();
        assert!(matches!(err, BackendError::MissingParameter(ref n) if n == "limit"));

        let mut p = execution_params(".*", 1);
        p.insert("to".into(), "yesterday".into());
        let err = resources.fetch("query_executions", &p).await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidParameter { ref name, .. } if name == "to"));

        let err = resources
            .fetch("query_executions", &execution_params("(", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidParameter { ref name, .. } if name == "pattern"));

        let err = resources
            .fetch("table_names", &ResourceParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::UnknownResource(ref n) if n == "table_names"));
    }

    #[tokio::test]
    async fn textual_limit_is_accepted() {
        let (_, _, resources) = resources(history());
        let mut p = execution_params(".*", 1);
        p.insert("limit".into(), "-1".into());
        let reply = resources.fetch("query_execution_ids", &p).await.unwrap();
        assert_eq!(reply, json!({"query_execution_ids": ["e3", "e1"]}));
    }
}
