//! Runs panel query targets against Athena.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use athenaviz_core::{BackendError, QueryBackend, QueryRequest, QueryResponse, QueryTarget, TargetResult};
use tracing::{debug, info, warn};

use crate::api::{self, ApiProvider, AthenaApi, StartQuery};
use crate::cache::TtlCache;
use crate::config::AthenaConfig;
use crate::error::AthenaError;
use crate::frames;
use crate::result::AthenaQueryResult;

const STATE_QUEUED: &str = "QUEUED";
const STATE_RUNNING: &str = "RUNNING";
const STATE_SUCCEEDED: &str = "SUCCEEDED";

/// Executes panel targets: reads finished executions or starts ad-hoc
/// queries, then converts rows into series or tables.
pub struct QueryRunner {
    provider: Arc<dyn ApiProvider>,
    config: AthenaConfig,
    scan_cutoffs: TtlCache<Option<i64>>,
    started: TtlCache<String>,
    results: TtlCache<AthenaQueryResult>,
}

impl QueryRunner {
    pub fn new(provider: Arc<dyn ApiProvider>, config: AthenaConfig) -> Self {
        let capacity = config.cache_capacity;
        Self {
            provider,
            config,
            scan_cutoffs: TtlCache::new(capacity),
            started: TtlCache::new(capacity),
            results: TtlCache::new(capacity),
        }
    }

    /// Row cap of a target: empty means the configured default, `-1` means
    /// no cap.
    fn max_rows(&self, target: &QueryTarget) -> Result<i64, AthenaError> {
        let raw = target.max_rows.trim();
        if raw.is_empty() {
            return Ok(self.config.max_rows);
        }
        match raw.parse::<i64>() {
            Ok(n) if n >= -1 => Ok(n),
            _ => Err(AthenaError::InvalidParameter {
                name: "maxRows",
                value: raw.to_string(),
                reason: "expected a non-negative integer or -1".into(),
            }),
        }
    }

    /// Run one target to a converted result.
    pub async fn run_target(&self, target: &QueryTarget) -> Result<TargetResult, AthenaError> {
        let region = self.config.resolve_region(&target.region).to_string();
        let api = self.provider.api(&region).await?;
        let max_rows = self.max_rows(target)?;

        let ids = if target.query_string.trim().is_empty() {
            self.distinct_inputs(api.as_ref(), target).await?
        } else {
            vec![self.start(api.as_ref(), &region, target, max_rows).await?]
        };

        let mut combined = AthenaQueryResult::default();
        for id in &ids {
            combined.extend(self.fetch_results(api.as_ref(), &region, id, max_rows, target.cache_duration).await?);
        }
        debug!(
            ref_id = %target.ref_id,
            executions = ids.len(),
            rows = combined.row_count(),
            "Target results fetched"
        );
        frames::convert(&combined, target)
    }

    /// Input execution ids, keeping only the first execution of each
    /// distinct SQL text.
    async fn distinct_inputs(&self, api: &dyn AthenaApi, target: &QueryTarget) -> Result<Vec<String>, AthenaError> {
        let mut ids: Vec<String> = target
            .inputs
            .iter()
            .map(|i| i.query_execution_id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            ids = target
                .query_execution_id
                .split(',')
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect();
        }
        if ids.is_empty() {
            return Err(AthenaError::MissingParameter("queryExecutionId"));
        }

        let records = api::query_executions(api, &ids).await?;
        let mut seen = HashSet::new();
        Ok(records
            .into_iter()
            .filter(|r| match &r.query {
                Some(sql) => seen.insert(sql.clone()),
                None => true,
            })
            .filter_map(|r| r.query_execution_id)
            .collect())
    }

    async fn scan_cutoff(&self, api: &dyn AthenaApi, region: &str, work_group: &str) -> Result<Option<i64>, AthenaError> {
        let key = format!("{region}/{work_group}");
        if let Some(cutoff) = self.scan_cutoffs.get(&key) {
            return Ok(cutoff);
        }
        let cutoff = api.work_group_scan_cutoff(work_group).await?;
        self.scan_cutoffs
            .insert(key, cutoff, Duration::from_secs(self.config.workgroup_cache_secs));
        Ok(cutoff)
    }

    /// Start an ad-hoc query, or reuse a recent execution of the same SQL.
    async fn start(
        &self,
        api: &dyn AthenaApi,
        region: &str,
        target: &QueryTarget,
        max_rows: i64,
    ) -> Result<String, AthenaError> {
        let work_group = match target.work_group.trim() {
            "" => self.config.default_workgroup.clone(),
            wg => wg.to_string(),
        };
        if self.scan_cutoff(api, region, &work_group).await?.is_none() {
            return Err(AthenaError::NoScanLimit(work_group));
        }

        let key = format!("{region}/{}/{max_rows}", target.query_string);
        if let Some(id) = self.started.get(&key) {
            debug!(query_id = %id, "Reusing cached execution");
            return Ok(id);
        }

        let output_location = match target.output_location.trim() {
            "" => self.config.output_location.clone(),
            loc => loc.to_string(),
        };
        let id = api
            .start_query_execution(&StartQuery {
                query_string: target.query_string.clone(),
                work_group,
                output_location,
            })
            .await?;
        self.wait(api, &id).await?;
        self.started.insert(key, id.clone(), target.cache_duration);
        Ok(id)
    }

    /// Poll until the execution leaves QUEUED/RUNNING.
    async fn wait(&self, api: &dyn AthenaApi, id: &str) -> Result<(), AthenaError> {
        let ids = [id.to_string()];
        let interval = Duration::from_millis(self.config.wait_interval_ms);

        for attempt in 1..=self.config.wait_attempts {
            let record = api.batch_get_query_executions(&ids).await?.into_iter().next();
            let state = record.as_ref().and_then(|r| r.state()).unwrap_or(STATE_QUEUED);
            match state {
                STATE_QUEUED | STATE_RUNNING => {
                    debug!(query_id = %id, attempt, state, "Query still running");
                    tokio::time::sleep(interval).await;
                }
                STATE_SUCCEEDED => {
                    info!(query_id = %id, attempt, "Query succeeded");
                    return Ok(());
                }
                other => {
                    return Err(AthenaError::QueryFailed {
                        query_id: id.to_string(),
                        reason: other.to_string(),
                    })
                }
            }
        }
        Err(AthenaError::QueryTimeout {
            query_id: id.to_string(),
            attempts: self.config.wait_attempts,
        })
    }

    async fn fetch_results(
        &self,
        api: &dyn AthenaApi,
        region: &str,
        id: &str,
        max_rows: i64,
        ttl: Duration,
    ) -> Result<AthenaQueryResult, AthenaError> {
        let key = format!("{region}/{id}/{max_rows}");
        if let Some(result) = self.results.get(&key) {
            debug!(query_id = %id, "Result cache hit");
            return Ok(result);
        }
        let result = api.get_query_results(id, max_rows).await?;
        self.results.insert(key, result.clone(), ttl);
        Ok(result)
    }
}

#[async_trait]
impl QueryBackend for QueryRunner {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, BackendError> {
        let mut response = QueryResponse::default();
        for target in request.queries.iter().filter(|t| !t.hide) {
            let result = match self.run_target(target).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(ref_id = %target.ref_id, error = %e, "Target failed");
                    TargetResult::failed(e.to_string())
                }
            };
            response.results.insert(target.ref_id.clone(), result);
        }
        Ok(response)
    }
}
