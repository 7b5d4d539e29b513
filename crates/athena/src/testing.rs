//! In-memory [`AthenaApi`] for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use athenaviz_core::{ExecutionRecord, ExecutionStatus};
use chrono::{DateTime, Utc};

use crate::api::{ApiProvider, AthenaApi, NamedQuery, StartQuery, BATCH_LIMIT};
use crate::error::AthenaError;
use crate::result::AthenaQueryResult;

/// Page size of the mocked listing calls.
pub const MOCK_PAGE_SIZE: usize = 50;

/// Build a finished execution record.
pub fn execution(
    id: &str,
    query: &str,
    work_group: &str,
    state: &str,
    completed: Option<DateTime<Utc>>,
) -> ExecutionRecord {
    ExecutionRecord {
        query_execution_id: Some(id.to_string()),
        query: Some(query.to_string()),
        work_group: Some(work_group.to_string()),
        status: Some(ExecutionStatus {
            state: Some(state.to_string()),
            submission_date_time: completed,
            completion_date_time: completed,
        }),
        statistics: None,
    }
}

/// Scriptable Athena for one region. Executions are listed newest first in
/// insertion order.
#[derive(Default)]
pub struct MockAthenaApi {
    work_groups: Vec<String>,
    named: Vec<(String, Option<String>, NamedQuery)>,
    executions: Mutex<Vec<ExecutionRecord>>,
    results: Mutex<HashMap<String, AthenaQueryResult>>,
    scan_cutoffs: HashMap<String, i64>,
    adhoc_result: AthenaQueryResult,
    adhoc_final_state: Option<String>,
    running_checks: AtomicU32,
    started: AtomicU32,
    calls: Mutex<Vec<String>>,
}

impl MockAthenaApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_work_group(mut self, name: &str, scan_cutoff: Option<i64>) -> Self {
        self.work_groups.push(name.to_string());
        if let Some(cutoff) = scan_cutoff {
            self.scan_cutoffs.insert(name.to_string(), cutoff);
        }
        self
    }

    pub fn with_named_query(mut self, work_group: Option<&str>, name: &str, sql: &str) -> Self {
        let id = format!("nq-{}", self.named.len());
        self.named.push((
            id,
            work_group.map(str::to_string),
            NamedQuery {
                name: name.to_string(),
                query_string: sql.to_string(),
            },
        ));
        self
    }

    pub fn with_execution(self, record: ExecutionRecord) -> Self {
        self.push_execution(record);
        self
    }

    pub fn with_result(self, id: &str, result: AthenaQueryResult) -> Self {
        self.results
            .lock()
            .unwrap()
            .insert(id.to_string(), result);
        self
    }

    /// Rows returned for executions started through the mock, and how many
    /// status checks report RUNNING before it reaches `final_state`.
    pub fn with_adhoc(mut self, result: AthenaQueryResult, running_checks: u32, final_state: &str) -> Self {
        self.adhoc_result = result;
        self.running_checks = AtomicU32::new(running_checks);
        self.adhoc_final_state = Some(final_state.to_string());
        self
    }

    /// Record a new execution as the newest one.
    pub fn push_execution(&self, record: ExecutionRecord) {
        self.executions.lock().unwrap().insert(0, record);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn started(&self) -> u32 {
        self.started.load(Ordering::SeqCst)
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_batch(ids: &[String]) -> Result<(), AthenaError> {
        if ids.len() > BATCH_LIMIT {
            return Err(AthenaError::AwsSdk(format!(
                "batch of {} exceeds {BATCH_LIMIT}",
                ids.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AthenaApi for MockAthenaApi {
    async fn list_work_groups(&self) -> Result<Vec<String>, AthenaError> {
        self.log("list_work_groups".into());
        Ok(self.work_groups.clone())
    }

    async fn list_named_query_ids(&self, work_group: Option<&str>) -> Result<Vec<String>, AthenaError> {
        self.log(format!("list_named_query_ids:{}", work_group.unwrap_or("")));
        Ok(self
            .named
            .iter()
            .filter(|(_, wg, _)| work_group.is_none() || wg.as_deref() == work_group)
            .map(|(id, _, _)| id.clone())
            .collect())
    }

    async fn batch_get_named_queries(&self, ids: &[String]) -> Result<Vec<NamedQuery>, AthenaError> {
        self.log(format!("batch_get_named_queries:{}", ids.len()));
        Self::check_batch(ids)?;
        Ok(ids
            .iter()
            .filter_map(|id| self.named.iter().find(|(nid, _, _)| nid == id))
            .map(|(_, _, q)| q.clone())
            .collect())
    }

    async fn list_query_execution_ids(
        &self,
        work_group: Option<&str>,
        stop_at: Option<&str>,
    ) -> Result<Vec<String>, AthenaError> {
        self.log(format!("list_query_execution_ids:{}", work_group.unwrap_or("")));
        let all: Vec<String> = self
            .executions
            .lock()
            .unwrap()
            .iter()
            .filter(|r| work_group.is_none() || r.work_group.as_deref() == work_group)
            .filter_map(|r| r.query_execution_id.clone())
            .collect();

        let mut ids = Vec::new();
        for page in all.chunks(MOCK_PAGE_SIZE) {
            ids.extend(page.iter().cloned());
            if stop_at.is_some() && ids.first().map(String::as_str) == stop_at {
                break;
            }
        }
        Ok(ids)
    }

    async fn batch_get_query_executions(&self, ids: &[String]) -> Result<Vec<ExecutionRecord>, AthenaError> {
        self.log(format!("batch_get_query_executions:{}", ids.len()));
        Self::check_batch(ids)?;

        let pending = self.running_checks.load(Ordering::SeqCst);
        if pending > 0 {
            self.running_checks.store(pending - 1, Ordering::SeqCst);
        }
        let executions = self.executions.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| {
                let mut record = executions
                    .iter()
                    .find(|r| r.query_execution_id.as_deref() == Some(id.as_str()))?
                    .clone();
                if pending > 0 && id.starts_with("started-") {
                    if let Some(status) = record.status.as_mut() {
                        status.state = Some("RUNNING".into());
                    }
                }
                Some(record)
            })
            .collect())
    }

    async fn get_query_results(
        &self,
        query_execution_id: &str,
        max_rows: i64,
    ) -> Result<AthenaQueryResult, AthenaError> {
        self.log(format!("get_query_results:{query_execution_id}"));
        let mut result = self
            .results
            .lock()
            .unwrap()
            .get(query_execution_id)
            .cloned()
            .ok_or_else(|| AthenaError::AwsSdk(format!("unknown execution {query_execution_id}")))?;
        if let Ok(cap) = usize::try_from(max_rows) {
            result.rows.truncate(cap);
        }
        Ok(result)
    }

    async fn work_group_scan_cutoff(&self, work_group: &str) -> Result<Option<i64>, AthenaError> {
        self.log(format!("work_group_scan_cutoff:{work_group}"));
        Ok(self.scan_cutoffs.get(work_group).copied())
    }

    async fn start_query_execution(&self, request: &StartQuery) -> Result<String, AthenaError> {
        self.log(format!("start_query_execution:{}", request.work_group));
        let n = self.started.fetch_add(1, Ordering::SeqCst);
        let id = format!("started-{n}");
        let state = self.adhoc_final_state.as_deref().unwrap_or("SUCCEEDED");
        self.push_execution(execution(&id, &request.query_string, &request.work_group, state, Some(Utc::now())));
        self.results
            .lock()
            .unwrap()
            .insert(id.clone(), self.adhoc_result.clone());
        Ok(id)
    }
}

/// Serves the same [`MockAthenaApi`] for every region and records which
/// regions were requested.
pub struct MockProvider {
    api: Arc<MockAthenaApi>,
    regions: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new(api: Arc<MockAthenaApi>) -> Self {
        Self {
            api,
            regions: Mutex::new(Vec::new()),
        }
    }

    pub fn regions(&self) -> Vec<String> {
        self.regions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApiProvider for MockProvider {
    async fn api(&self, region: &str) -> Result<Arc<dyn AthenaApi>, AthenaError> {
        self.regions.lock().unwrap().push(region.to_string());
        Ok(self.api.clone())
    }
}
