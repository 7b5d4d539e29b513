//! The subset of the Athena API the backend uses, as a mockable seam.

use std::sync::Arc;

use async_trait::async_trait;
use athenaviz_core::ExecutionRecord;

use crate::error::AthenaError;
use crate::result::AthenaQueryResult;

/// Athena caps batch-get calls at this many ids.
pub const BATCH_LIMIT: usize = 50;

/// A saved (named) query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedQuery {
    pub name: String,
    pub query_string: String,
}

/// Parameters of an ad-hoc query execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartQuery {
    pub query_string: String,
    pub work_group: String,
    /// Empty defers to the workgroup's own result location.
    pub output_location: String,
}

/// Athena calls for a single region.
///
/// Listing calls follow `NextToken` to the end. Batch-get calls accept at
/// most [`BATCH_LIMIT`] ids.
#[async_trait]
pub trait AthenaApi: Send + Sync {
    async fn list_work_groups(&self) -> Result<Vec<String>, AthenaError>;

    async fn list_named_query_ids(&self, work_group: Option<&str>) -> Result<Vec<String>, AthenaError>;

    async fn batch_get_named_queries(&self, ids: &[String]) -> Result<Vec<NamedQuery>, AthenaError>;

    /// Execution ids, newest first. Paging stops early when the first page
    /// starts with `stop_at`, i.e. nothing ran since the caller last looked.
    async fn list_query_execution_ids(
        &self,
        work_group: Option<&str>,
        stop_at: Option<&str>,
    ) -> Result<Vec<String>, AthenaError>;

    async fn batch_get_query_executions(&self, ids: &[String]) -> Result<Vec<ExecutionRecord>, AthenaError>;

    /// Result rows of a finished execution without the header row. At most
    /// `max_rows` rows are returned unless `max_rows` is `-1`.
    async fn get_query_results(
        &self,
        query_execution_id: &str,
        max_rows: i64,
    ) -> Result<AthenaQueryResult, AthenaError>;

    /// The workgroup's per-query scan cutoff in bytes, if one is set.
    async fn work_group_scan_cutoff(&self, work_group: &str) -> Result<Option<i64>, AthenaError>;

    /// Start a query and return its execution id.
    async fn start_query_execution(&self, request: &StartQuery) -> Result<String, AthenaError>;
}

/// Hands out an [`AthenaApi`] per region.
#[async_trait]
pub trait ApiProvider: Send + Sync {
    async fn api(&self, region: &str) -> Result<Arc<dyn AthenaApi>, AthenaError>;
}

/// Batch-get named queries for any number of ids.
pub async fn named_queries(api: &dyn AthenaApi, ids: &[String]) -> Result<Vec<NamedQuery>, AthenaError> {
    let mut out = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(BATCH_LIMIT) {
        out.extend(api.batch_get_named_queries(chunk).await?);
    }
    Ok(out)
}

/// Batch-get executions for any number of ids.
pub async fn query_executions(
    api: &dyn AthenaApi,
    ids: &[String],
) -> Result<Vec<ExecutionRecord>, AthenaError> {
    let mut out = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(BATCH_LIMIT) {
        out.extend(api.batch_get_query_executions(chunk).await?);
    }
    Ok(out)
}
