//! AWS SDK implementation of [`AthenaApi`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use athenaviz_core::{ExecutionRecord, ExecutionStatistics, ExecutionStatus};
use aws_config::sts::AssumeRoleProvider;
use aws_config::BehaviorVersion;
use aws_sdk_athena::error::DisplayErrorContext;
use aws_sdk_athena::operation::get_query_results::GetQueryResultsOutput;
use aws_sdk_athena::types::{QueryExecution, ResultConfiguration};
use aws_types::region::Region;
use aws_types::SdkConfig;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::api::{ApiProvider, AthenaApi, NamedQuery, StartQuery, BATCH_LIMIT};
use crate::config::AthenaConfig;
use crate::error::AthenaError;
use crate::result::{AthenaColumn, AthenaQueryResult};

fn sdk_err<E: std::error::Error>(e: E) -> AthenaError {
    AthenaError::AwsSdk(DisplayErrorContext(&e).to_string())
}

fn to_chrono(dt: &aws_sdk_athena::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(dt.to_millis().ok()?)
}

/// Convert an SDK execution into the wire record served to clients.
pub fn execution_record(qe: &QueryExecution) -> ExecutionRecord {
    let status = qe.status().map(|s| ExecutionStatus {
        state: s.state().map(|st| st.as_str().to_string()),
        submission_date_time: s.submission_date_time().and_then(to_chrono),
        completion_date_time: s.completion_date_time().and_then(to_chrono),
    });
    let statistics = qe.statistics().map(|s| ExecutionStatistics {
        data_scanned_in_bytes: s.data_scanned_in_bytes(),
        engine_execution_time_in_millis: s.engine_execution_time_in_millis(),
    });
    ExecutionRecord {
        query_execution_id: qe.query_execution_id().map(str::to_string),
        query: qe.query().map(str::to_string),
        work_group: qe.work_group().map(str::to_string),
        status,
        statistics,
    }
}

/// Append one `GetQueryResults` page. The first row of the first page echoes
/// the column headers and is always dropped.
fn append_page(
    result: &mut AthenaQueryResult,
    page: &GetQueryResultsOutput,
    first_page: bool,
) -> Result<(), AthenaError> {
    let result_set = page
        .result_set()
        .ok_or_else(|| AthenaError::ParseError("No ResultSet in response".into()))?;

    if result.columns.is_empty() {
        result.columns = result_set
            .result_set_metadata()
            .map(|meta| {
                meta.column_info()
                    .iter()
                    .map(|ci| AthenaColumn::new(ci.name(), ci.r#type()))
                    .collect()
            })
            .unwrap_or_default();
    }

    let skip = usize::from(first_page);
    result.rows.extend(result_set.rows().iter().skip(skip).map(|row| {
        row.data()
            .iter()
            .map(|datum| datum.var_char_value().map(str::to_string))
            .collect::<Vec<_>>()
    }));
    Ok(())
}

const ROLE_SESSION_NAME: &str = "athenaviz";

/// Endpoint and credential choices shared by every regional client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    pub endpoint_url: Option<String>,
    pub aws_profile: Option<String>,
    pub assume_role_arn: Option<String>,
}

impl From<&AthenaConfig> for ConnectOptions {
    fn from(config: &AthenaConfig) -> Self {
        Self {
            endpoint_url: config.endpoint_url.clone(),
            aws_profile: config.aws_profile.clone(),
            assume_role_arn: config.assume_role_arn.clone(),
        }
    }
}

/// [`AthenaApi`] backed by one regional SDK client.
pub struct SdkAthenaApi {
    client: aws_sdk_athena::Client,
}

impl SdkAthenaApi {
    pub fn new(client: aws_sdk_athena::Client) -> Self {
        Self { client }
    }

    /// Build a client for `region` from the default AWS provider chain,
    /// narrowed by `options`.
    pub async fn connect(region: &str, options: &ConnectOptions) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
        if let Some(profile) = &options.aws_profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config: SdkConfig = loader.load().await;

        let mut builder = aws_sdk_athena::config::Builder::from(&sdk_config);
        if let Some(url) = &options.endpoint_url {
            builder = builder.endpoint_url(url);
        }
        if let Some(arn) = &options.assume_role_arn {
            let role = AssumeRoleProvider::builder(arn)
                .session_name(ROLE_SESSION_NAME)
                .region(Region::new(region.to_string()))
                .configure(&sdk_config)
                .build()
                .await;
            builder = builder.credentials_provider(role);
        }

        info!(
            region = %region,
            endpoint = options.endpoint_url.as_deref().unwrap_or("(aws)"),
            assume_role = options.assume_role_arn.is_some(),
            "Athena client initialised"
        );
        Self::new(aws_sdk_athena::Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl AthenaApi for SdkAthenaApi {
    async fn list_work_groups(&self) -> Result<Vec<String>, AthenaError> {
        let mut names = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_work_groups()
                .set_next_token(token.take())
                .send()
                .await
                .map_err(sdk_err)?;
            names.extend(
                page.work_groups()
                    .iter()
                    .filter_map(|w| w.name().map(str::to_string)),
            );
            match page.next_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(names)
    }

    async fn list_named_query_ids(&self, work_group: Option<&str>) -> Result<Vec<String>, AthenaError> {
        let mut ids = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_named_queries()
                .set_work_group(work_group.map(str::to_string))
                .set_next_token(token.take())
                .send()
                .await
                .map_err(sdk_err)?;
            ids.extend(page.named_query_ids().iter().cloned());
            match page.next_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(ids)
    }

    async fn batch_get_named_queries(&self, ids: &[String]) -> Result<Vec<NamedQuery>, AthenaError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        debug_assert!(ids.len() <= BATCH_LIMIT);
        let out = self
            .client
            .batch_get_named_query()
            .set_named_query_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(sdk_err)?;
        Ok(out
            .named_queries()
            .iter()
            .map(|q| NamedQuery {
                name: q.name().to_string(),
                query_string: q.query_string().to_string(),
            })
            .collect())
    }

    async fn list_query_execution_ids(
        &self,
        work_group: Option<&str>,
        stop_at: Option<&str>,
    ) -> Result<Vec<String>, AthenaError> {
        let mut ids: Vec<String> = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_query_executions()
                .set_work_group(work_group.map(str::to_string))
                .set_next_token(token.take())
                .send()
                .await
                .map_err(sdk_err)?;
            ids.extend(page.query_execution_ids().iter().cloned());

            if stop_at.is_some() && ids.first().map(String::as_str) == stop_at {
                debug!(newest = ?stop_at, "No new executions since last listing");
                break;
            }
            match page.next_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(ids)
    }

    async fn batch_get_query_executions(&self, ids: &[String]) -> Result<Vec<ExecutionRecord>, AthenaError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        debug_assert!(ids.len() <= BATCH_LIMIT);
        let out = self
            .client
            .batch_get_query_execution()
            .set_query_execution_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(sdk_err)?;
        Ok(out.query_executions().iter().map(execution_record).collect())
    }

    /// Page through results until exhausted or `max_rows` is reached.
    async fn get_query_results(
        &self,
        query_execution_id: &str,
        max_rows: i64,
    ) -> Result<AthenaQueryResult, AthenaError> {
        let cap = usize::try_from(max_rows).ok();
        let mut result = AthenaQueryResult::default();
        let mut token: Option<String> = None;
        let mut first_page = true;

        loop {
            let page = self
                .client
                .get_query_results()
                .query_execution_id(query_execution_id)
                .set_next_token(token.take())
                .send()
                .await
                .map_err(sdk_err)?;

            append_page(&mut result, &page, first_page)?;
            first_page = false;

            if let Some(cap) = cap {
                if result.rows.len() >= cap {
                    result.rows.truncate(cap);
                    break;
                }
            }
            match page.next_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }

        debug!(
            query_id = %query_execution_id,
            columns = result.columns.len(),
            rows = result.rows.len(),
            "Fetched Athena results"
        );
        Ok(result)
    }

    async fn work_group_scan_cutoff(&self, work_group: &str) -> Result<Option<i64>, AthenaError> {
        let out = self
            .client
            .get_work_group()
            .work_group(work_group)
            .send()
            .await
            .map_err(sdk_err)?;
        Ok(out
            .work_group()
            .and_then(|w| w.configuration())
            .and_then(|c| c.bytes_scanned_cutoff_per_query()))
    }

    async fn start_query_execution(&self, request: &StartQuery) -> Result<String, AthenaError> {
        let mut call = self
            .client
            .start_query_execution()
            .query_string(&request.query_string)
            .work_group(&request.work_group);
        if !request.output_location.is_empty() {
            call = call.result_configuration(
                ResultConfiguration::builder()
                    .output_location(&request.output_location)
                    .build(),
            );
        }
        let out = call.send().await.map_err(sdk_err)?;
        let id = out
            .query_execution_id()
            .ok_or_else(|| AthenaError::AwsSdk("No query execution ID returned".into()))?
            .to_string();
        info!(query_id = %id, work_group = %request.work_group, "Query execution started");
        Ok(id)
    }
}

/// Lazily builds and caches one [`SdkAthenaApi`] per region.
pub struct SdkApiProvider {
    options: ConnectOptions,
    clients: Mutex<HashMap<String, Arc<dyn AthenaApi>>>,
}

impl SdkApiProvider {
    pub fn new(options: ConnectOptions) -> Self {
        Self {
            options,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, region: &str) -> Option<Arc<dyn AthenaApi>> {
        let clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        clients.get(region).cloned()
    }
}

#[async_trait]
impl ApiProvider for SdkApiProvider {
    async fn api(&self, region: &str) -> Result<Arc<dyn AthenaApi>, AthenaError> {
        if let Some(api) = self.cached(region) {
            return Ok(api);
        }
        let api: Arc<dyn AthenaApi> =
            Arc::new(SdkAthenaApi::connect(region, &self.options).await);
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        Ok(clients.entry(region.to_string()).or_insert(api).clone())
    }
}
