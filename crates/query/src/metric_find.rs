//! Entry point for variable queries.
//!
//! [`MetricFindQuery`] runs a query string through parse, normalize, dispatch
//! and project, returning the suggestion list. Unrecognized queries yield an
//! empty list. `suggest` degrades failures to an empty list for form filling;
//! `find_for` settles lookups against a [`RequestSequencer`] so stale replies
//! are discarded.

use std::sync::Arc;

use athenaviz_core::{
    ParamValue, ResourceClient, ResourceParams, SuggestionItem, TemplateResolver, TimeRangeSource,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dispatch::dispatch;
use crate::error::QueryError;
use crate::normalize::normalize;
use crate::parser::parse;
use crate::project::{project, project_labeled};
use crate::sequence::{RequestSequencer, Settled};

/// Result of a data source connectivity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceStatus {
    pub status: String,
    pub message: String,
    pub title: String,
}

impl DatasourceStatus {
    pub fn success() -> Self {
        Self {
            status: "success".into(),
            message: "Data source is working".into(),
            title: "Success".into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            message: message.into(),
            title: "Error".into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Resolves variable queries into suggestion lists.
///
/// Stateless between calls: the collaborators are consulted afresh on every
/// lookup.
#[derive(Clone)]
pub struct MetricFindQuery {
    client: Arc<dyn ResourceClient>,
    resolver: Arc<dyn TemplateResolver>,
    time: Arc<dyn TimeRangeSource>,
}

impl MetricFindQuery {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        resolver: Arc<dyn TemplateResolver>,
        time: Arc<dyn TimeRangeSource>,
    ) -> Self {
        Self {
            client,
            resolver,
            time,
        }
    }

    /// Resolve `query` into `(text, value)` pairs. Unrecognized queries
    /// yield an empty list.
    pub async fn find(&self, query: &str) -> Result<Vec<SuggestionItem>, QueryError> {
        self.run(query, project).await
    }

    /// Like [`find`](Self::find), with human-readable labels for execution
    /// records.
    pub async fn find_labeled(&self, query: &str) -> Result<Vec<SuggestionItem>, QueryError> {
        self.run(query, project_labeled).await
    }

    /// Form-filling helper: any failure degrades to an empty list.
    pub async fn suggest(&self, query: &str) -> Vec<SuggestionItem> {
        match self.find_labeled(query).await {
            Ok(items) => items,
            Err(e) => {
                warn!(query, error = %e, "Suggestion lookup failed");
                Vec::new()
            }
        }
    }

    /// Run `query` on behalf of an input `field`. The result is `Stale` if
    /// another request for the same field was started meanwhile.
    pub async fn find_for(
        &self,
        sequencer: &RequestSequencer,
        field: &str,
        query: &str,
    ) -> Result<Settled<Vec<SuggestionItem>>, QueryError> {
        let ticket = sequencer.begin(field);
        let result = self.find_labeled(query).await;
        let settled = sequencer.settle(&ticket, result)?;
        if settled.is_stale() {
            debug!(field, seq = ticket.seq, "Discarding stale suggestions");
        }
        Ok(settled)
    }

    /// Connectivity check: lists named queries in `region`.
    pub async fn check(&self, region: &str) -> DatasourceStatus {
        let mut params = ResourceParams::new();
        params.insert("region".into(), ParamValue::from(region));
        match self.client.fetch("named_query_names", &params).await {
            Ok(_) => DatasourceStatus::success(),
            Err(e) => {
                warn!(region, error = %e, "Data source check failed");
                DatasourceStatus::error(e.to_string())
            }
        }
    }

    async fn run(
        &self,
        query: &str,
        projector: fn(&str, &serde_json::Value) -> Vec<SuggestionItem>,
    ) -> Result<Vec<SuggestionItem>, QueryError> {
        let Some(parsed) = parse(query) else {
            debug!(query, "Unrecognized variable query");
            return Ok(Vec::new());
        };
        let args = normalize(&parsed, self.resolver.as_ref(), self.time.as_ref())?;
        let (lookup, reply) = dispatch(self.client.as_ref(), parsed.form, &args).await?;
        let items = projector(lookup.resource, &reply);
        debug!(form = %parsed.form, count = items.len(), "Variable query resolved");
        Ok(items)
    }
}
