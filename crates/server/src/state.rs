//! Shared application state.

use std::sync::Arc;

use athenaviz_athena::{AthenaConfig, AthenaResources, ConnectOptions, QueryRunner, SdkApiProvider};
use athenaviz_core::{QueryBackend, ResourceClient, TimeRange, VariableResolver};
use athenaviz_query::MetricFindQuery;

pub struct AppState {
    pub resources: Arc<dyn ResourceClient>,
    pub backend: Arc<dyn QueryBackend>,
    /// Region probed by the health check.
    pub default_region: String,
}

impl AppState {
    pub fn new(
        resources: Arc<dyn ResourceClient>,
        backend: Arc<dyn QueryBackend>,
        default_region: impl Into<String>,
    ) -> Self {
        Self {
            resources,
            backend,
            default_region: default_region.into(),
        }
    }

    /// State served by the live AWS SDK.
    pub fn athena(config: AthenaConfig) -> Self {
        let provider = Arc::new(SdkApiProvider::new(ConnectOptions::from(&config)));
        let default_region = config.default_region.clone();
        let resources = Arc::new(AthenaResources::new(provider.clone(), config.clone()));
        let backend = Arc::new(QueryRunner::new(provider, config));
        Self::new(resources, backend, default_region)
    }

    /// Finder over this state's resources. Health checks resolve no
    /// variables, so an empty resolver suffices.
    pub fn finder(&self) -> MetricFindQuery {
        MetricFindQuery::new(
            self.resources.clone(),
            Arc::new(VariableResolver::new()),
            Arc::new(TimeRange::last(chrono::Duration::hours(6))),
        )
    }
}
