//! CLI argument parsing and subcommand dispatch.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use athenaviz_athena::AthenaConfig;
use athenaviz_core::config::active_profile;
use athenaviz_core::duration::parse_duration;
use athenaviz_core::{Config, QueryTarget, TimeRange, VariableResolver};
use athenaviz_query::{HttpResourceClient, MetricFindQuery, PanelQuery};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Athena data source: template-variable lookups and panel queries.
#[derive(Parser, Debug)]
#[command(name = "athenaviz", version, about)]
pub struct Cli {
    /// Config profile; keys are looked up as PROFILE_KEY before KEY
    #[arg(long, global = true, env = "ATHENAVIZ_PROFILE")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve resource lookups and panel queries over HTTP
    Serve {
        /// Bind address (overrides HOST)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Resolve a variable query, e.g. `query_execution_ids($region, 10, .*)`
    Suggest {
        query: String,
        /// Print raw values instead of labeled execution records
        #[arg(long)]
        raw: bool,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Run one panel target and print the reshaped data
    Query {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        common: CommonArgs,
    },
}

/// Options shared by the client subcommands.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Template variable as name=value; name=a,b makes a multi-value variable
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,
    /// Dashboard time range ending now, e.g. 6h or 30m
    #[arg(long, default_value = "6h")]
    pub range: String,
    /// Resource server to call instead of querying Athena in-process
    #[arg(long)]
    pub backend_url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Comma-separated execution ids to read
    #[arg(long, default_value = "")]
    pub ids: String,
    /// Ad-hoc SQL to run instead of reading executions
    #[arg(long, default_value = "")]
    pub sql: String,
    /// `timeserie` or `table`
    #[arg(long, default_value = "timeserie")]
    pub format: String,
    #[arg(long, default_value = "default")]
    pub region: String,
    #[arg(long, default_value = "")]
    pub workgroup: String,
    /// Row cap per execution; -1 for none
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub max_rows: String,
    #[arg(long, default_value = "")]
    pub cache_duration: String,
    #[arg(long, default_value = "")]
    pub timestamp_column: String,
    #[arg(long, default_value = "")]
    pub value_column: String,
    #[arg(long, default_value = "")]
    pub legend_format: String,
    #[arg(long, default_value = "")]
    pub time_format: String,
}

impl TargetArgs {
    pub fn to_target(&self) -> anyhow::Result<QueryTarget> {
        Ok(QueryTarget {
            ref_id: "A".into(),
            format: self.format.clone(),
            region: self.region.clone(),
            query_execution_id: self.ids.clone(),
            work_group: self.workgroup.clone(),
            max_rows: self.max_rows.clone(),
            cache_duration: parse_duration(&self.cache_duration)
                .with_context(|| format!("invalid --cache-duration '{}'", self.cache_duration))?,
            query_string: self.sql.clone(),
            timestamp_column: self.timestamp_column.clone(),
            value_column: self.value_column.clone(),
            legend_format: self.legend_format.clone(),
            time_format: self.time_format.clone(),
            ..QueryTarget::default()
        })
    }
}

impl CommonArgs {
    pub fn resolver(&self) -> anyhow::Result<VariableResolver> {
        let mut resolver = VariableResolver::new();
        for assignment in &self.vars {
            let (name, variable) = VariableResolver::parse_assignment(assignment)
                .ok_or_else(|| anyhow!("invalid --var '{assignment}', expected NAME=VALUE"))?;
            resolver.set(name, variable);
        }
        Ok(resolver)
    }

    pub fn time_range(&self) -> anyhow::Result<TimeRange> {
        let span = parse_duration(&self.range).with_context(|| format!("invalid --range '{}'", self.range))?;
        let span = chrono::Duration::from_std(span).context("--range out of bounds")?;
        Ok(TimeRange::last(span))
    }
}

/// Resolved configuration for one invocation.
pub struct Settings {
    pub config: Config,
    pub athena: AthenaConfig,
}

impl Settings {
    pub fn load(profile: Option<&str>) -> Self {
        let profile = profile.map(str::to_uppercase).unwrap_or_else(active_profile);
        Self {
            config: Config::for_profile(&profile),
            athena: AthenaConfig::from_env_profiled(&profile),
        }
    }

    /// In-process Athena, or a remote resource server when a URL is given
    /// on the command line or in config.
    pub fn state(&self, backend_url: Option<&str>) -> anyhow::Result<AppState> {
        match backend_url.or(self.config.backend.url.as_deref()) {
            Some(url) => {
                let timeout = Duration::from_secs(self.config.backend.timeout_secs);
                let client = Arc::new(
                    HttpResourceClient::new(url, timeout)
                        .with_context(|| format!("creating client for {url}"))?,
                );
                info!(url = %client.base_url(), "Using remote resource server");
                Ok(AppState::new(client.clone(), client, self.athena.default_region.clone()))
            }
            None => Ok(AppState::athena(self.athena.clone())),
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(cli.profile.as_deref());

    match cli.command {
        Command::Serve { host, port } => serve(&settings, host, port).await,
        Command::Suggest { query, raw, common } => {
            let state = settings.state(common.backend_url.as_deref())?;
            let finder = MetricFindQuery::new(
                state.resources.clone(),
                Arc::new(common.resolver()?),
                Arc::new(common.time_range()?),
            );
            let items = if raw {
                finder.find(&query).await?
            } else {
                finder.find_labeled(&query).await?
            };
            println!("{}", serde_json::to_string_pretty(&items)?);
            Ok(())
        }
        Command::Query { target, common } => {
            let state = settings.state(common.backend_url.as_deref())?;
            let panel = PanelQuery::new(
                state.backend.clone(),
                Arc::new(common.resolver()?),
                state.default_region.clone(),
            );
            let reply = panel
                .run(&[target.to_target()?], &common.time_range()?)
                .await?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
            match reply.message() {
                Some(message) => Err(anyhow!(message)),
                None => Ok(()),
            }
        }
    }
}

async fn serve(settings: &Settings, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    settings.config.log_summary();
    settings.athena.log_summary();

    let server = &settings.config.server;
    let addr = format!(
        "{}:{}",
        host.as_deref().unwrap_or(&server.host),
        port.unwrap_or(server.port)
    );
    let state = Arc::new(AppState::athena(settings.athena.clone()));
    let app = build_router(state, &server.cors_origin);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
