use athenaviz_core::config::{active_profile, profiled_env_opt, profiled_env_or, profiled_env_u64};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Region used when neither `ATHENA_REGION` nor `AWS_REGION` is set.
pub const FALLBACK_REGION: &str = "us-east-1";

pub const DEFAULT_MAX_ROWS: i64 = 1000;

/// Configuration for the Athena backend.
///
/// Reads from environment variables with optional profile prefix.
/// When `ATHENAVIZ_PROFILE=PROD`, checks `PROD_ATHENA_REGION` before `ATHENA_REGION`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AthenaConfig {
    /// Region used for an empty or `default` region parameter.
    pub default_region: String,
    /// Workgroup for ad-hoc queries whose target names none.
    pub default_workgroup: String,
    /// S3 path for ad-hoc query results; empty defers to the workgroup setting.
    pub output_location: String,
    /// Row cap per execution when a target sets no `maxRows`.
    pub max_rows: i64,
    /// How many times to check a started query before giving up.
    pub wait_attempts: u32,
    pub wait_interval_ms: u64,
    /// Entries kept per cache.
    pub cache_capacity: usize,
    /// Lifetime of cached execution listings.
    pub execution_cache_secs: u64,
    /// Lifetime of cached workgroup scan limits.
    pub workgroup_cache_secs: u64,
    /// Custom Athena endpoint, e.g. a local emulator.
    pub endpoint_url: Option<String>,
    /// Named profile from the shared AWS config files.
    pub aws_profile: Option<String>,
    /// Role assumed on top of the base credentials.
    pub assume_role_arn: Option<String>,
}

impl Default for AthenaConfig {
    fn default() -> Self {
        Self {
            default_region: FALLBACK_REGION.to_string(),
            default_workgroup: "primary".to_string(),
            output_location: String::new(),
            max_rows: DEFAULT_MAX_ROWS,
            wait_attempts: 30,
            wait_interval_ms: 1000,
            cache_capacity: 1024,
            execution_cache_secs: 24 * 60 * 60,
            workgroup_cache_secs: 5 * 60,
            endpoint_url: None,
            aws_profile: None,
            assume_role_arn: None,
        }
    }
}

impl AthenaConfig {
    /// Build config from environment variables for the active profile.
    pub fn from_env() -> Self {
        Self::from_env_profiled(&active_profile())
    }

    /// Build config for a specific named profile.
    ///
    /// `ATHENA_REGION` falls back to `AWS_REGION` before using the default.
    pub fn from_env_profiled(profile: &str) -> Self {
        let d = Self::default();
        let default_region = profiled_env_opt(profile, "ATHENA_REGION")
            .or_else(|| profiled_env_opt(profile, "AWS_REGION"))
            .unwrap_or(d.default_region);

        Self {
            default_region,
            default_workgroup: profiled_env_or(profile, "ATHENA_WORKGROUP", &d.default_workgroup),
            output_location: profiled_env_or(profile, "ATHENA_OUTPUT_LOCATION", ""),
            max_rows: profiled_env_opt(profile, "ATHENA_MAX_ROWS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.max_rows),
            wait_attempts: profiled_env_opt(profile, "ATHENA_WAIT_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.wait_attempts),
            wait_interval_ms: profiled_env_u64(profile, "ATHENA_WAIT_INTERVAL_MS", d.wait_interval_ms),
            cache_capacity: profiled_env_opt(profile, "ATHENA_CACHE_CAPACITY")
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(d.cache_capacity),
            execution_cache_secs: profiled_env_u64(
                profile,
                "ATHENA_EXECUTION_CACHE_SECONDS",
                d.execution_cache_secs,
            ),
            workgroup_cache_secs: profiled_env_u64(
                profile,
                "ATHENA_WORKGROUP_CACHE_SECONDS",
                d.workgroup_cache_secs,
            ),
            endpoint_url: profiled_env_opt(profile, "ATHENA_ENDPOINT_URL"),
            aws_profile: profiled_env_opt(profile, "ATHENA_AWS_PROFILE"),
            assume_role_arn: profiled_env_opt(profile, "ATHENA_ASSUME_ROLE_ARN"),
        }
    }

    /// Map an empty or `default` region onto the configured default.
    pub fn resolve_region<'a>(&'a self, region: &'a str) -> &'a str {
        match region.trim() {
            "" | "default" => &self.default_region,
            _ => region.trim(),
        }
    }

    pub fn log_summary(&self) {
        info!(
            default_region = %self.default_region,
            default_workgroup = %self.default_workgroup,
            output_location = if self.output_location.is_empty() { "(workgroup)" } else { self.output_location.as_str() },
            max_rows = self.max_rows,
            wait_attempts = self.wait_attempts,
            endpoint = self.endpoint_url.as_deref().unwrap_or("(aws)"),
            aws_profile = self.aws_profile.as_deref().unwrap_or("(default chain)"),
            assume_role = self.assume_role_arn.is_some(),
            "Athena config"
        );
    }
}

// ── Tests ────────────────────────────────────────────────────────
