use std::env;

use serde::{Deserialize, Serialize};

/// Env var naming the active profile.
pub const PROFILE_ENV: &str = "ATHENAVIZ_PROFILE";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
pub fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

pub fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

pub fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// The active profile name, upper-cased (empty = default).
pub fn active_profile() -> String {
    env_opt(PROFILE_ENV)
        .map(|s| s.to_uppercase())
        .unwrap_or_default()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub backend: BackendConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// When `ATHENAVIZ_PROFILE` is set (e.g. `PROD`), every key is first
    /// looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        Self::for_profile(&active_profile())
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            backend: BackendConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:   {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  backend:  url={}, timeout={}s",
            self.backend.url.as_deref().unwrap_or("(in-process)"),
            self.backend.timeout_secs
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 3100),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }
}

// ── Remote resource backend ───────────────────────────────────

/// Where suggestion lookups are sent when not served in-process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of a running resource server; `None` = in-process lookups.
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl BackendConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_opt(p, "BACKEND_URL"),
            timeout_secs: profiled_env_u64(p, "BACKEND_TIMEOUT_SECONDS", 30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env-based tests must run serially to avoid interfering with each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for k in [
            PROFILE_ENV,
            "HOST",
            "PORT",
            "CORS_ORIGIN",
            "BACKEND_URL",
            "BACKEND_TIMEOUT_SECONDS",
            "STAGE_PORT",
            "STAGE_BACKEND_URL",
        ] {
            env::remove_var(k);
        }
    }

    #[test]
    fn defaults_when_no_env_vars() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let cfg = Config::for_profile("");
        assert_eq!(cfg.profile_label(), "default");
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 3100);
        assert_eq!(cfg.server.cors_origin, "*");
        assert!(cfg.backend.url.is_none());
        assert_eq!(cfg.backend.timeout_secs, 30);
    }

    #[test]
    fn profiled_env_takes_precedence() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("PORT", "8080");
        env::set_var("STAGE_PORT", "9090");
        env::set_var("BACKEND_URL", "http://base:3100");

        let cfg = Config::for_profile("stage");
        assert_eq!(cfg.profile, "STAGE");
        assert_eq!(cfg.server.port, 9090);
        // Unprefixed value is the fallback.
        assert_eq!(cfg.backend.url.as_deref(), Some("http://base:3100"));

        clear_env();
    }

    #[test]
    fn from_env_reads_profile_var() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var(PROFILE_ENV, "stage");
        env::set_var("STAGE_BACKEND_URL", "http://stage:3100");

        let cfg = Config::from_env();
        assert_eq!(cfg.profile_label(), "STAGE");
        assert_eq!(cfg.backend.url.as_deref(), Some("http://stage:3100"));

        clear_env();
    }

    #[test]
    fn invalid_port_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("PORT", "not_a_port");
        assert_eq!(Config::for_profile("").server.port, 3100);

        clear_env();
    }
}
