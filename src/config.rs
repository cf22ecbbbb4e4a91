//! Process configuration, assembled once at startup.
//!
//! Credentials are read from a Docker-secret file first, falling back to an
//! environment variable for local development; tuning knobs are plain env
//! vars with the defaults from spec.md §6.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub upstream_base_url: String,
    pub database_url: String,
    pub worker_pool_size: usize,
    pub pipeline_budget_ms: u64,
    pub partition_timezone: chrono_tz::Tz,
    pub partition_cron_hour: u32,
    pub partition_cron_minute: u32,
    pub partition_run_on_startup: bool,
    pub fetch_timeout: Duration,
    pub write_timeout: Duration,
    pub health_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = read_secret_or_env("/run/secrets/db_password", "DATABASE_URL")
            .context("DATABASE_URL (or /run/secrets/db_password) is required")?;

        let upstream_base_url = env::var("UPSTREAM_BASE_URL")
            .unwrap_or_else(|_| "https://api.racing-affiliate.example".to_string());

        let worker_pool_size = env_parse("WORKER_POOL_SIZE").unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        });

        let pipeline_budget_ms = env_parse("PIPELINE_BUDGET_MS").unwrap_or(2000);

        let partition_timezone = env::var("PARTITION_TIMEZONE")
            .unwrap_or_else(|_| "Pacific/Auckland".to_string())
            .parse::<chrono_tz::Tz>()
            .map_err(|e| anyhow!("invalid PARTITION_TIMEZONE: {e}"))?;

        let partition_cron_hour = env_parse("PARTITION_CRON_HOUR").unwrap_or(0);
        let partition_cron_minute = env_parse("PARTITION_CRON_MINUTE").unwrap_or(0);

        let partition_run_on_startup = env::var("PARTITION_RUN_ON_STARTUP")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let fetch_timeout_secs: u64 = env_parse("FETCH_TIMEOUT_SECONDS").unwrap_or(30);
        let write_timeout_secs: u64 = env_parse("WRITE_TIMEOUT_SECONDS").unwrap_or(15);

        let health_port = env_parse("HEALTH_PORT").unwrap_or(8080);

        Ok(Self {
            upstream_base_url,
            database_url,
            worker_pool_size,
            pipeline_budget_ms,
            partition_timezone,
            partition_cron_hour,
            partition_cron_minute,
            partition_run_on_startup,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            write_timeout: Duration::from_secs(write_timeout_secs),
            health_port,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Read a secret from a Docker secret file if present, else from the given
/// environment variable. Never silently falls back to a placeholder value.
fn read_secret_or_env(secret_path: &str, env_key: &str) -> Result<String> {
    let path = Path::new(secret_path);
    if path.exists() {
        return std::fs::read_to_string(path)
            .map(|s| s.trim().to_string())
            .context(format!("failed to read secret file at {secret_path}"));
    }

    env::var(env_key).context(format!(
        "neither secret file {secret_path} nor env var {env_key} is set"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_on_invalid_value() {
        std::env::set_var("TEST_ENV_PARSE_BOGUS", "not-a-number");
        let parsed: Option<u64> = env_parse("TEST_ENV_PARSE_BOGUS");
        assert_eq!(parsed, None);
        std::env::remove_var("TEST_ENV_PARSE_BOGUS");
    }

    #[test]
    fn env_parse_reads_valid_value() {
        std::env::set_var("TEST_ENV_PARSE_OK", "42");
        let parsed: Option<u64> = env_parse("TEST_ENV_PARSE_OK");
        assert_eq!(parsed, Some(42));
        std::env::remove_var("TEST_ENV_PARSE_OK");
    }
}
