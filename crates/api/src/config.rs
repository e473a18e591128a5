use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::jwt::JwtConfig;

/// Read an env var, falling back to `default` when unset. Panics on a
/// value that does not parse; a typo should stop startup.
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be a valid value: {e}")),
        Err(_) => default,
    }
}

/// Server configuration, loaded from the environment with local-dev
/// defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
    pub jwt: JwtConfig,
    /// Background job monitor cadence and ceiling.
    pub monitor: MonitorConfig,
}

/// Poll cadence for the per-job background monitor.
///
/// The defaults give a 10-minute ceiling: 120 attempts, 5 seconds
/// apart. Integration tests shrink both to run the loop to exhaustion
/// quickly.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Fixed wait between status polls.
    pub poll_interval: Duration,
    /// Maximum polls before the monitor gives up on a job.
    pub max_attempts: u32,
}

/// Default seconds between monitor polls.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default maximum monitor attempts per job.
const DEFAULT_MAX_ATTEMPTS: u32 = 120;

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl MonitorConfig {
    /// Load monitor configuration from environment variables.
    ///
    /// | Env Var                     | Default |
    /// |-----------------------------|---------|
    /// | `MONITOR_POLL_INTERVAL_SECS`| `5`     |
    /// | `MONITOR_MAX_ATTEMPTS`      | `120`   |
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_secs(env_or(
                "MONITOR_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )),
            max_attempts: env_or("MONITOR_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    pub fn from_env() -> Self {
        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("PORT", 3000),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            jwt: JwtConfig::from_env(),
            monitor: MonitorConfig::from_env(),
        }
    }
}
