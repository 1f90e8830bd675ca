use std::time::Duration;

use simgate_core::config::{env_opt, env_or};
use simgate_core::queue::DEFAULT_WARN_DEPTH;
use simgate_core::results::DEFAULT_WARN_SIZE;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// How long a convert request waits for its result (default: `120`).
    pub convert_timeout_secs: u64,
    /// How long a simulate request waits for its result (default: `300`).
    pub simulate_timeout_secs: u64,
    /// Age after which an uncollected result is evicted (default: `3600`).
    pub result_retention_secs: u64,
    /// How often the eviction sweep runs (default: `60`).
    pub eviction_interval_secs: u64,
    /// Queue depth above which enqueues log a warning.
    pub queue_warn_depth: usize,
    /// Result table size above which publishes log a warning.
    pub result_table_warn_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:5173".to_string()],
            convert_timeout_secs: 120,
            simulate_timeout_secs: 300,
            result_retention_secs: 3600,
            eviction_interval_secs: 60,
            queue_warn_depth: DEFAULT_WARN_DEPTH,
            result_table_warn_size: DEFAULT_WARN_SIZE,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `8000`                  |
    /// | `CORS_ORIGINS`           | `http://localhost:5173` |
    /// | `CONVERT_TIMEOUT_SECS`   | `120`                   |
    /// | `SIMULATE_TIMEOUT_SECS`  | `300`                   |
    /// | `RESULT_RETENTION_SECS`  | `3600`                  |
    /// | `EVICTION_INTERVAL_SECS` | `60`                    |
    /// | `QUEUE_WARN_DEPTH`       | `1000`                  |
    /// | `RESULT_TABLE_WARN_SIZE` | `10000`                 |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = match env_opt("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.cors_origins.clone(),
        };

        Self {
            host: env_opt("HOST").unwrap_or_else(|| defaults.host.clone()),
            port: env_or("PORT", defaults.port),
            cors_origins,
            convert_timeout_secs: env_or("CONVERT_TIMEOUT_SECS", defaults.convert_timeout_secs),
            simulate_timeout_secs: env_or("SIMULATE_TIMEOUT_SECS", defaults.simulate_timeout_secs),
            result_retention_secs: env_or("RESULT_RETENTION_SECS", defaults.result_retention_secs),
            eviction_interval_secs: env_or("EVICTION_INTERVAL_SECS", defaults.eviction_interval_secs)
                .max(1),
            queue_warn_depth: env_or("QUEUE_WARN_DEPTH", defaults.queue_warn_depth),
            result_table_warn_size: env_or("RESULT_TABLE_WARN_SIZE", defaults.result_table_warn_size),
        }
    }

    pub fn convert_timeout(&self) -> Duration {
        Duration::from_secs(self.convert_timeout_secs)
    }

    pub fn simulate_timeout(&self) -> Duration {
        Duration::from_secs(self.simulate_timeout_secs)
    }
}
