/// Configuration management
///
/// Loads configuration from environment variables into a type-safe struct
/// shared by the API server and the worker.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `POLL_INTERVAL_HOURS`: Poll cycle interval (default: 3)
/// - `POLL_PARALLELISM`: Concurrent fetches per cycle (default: 4)
/// - `POLL_CYCLE_DEADLINE_SECS`: Cutoff for one cycle (default: 1800)
/// - `FETCH_TIMEOUT_SECS`: Per-request fetch timeout (default: 25)
/// - `FETCH_ATTEMPT_CAP`: Transient-failure attempts per item (default: 3)
/// - `FETCH_BACKOFF_BASE_MS`: First retry delay, doubled per attempt (default: 250)
/// - `MIN_DROP_PERCENT`: Alert threshold in percent (default: 5)
/// - `ALERT_COOLDOWN_HOURS`: Minimum gap between alerts per item (default: 24)
/// - `DELIVERY_ATTEMPT_CAP`: Delivery attempts before an alert fails (default: 3)
/// - `RUST_LOG`: Log level (default: info)
///
/// # Example
///
/// ```no_run
/// use dealwatch_shared::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Price poller configuration
    pub poll: PollConfig,

    /// Alert dispatcher configuration
    pub alerts: AlertConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,
}

/// Price poller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Interval between poll cycles, in hours
    pub interval_hours: u64,

    /// Concurrent fetches within one cycle
    pub parallelism: usize,

    /// Wall-clock budget for one cycle, in seconds
    pub cycle_deadline_secs: u64,

    /// Per-request fetch timeout, in seconds
    pub fetch_timeout_secs: u64,

    /// Transient-failure attempts per item before it goes stale
    pub fetch_attempt_cap: u32,

    /// First backoff delay in milliseconds, doubled per attempt
    pub backoff_base_ms: u64,
}

/// Alert dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Minimum drop fraction that fires an alert (0.05 = 5%)
    pub min_drop_pct: f64,

    /// Minimum gap between two alerts for one item, in hours
    pub cooldown_hours: i64,

    /// Delivery attempts before an alert is marked failed
    pub delivery_attempt_cap: u32,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if any present variable fails to parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let api = ApiConfig {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("API_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
        };

        let poll = PollConfig {
            interval_hours: parse_or("POLL_INTERVAL_HOURS", 3)?,
            parallelism: parse_or("POLL_PARALLELISM", 4)?,
            cycle_deadline_secs: parse_or("POLL_CYCLE_DEADLINE_SECS", 1800)?,
            fetch_timeout_secs: parse_or("FETCH_TIMEOUT_SECS", 25)?,
            fetch_attempt_cap: parse_or("FETCH_ATTEMPT_CAP", 3)?,
            backoff_base_ms: parse_or("FETCH_BACKOFF_BASE_MS", 250)?,
        };

        let min_drop_percent: f64 = parse_or("MIN_DROP_PERCENT", 5.0)?;
        if !(0.0..=100.0).contains(&min_drop_percent) {
            anyhow::bail!("MIN_DROP_PERCENT must be between 0 and 100");
        }

        let alerts = AlertConfig {
            min_drop_pct: min_drop_percent / 100.0,
            cooldown_hours: parse_or("ALERT_COOLDOWN_HOURS", 24)?,
            delivery_attempt_cap: parse_or("DELIVERY_ATTEMPT_CAP", 3)?,
        };

        Ok(Config { api, poll, alerts })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

impl PollConfig {
    /// Interval between cycles
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours * 3600)
    }

    /// Cycle deadline
    pub fn cycle_deadline(&self) -> Duration {
        Duration::from_secs(self.cycle_deadline_secs)
    }

    /// Per-request fetch timeout
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Backoff delay for the given 1-based attempt number
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms << attempt.saturating_sub(1).min(8))
    }
}

impl AlertConfig {
    /// Cooldown window as a chrono duration
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cooldown_hours)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}
