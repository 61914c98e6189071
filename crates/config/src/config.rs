//! Core configuration structures for the order execution engine

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,

    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Order record storage
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Job scheduling
    #[serde(default)]
    pub queue: QueueConfig,

    /// Status streaming
    #[serde(default)]
    pub stream: StreamConfig,

    /// Route provider and stage timings
    #[serde(default)]
    pub router: RouterConfig,

    /// Prometheus exporter
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Environment types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Environment::Production => "info",
            Environment::Development | Environment::Test => "debug",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection string, e.g. `sqlite://orders.db?mode=rwc` or `sqlite::memory:`
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_name")]
    pub name: String,

    /// Worker pool size
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,

    /// Job starts admitted per rolling minute
    #[serde(default = "default_max_per_minute")]
    pub max_per_minute: u32,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay; doubles on each further attempt
    #[serde(default = "default_backoff_delay_ms")]
    pub backoff_delay_ms: u64,
}

impl QueueConfig {
    pub fn backoff_delay(&self) -> Duration {
        Duration::from_millis(self.backoff_delay_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            max_concurrency: default_max_concurrency(),
            max_per_minute: default_max_per_minute(),
            max_attempts: default_max_attempts(),
            backoff_delay_ms: default_backoff_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Frames buffered per observer before new ones are dropped
    #[serde(default = "default_observer_buffer")]
    pub observer_buffer: usize,
}

impl StreamConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            observer_buffer: default_observer_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Simulated quote latency
    #[serde(default = "default_route_delay_ms")]
    pub route_delay_ms: u64,

    /// Maximum random deviation from the base price, in basis points
    #[serde(default = "default_price_variation_bps")]
    pub price_variation_bps: u32,

    #[serde(default = "default_stage_delay_ms")]
    pub build_delay_ms: u64,

    #[serde(default = "default_stage_delay_ms")]
    pub submit_delay_ms: u64,

    /// Upper bound on a single route call; unbounded when unset
    #[serde(default)]
    pub route_timeout_ms: Option<u64>,
}

impl RouterConfig {
    pub fn route_delay(&self) -> Duration {
        Duration::from_millis(self.route_delay_ms)
    }

    pub fn build_delay(&self) -> Duration {
        Duration::from_millis(self.build_delay_ms)
    }

    pub fn submit_delay(&self) -> Duration {
        Duration::from_millis(self.submit_delay_ms)
    }

    pub fn route_timeout(&self) -> Option<Duration> {
        self.route_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            route_delay_ms: default_route_delay_ms(),
            price_variation_bps: default_price_variation_bps(),
            build_delay_ms: default_stage_delay_ms(),
            submit_delay_ms: default_stage_delay_ms(),
            route_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Filter directive; falls back to the environment's default level
    #[serde(default)]
    pub level: Option<String>,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl AppConfig {
    /// Effective log level after applying the environment default.
    pub fn log_level(&self) -> &str {
        self.logging
            .level
            .as_deref()
            .unwrap_or_else(|| self.environment.default_log_level())
    }

    /// JSON output is forced in production.
    pub fn json_logs(&self) -> bool {
        self.logging.json || self.environment == Environment::Production
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_database_url() -> String {
    "sqlite://orders.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_queue_name() -> String {
    "order-execution".to_string()
}

fn default_max_concurrency() -> u32 {
    10
}

fn default_max_per_minute() -> u32 {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_delay_ms() -> u64 {
    2_000
}

fn default_heartbeat_interval_ms() -> u64 {
    10_000
}

fn default_observer_buffer() -> usize {
    64
}

fn default_route_delay_ms() -> u64 {
    2_000
}

fn default_price_variation_bps() -> u32 {
    250
}

fn default_stage_delay_ms() -> u64 {
    1_000
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.queue.name, "order-execution");
        assert_eq!(config.queue.max_concurrency, 10);
        assert_eq!(config.queue.max_per_minute, 100);
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(config.queue.backoff_delay(), Duration::from_secs(2));
        assert_eq!(config.stream.heartbeat_interval(), Duration::from_secs(10));
        assert_eq!(config.router.route_delay(), Duration::from_secs(2));
        assert_eq!(config.router.price_variation_bps, 250);
        assert!(config.router.route_timeout().is_none());
    }

    #[test]
    fn test_log_level_follows_environment() {
        let mut config = AppConfig::default();
        assert_eq!(config.log_level(), "debug");
        assert!(!config.json_logs());

        config.environment = Environment::Production;
        assert_eq!(config.log_level(), "info");
        assert!(config.json_logs());

        config.logging.level = Some("warn".to_string());
        assert_eq!(config.log_level(), "warn");
    }

    #[test]
    fn test_socket_addr() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        };
        assert_eq!(server.socket_addr().unwrap().port(), 8080);
    }
}
