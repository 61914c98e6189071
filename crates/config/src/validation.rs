//! Configuration validation

use crate::{AppConfig, ConfigError, Result};

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub const MAX_CONCURRENCY: u32 = 50;
pub const MIN_HEARTBEAT_INTERVAL_MS: u64 = 1_000;
pub const MIN_ROUTE_DELAY_MS: u64 = 500;
pub const PRICE_VARIATION_BPS_RANGE: (u32, u32) = (50, 1_000);

/// Validate the entire application configuration, reporting every bad field at once
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut errors = Vec::new();

    // Server
    if config.server.host.is_empty() {
        errors.push(ValidationError::new("server.host", "host is required"));
    } else if config.server.socket_addr().is_err() {
        errors.push(ValidationError::new(
            "server.host",
            format!("'{}' is not a valid listen address", config.server.host),
        ));
    }

    if config.server.port == 0 {
        errors.push(ValidationError::new(
            "server.port",
            "port must be greater than 0",
        ));
    }

    // Database
    if !config.database.url.starts_with("sqlite:") {
        errors.push(ValidationError::new(
            "database.url",
            "only sqlite: connection strings are supported",
        ));
    }

    if config.database.max_connections == 0 {
        errors.push(ValidationError::new(
            "database.max_connections",
            "must be greater than 0",
        ));
    }

    // Queue
    if config.queue.name.trim().is_empty() {
        errors.push(ValidationError::new("queue.name", "queue name is required"));
    }

    if !(1..=MAX_CONCURRENCY).contains(&config.queue.max_concurrency) {
        errors.push(ValidationError::new(
            "queue.max_concurrency",
            format!("must be between 1 and {MAX_CONCURRENCY}"),
        ));
    }

    if config.queue.max_per_minute == 0 {
        errors.push(ValidationError::new(
            "queue.max_per_minute",
            "must be greater than 0",
        ));
    }

    if config.queue.max_attempts == 0 {
        errors.push(ValidationError::new(
            "queue.max_attempts",
            "must be greater than 0",
        ));
    }

    // Stream
    if config.stream.heartbeat_interval_ms < MIN_HEARTBEAT_INTERVAL_MS {
        errors.push(ValidationError::new(
            "stream.heartbeat_interval_ms",
            format!("must be at least {MIN_HEARTBEAT_INTERVAL_MS}"),
        ));
    }

    if config.stream.observer_buffer == 0 {
        errors.push(ValidationError::new(
            "stream.observer_buffer",
            "must be greater than 0",
        ));
    }

    // Router
    if config.router.route_delay_ms < MIN_ROUTE_DELAY_MS {
        errors.push(ValidationError::new(
            "router.route_delay_ms",
            format!("must be at least {MIN_ROUTE_DELAY_MS}"),
        ));
    }

    let (min_bps, max_bps) = PRICE_VARIATION_BPS_RANGE;
    if !(min_bps..=max_bps).contains(&config.router.price_variation_bps) {
        errors.push(ValidationError::new(
            "router.price_variation_bps",
            format!("must be between {min_bps} and {max_bps}"),
        ));
    }

    if config.router.route_timeout_ms == Some(0) {
        errors.push(ValidationError::new(
            "router.route_timeout_ms",
            "must be greater than 0 when set",
        ));
    }

    // Metrics
    if config.metrics.enabled && config.metrics.port == 0 {
        errors.push(ValidationError::new(
            "metrics.port",
            "metrics port must be greater than 0",
        ));
    }

    if config.metrics.enabled && config.metrics.port == config.server.port {
        errors.push(ValidationError::new(
            "metrics.port",
            "metrics port must differ from server.port",
        ));
    }

    // Logging
    if let Some(level) = &config.logging.level {
        if let Err(e) = validate_log_level(level) {
            errors.push(e);
        }
    }

    if !errors.is_empty() {
        let error_msg = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::ValidationError(error_msg));
    }

    Ok(())
}

/// Validate log level
fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            "logging.level",
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        )),
    }
}
