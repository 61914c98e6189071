use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor a configured level is present.
pub const DEFAULT_FILTER: &str = "info,order_engine=debug";

/// Build the env filter: `RUST_LOG` wins, then `level`, then [`DEFAULT_FILTER`].
pub fn env_filter(level: Option<&str>) -> Result<EnvFilter, TracingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    match level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| TracingError::InvalidFilter(format!("{level}: {e}"))),
        None => Ok(EnvFilter::new(DEFAULT_FILTER)),
    }
}

/// Install the global subscriber.
///
/// JSON lines when `json` is set (production), human-readable otherwise.
pub fn init_tracing(level: Option<&str>, json: bool) -> Result<(), TracingError> {
    let filter = env_filter(level)?;

    let json_layer = json.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .json()
    });
    let text_layer = (!json).then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| TracingError::InitError(e.to_string()))?;

    Ok(())
}

/// Tracing error types
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("tracing initialization error: {0}")]
    InitError(String),
    #[error("invalid log filter {0}")]
    InvalidFilter(String),
}
