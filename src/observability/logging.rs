//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Pick the output format from config
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - JSON format for production, pretty format for development

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Filter used when neither `RUST_LOG` nor the config names a level.
pub const DEFAULT_FILTER: &str = "account_service=info,tower_http=info";

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(filter_directive(&config.log_level))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

/// A bare level applies to this crate and tower-http; anything else is used as-is.
fn filter_directive(level: &str) -> String {
    match level {
        "" => DEFAULT_FILTER.to_string(),
        "trace" | "debug" | "info" | "warn" | "error" => {
            format!("account_service={level},tower_http={level}")
        }
        directive => directive.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_level_expands() {
        assert_eq!(
            filter_directive("debug"),
            "account_service=debug,tower_http=debug"
        );
    }

    #[test]
    fn test_directive_passes_through() {
        assert_eq!(filter_directive("account_service=trace"), "account_service=trace");
        assert_eq!(filter_directive(""), DEFAULT_FILTER);
    }
}
