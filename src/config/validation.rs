//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates > 0, timeouts > 0)
//! - Validate addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

/// A single semantic problem with a config value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check every field, collecting all problems.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.http_address", &config.listener.http_address);
    check_address(&mut errors, "listener.rpc_address", &config.listener.rpc_address);

    if config.rate_limit.requests_per_second == 0 {
        errors.push(ValidationError::new(
            "rate_limit.requests_per_second",
            "must be greater than 0",
        ));
    }
    if config.rate_limit.burst_size == 0 {
        errors.push(ValidationError::new(
            "rate_limit.burst_size",
            "must be greater than 0",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            "must be greater than 0",
        ));
    }
    if config.timeouts.storage_ms == 0 {
        errors.push(ValidationError::new(
            "timeouts.storage_ms",
            "must be greater than 0",
        ));
    }
    if config.timeouts.idle_secs == 0 {
        errors.push(ValidationError::new(
            "timeouts.idle_secs",
            "must be greater than 0",
        ));
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be greater than 0",
        ));
    }

    let base_url = &config.client.http_base_url;
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(ValidationError::new(
            "client.http_base_url",
            format!("'{base_url}' is not an http(s) URL"),
        ));
    }
    if config.client.rpc_address.is_empty() {
        errors.push(ValidationError::new("client.rpc_address", "must not be empty"));
    }
    if config.client.timeout_ms == 0 {
        errors.push(ValidationError::new(
            "client.timeout_ms",
            "must be greater than 0",
        ));
    }

    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            field,
            format!("'{value}' is not a socket address"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServiceConfig::default();
        config.rate_limit.requests_per_second = 0;
        config.timeouts.idle_secs = 0;
        config.circuit_breaker.failure_threshold = 0;
        config.listener.rpc_address = "not-an-address".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.rpc_address",
                "rate_limit.requests_per_second",
                "timeouts.idle_secs",
                "circuit_breaker.failure_threshold",
            ]
        );
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = ServiceConfig::default();
        config.observability.metrics_address = "nope".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(validate_config(&config).unwrap_err().len(), 1);
    }
}
