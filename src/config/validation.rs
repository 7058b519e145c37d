//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports numeric)
//! - Check the affinity key decodes to a usable key
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, on reload too

use std::net::SocketAddr;

use thiserror::Error;

use crate::affinity::AffinityKey;
use crate::config::schema::ProxyConfig;

/// One semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),

    #[error("backends.addresses entry {0:?} is not host:port")]
    BackendAddress(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("affinity.key: {0}")]
    AffinityKey(String),
}

/// Check every semantic rule and return all violations.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    errors.extend(validate_backends(&config.backends.addresses));

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("dial_ms", timeouts.dial_ms),
        ("keepalive_secs", timeouts.keepalive_secs),
        ("response_header_secs", timeouts.response_header_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if !config.affinity.key.is_empty() {
        if let Err(e) = AffinityKey::from_base64(&config.affinity.key) {
            errors.push(ValidationError::AffinityKey(e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Backend address checks, shared with the reload path.
pub fn validate_backends(addresses: &[String]) -> Vec<ValidationError> {
    addresses
        .iter()
        .filter(|addr| !is_host_port(addr))
        .map(|addr| ValidationError::BackendAddress(addr.clone()))
        .collect()
}

fn is_host_port(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
