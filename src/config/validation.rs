//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals and timeouts > 0, addresses parse)
//! - Detect duplicate backend addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::uri::Authority;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::BalancerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    BindAddress { field: &'static str, value: String },

    #[error("health_check.path must start with '/': {0}")]
    ProbePath(String),

    #[error("invalid backend: {0}")]
    Backend(#[from] AddressError),

    #[error("duplicate backend: {0}")]
    DuplicateBackend(String),
}

/// Why a backend address was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("backend address is empty")]
    Empty,

    #[error("backend address must be host:port without scheme or path: {0}")]
    Malformed(String),

    #[error("backend address has no port: {0}")]
    MissingPort(String),
}

/// Check that `address` is a bare `host:port` authority.
///
/// Parsed with the same `Authority` rules used to build forwarded and probe
/// URIs, so anything accepted here is reachable.
pub fn validate_backend_address(address: &str) -> Result<(), AddressError> {
    if address.is_empty() {
        return Err(AddressError::Empty);
    }
    if address.contains('@') || address.contains(char::is_whitespace) {
        return Err(AddressError::Malformed(address.to_string()));
    }

    let authority = Authority::from_str(address)
        .map_err(|_| AddressError::Malformed(address.to_string()))?;
    if authority.host().is_empty() {
        return Err(AddressError::Malformed(address.to_string()));
    }
    if authority.port_u16().is_none() {
        return Err(AddressError::MissingPort(address.to_string()));
    }
    Ok(())
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.health_check.interval_ms == 0 {
        errors.push(ValidationError::Zero { field: "health_check.interval_ms" });
    }
    if config.health_check.timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "health_check.timeout_ms" });
    }
    if config.timeouts.forward_ms == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.forward_ms" });
    }
    if !config.health_check.path.starts_with('/') {
        errors.push(ValidationError::ProbePath(config.health_check.path.clone()));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress {
            field: "admin.bind_address",
            value: config.admin.bind_address.clone(),
        });
    }

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if let Err(e) = validate_backend_address(backend) {
            errors.push(e.into());
        } else if !seen.insert(backend.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
