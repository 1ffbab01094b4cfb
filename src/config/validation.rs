//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, hostnames and timeout ranges
//! - Check origin mappings point at usable upstream URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::RouterConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("origin '{host}': upstream '{upstream}' is not an http(s) URL")]
    InvalidUpstream { host: String, upstream: String },

    #[error("origin host '{host}' is mapped more than once")]
    DuplicateOrigin { host: String },

    #[error("listener.public_scheme must be http or https, got '{0}'")]
    InvalidScheme(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if !matches!(config.listener.public_scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::InvalidScheme(
            config.listener.public_scheme.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let hostnames = [
        ("sites.root_domain", &config.sites.root_domain),
        ("sites.ctm_hostname", &config.sites.ctm_hostname),
        ("sites.iselect_hostname", &config.sites.iselect_hostname),
        ("sites.choosi_hostname", &config.sites.choosi_hostname),
        ("sites.life_hostname", &config.sites.life_hostname),
        ("local.dev_host", &config.local.dev_host),
        ("local.secure_dev_domain", &config.local.secure_dev_domain),
    ];
    for (field, value) in hostnames {
        if value.trim().is_empty() {
            errors.push(ValidationError::EmptyField { field });
        }
    }

    let timeouts = [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
        ("arkose.verify_timeout_secs", config.arkose.verify_timeout_secs),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout { field });
        }
    }

    let mut seen = HashSet::new();
    for origin in &config.origins {
        let usable = Url::parse(&origin.upstream)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
            .unwrap_or(false);
        if !usable {
            errors.push(ValidationError::InvalidUpstream {
                host: origin.host.clone(),
                upstream: origin.upstream.clone(),
            });
        }
        if !seen.insert(origin.host.to_ascii_lowercase()) {
            errors.push(ValidationError::DuplicateOrigin {
                host: origin.host.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
