//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{RouterConfig, Stage};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, |var| std::env::var(var).ok())
}

/// Parse configuration text, apply environment overrides and validate.
///
/// `lookup` resolves environment variables; tests pass a closure over a map.
pub fn parse_config<F>(content: &str, lookup: F) -> Result<RouterConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: RouterConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Secrets and the stage may come from the environment instead of the file.
fn apply_env_overrides<F>(config: &mut RouterConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(id) = lookup("CF_ACCESS_CLIENT_ID") {
        config.credentials.cf_access_client_id = id;
    }
    if let Some(token) = lookup("CF_ACCESS_AUTH_TOKEN") {
        config.credentials.cf_access_auth_token = token;
    }
    if let Some(stage) = lookup("EDGE_ROUTER_ENV") {
        config.environment.stage = stage
            .parse::<Stage>()
            .map_err(|message| ConfigError::Env {
                var: "EDGE_ROUTER_ENV",
                message,
            })?;
    }
    Ok(())
}
