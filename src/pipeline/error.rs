use axum::http::header::InvalidHeaderValue;
use thiserror::Error;

use crate::html::HtmlError;
use crate::http::FetchError;

/// Aborts the current request. The server answers 502 and logs it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Html(#[from] HtmlError),

    #[error("route {path} did not contain route prefix {prefix}")]
    RoutePrefix { path: String, prefix: String },

    #[error("invalid value for header {name}")]
    InvalidHeader {
        name: String,
        #[source]
        source: InvalidHeaderValue,
    },

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("middleware {name} failed: {message}")]
    Middleware { name: String, message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl PipelineError {
    pub fn invalid_header(name: impl Into<String>, source: InvalidHeaderValue) -> Self {
        PipelineError::InvalidHeader {
            name: name.into(),
            source,
        }
    }
}

/// Problems found while building a registration table.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid route pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{table} registration #{index} ('{pattern}') is {phase:?} but follows a {previous:?} registration")]
    PhaseOrder {
        table: &'static str,
        index: usize,
        pattern: String,
        phase: crate::pipeline::registry::Phase,
        previous: crate::pipeline::registry::Phase,
    },
}
