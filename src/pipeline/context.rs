//! Per-request state threaded through the middleware chain.
//!
//! A `RequestContext` lives for the request phase. Once a response exists
//! (short-circuit or origin fetch) it becomes a `ResponseContext`, whose
//! response is always present.

use crate::environment::FeatureBranchSettings;
use crate::http::{EdgeRequest, EdgeResponse};

/// Extra per-request settings visible to middleware.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContextConfig {
    #[default]
    Empty,
    FeatureBranch(FeatureBranchSettings),
}

impl ContextConfig {
    pub fn feature_branch(&self) -> Option<&FeatureBranchSettings> {
        match self {
            ContextConfig::FeatureBranch(settings) => Some(settings),
            ContextConfig::Empty => None,
        }
    }
}

/// Script bodies deferred to the finalizer.
///
/// Append-only; consumed once by [`HeaderScripts::flush`].
#[derive(Debug, Clone, Default)]
pub struct HeaderScripts(Vec<String>);

impl HeaderScripts {
    pub fn push(&mut self, script: impl Into<String>) {
        self.0.push(script.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Take the scripts in accumulation order.
    pub fn flush(self) -> Vec<String> {
        self.0
    }
}

/// Request-phase state.
#[derive(Debug)]
pub struct RequestContext {
    original_request: EdgeRequest,
    request: EdgeRequest,
    response: Option<EdgeResponse>,
    config: ContextConfig,
    header_scripts: HeaderScripts,
}

impl RequestContext {
    pub fn new(incoming: EdgeRequest, config: ContextConfig) -> Self {
        Self {
            original_request: incoming.clone(),
            request: incoming,
            response: None,
            config,
            header_scripts: HeaderScripts::default(),
        }
    }

    /// The request as received by the pipeline.
    pub fn original_request(&self) -> &EdgeRequest {
        &self.original_request
    }

    /// The current working request.
    pub fn request(&self) -> &EdgeRequest {
        &self.request
    }

    pub fn response(&self) -> Option<&EdgeResponse> {
        self.response.as_ref()
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn header_scripts(&self) -> &HeaderScripts {
        &self.header_scripts
    }

    pub fn push_header_script(&mut self, script: impl Into<String>) {
        self.header_scripts.push(script);
    }

    pub(crate) fn set_request(&mut self, request: EdgeRequest) {
        self.request = request;
    }

    pub(crate) fn set_response(&mut self, response: EdgeResponse) {
        self.response = Some(response);
    }

    /// Response set by a short-circuiting middleware, if any.
    pub(crate) fn take_response(&mut self) -> Option<EdgeResponse> {
        self.response.take()
    }

    /// Enter the response phase with the response that will be returned.
    pub(crate) fn into_response_context(self, response: EdgeResponse) -> ResponseContext {
        ResponseContext {
            original_request: self.original_request,
            request: self.request,
            response,
            config: self.config,
            header_scripts: self.header_scripts,
        }
    }
}

/// Response-phase state.
#[derive(Debug)]
pub struct ResponseContext {
    original_request: EdgeRequest,
    request: EdgeRequest,
    response: EdgeResponse,
    config: ContextConfig,
    header_scripts: HeaderScripts,
}

impl ResponseContext {
    pub fn original_request(&self) -> &EdgeRequest {
        &self.original_request
    }

    /// The request that was (or would have been) sent to the origin.
    pub fn request(&self) -> &EdgeRequest {
        &self.request
    }

    pub fn response(&self) -> &EdgeResponse {
        &self.response
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn header_scripts(&self) -> &HeaderScripts {
        &self.header_scripts
    }

    pub fn push_header_script(&mut self, script: impl Into<String>) {
        self.header_scripts.push(script);
    }

    pub(crate) fn set_response(&mut self, response: EdgeResponse) {
        self.response = response;
    }

    /// Consume the context for finalization.
    pub(crate) fn into_parts(self) -> (EdgeResponse, HeaderScripts) {
        (self.response, self.header_scripts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn original_request_survives_replacement() {
        let incoming = EdgeRequest::get("https://www.example.com/a").unwrap();
        let mut ctx = RequestContext::new(incoming, ContextConfig::Empty);

        ctx.set_request(EdgeRequest::get("https://other.example.com/b").unwrap());

        assert_eq!(ctx.original_request().path(), "/a");
        assert_eq!(ctx.request().path(), "/b");
        assert!(!ctx.has_response());
    }

    #[test]
    fn header_scripts_carry_into_response_phase() {
        let incoming = EdgeRequest::get("https://www.example.com/").unwrap();
        let mut ctx = RequestContext::new(incoming, ContextConfig::Empty);
        ctx.push_header_script("one");

        let mut ctx = ctx.into_response_context(EdgeResponse::new(StatusCode::OK));
        ctx.push_header_script("two");

        let (_, scripts) = ctx.into_parts();
        assert_eq!(scripts.flush(), vec!["one".to_string(), "two".to_string()]);
    }
}
