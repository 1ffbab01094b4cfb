//! Pipeline orchestration.
//!
//! # Flow
//! ```text
//! Init → RequestPhase → Fetch → ResponsePhase → Finalize → Done
//!                         │            │
//!                         │            └─ early return ──→ Finalize
//!                         └─ skipped when a request middleware responded
//! ```
//!
//! Registrations are matched against the path of the request as received,
//! even after middleware rewrote the working request.

use std::sync::Arc;

use tracing::Instrument;

use crate::html::{self, InjectLocation};
use crate::http::{EdgeRequest, EdgeResponse, Fetch};
use crate::pipeline::context::{ContextConfig, RequestContext, ResponseContext};
use crate::pipeline::error::PipelineError;
use crate::pipeline::executor::{execute_request_middleware, execute_response_middleware};
use crate::pipeline::registry::Registrations;

/// Orchestrator states, reported in trace logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    RequestPhase,
    Fetch,
    ResponsePhase,
    Finalize,
    Done,
}

/// Pre-response step applied exactly once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalizer {
    /// Flush accumulated header scripts into the HTML at a location.
    InjectHeaderScripts(InjectLocation),
    /// Return the response untouched.
    Passthrough,
}

impl Default for Finalizer {
    fn default() -> Self {
        Finalizer::InjectHeaderScripts(InjectLocation::HeadEnd)
    }
}

impl Finalizer {
    fn apply(&self, ctx: ResponseContext) -> Result<EdgeResponse, PipelineError> {
        let (response, scripts) = ctx.into_parts();
        match self {
            Finalizer::InjectHeaderScripts(location) => {
                let scripts = scripts.flush();
                Ok(html::inject_scripts(&response, &scripts, *location)?.unwrap_or(response))
            }
            Finalizer::Passthrough => Ok(response),
        }
    }
}

/// Runs one request through a set of registrations.
pub struct Pipeline {
    registrations: Registrations,
    fetcher: Arc<dyn Fetch>,
}

impl Pipeline {
    pub fn new(registrations: Registrations, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            registrations,
            fetcher,
        }
    }

    pub fn registrations(&self) -> &Registrations {
        &self.registrations
    }

    /// Drive the request to a final response.
    pub async fn handle(
        &self,
        incoming: EdgeRequest,
        config: ContextConfig,
    ) -> Result<EdgeResponse, PipelineError> {
        let request_id = incoming.request_id().to_string();
        let path = incoming.path().to_string();
        let span = tracing::debug_span!("pipeline", request_id = %request_id, path = %path);
        self.run(incoming, config, path).instrument(span).await
    }

    async fn run(
        &self,
        incoming: EdgeRequest,
        config: ContextConfig,
        path: String,
    ) -> Result<EdgeResponse, PipelineError> {
        trace_state(PipelineState::Init);
        let mut ctx = RequestContext::new(incoming, config);

        trace_state(PipelineState::RequestPhase);
        for registration in self.registrations.matching_request(&path) {
            tracing::trace!(pattern = %registration.pattern(), "Request registration matched");
            execute_request_middleware(registration.middleware(), &mut ctx).await?;
        }

        let response = match ctx.take_response() {
            Some(response) => {
                tracing::debug!(status = %response.status(), "Origin fetch skipped");
                response
            }
            None => {
                trace_state(PipelineState::Fetch);
                self.fetcher.fetch(ctx.request().clone()).await?
            }
        };
        let mut ctx = ctx.into_response_context(response);

        trace_state(PipelineState::ResponsePhase);
        for registration in self.registrations.matching_response(&path) {
            tracing::trace!(pattern = %registration.pattern(), "Response registration matched");
            execute_response_middleware(registration.middleware(), &mut ctx).await?;
            if registration.is_early_return() {
                tracing::debug!(pattern = %registration.pattern(), "Early return");
                break;
            }
        }

        trace_state(PipelineState::Finalize);
        let response = self.registrations.finalizer().apply(ctx)?;

        trace_state(PipelineState::Done);
        Ok(response)
    }
}

fn trace_state(state: PipelineState) {
    tracing::trace!(state = ?state, "Pipeline state");
}
