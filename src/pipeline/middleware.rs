//! Named middleware wrappers.
//!
//! # Usage
//!
//! ```ignore
//! use futures_util::future::BoxFuture;
//! use edge_router::pipeline::{Outcome, PipelineError, RequestContext, RequestMiddleware};
//!
//! fn tag_request(ctx: &mut RequestContext) -> BoxFuture<'_, Result<Outcome, PipelineError>> {
//!     Box::pin(async move { Ok(Outcome::Continue(ctx.request().clone())) })
//! }
//!
//! let middleware = RequestMiddleware::from_fn("tagRequest", tag_request);
//! ```
//!
//! Parameterized middleware are structs implementing [`RequestStep`] or
//! [`ResponseStep`]; plain `fn` items are wrapped with `from_fn`.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::{EdgeRequest, EdgeResponse};
use crate::pipeline::context::{RequestContext, ResponseContext};
use crate::pipeline::error::PipelineError;

/// Result of one request-phase step.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Keep going with this request (possibly unchanged).
    Continue(EdgeRequest),
    /// Respond now; the origin fetch is skipped.
    ShortCircuit(EdgeResponse),
}

/// A request-phase step.
pub trait RequestStep: Send + Sync {
    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<Outcome, PipelineError>>;
}

/// A response-phase step. `None` keeps the current response.
pub trait ResponseStep: Send + Sync {
    fn run<'a>(
        &'a self,
        ctx: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<Option<EdgeResponse>, PipelineError>>;
}

/// Adapts a plain function into a [`RequestStep`].
pub struct FnRequestStep<F>(F);

impl<F> RequestStep for FnRequestStep<F>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, Result<Outcome, PipelineError>>
        + Send
        + Sync,
{
    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<Outcome, PipelineError>> {
        (self.0)(ctx)
    }
}

/// Adapts a plain function into a [`ResponseStep`].
pub struct FnResponseStep<F>(F);

impl<F> ResponseStep for FnResponseStep<F>
where
    F: for<'a> Fn(&'a mut ResponseContext) -> BoxFuture<'a, Result<Option<EdgeResponse>, PipelineError>>
        + Send
        + Sync,
{
    fn run<'a>(
        &'a self,
        ctx: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<Option<EdgeResponse>, PipelineError>> {
        (self.0)(ctx)
    }
}

/// A request-phase step with a diagnostic name.
#[derive(Clone)]
pub struct RequestMiddleware {
    name: Cow<'static, str>,
    step: Arc<dyn RequestStep>,
}

impl RequestMiddleware {
    pub fn new(name: impl Into<Cow<'static, str>>, step: impl RequestStep + 'static) -> Self {
        Self {
            name: name.into(),
            step: Arc::new(step),
        }
    }

    pub fn from_fn<F>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, Result<Outcome, PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, FnRequestStep(f))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the step. Errors pass through unchanged.
    pub async fn invoke(&self, ctx: &mut RequestContext) -> Result<Outcome, PipelineError> {
        tracing::debug!(middleware = %self.name, "Running request middleware");
        self.step.run(ctx).await
    }
}

impl fmt::Debug for RequestMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RequestMiddleware").field(&self.name).finish()
    }
}

/// A response-phase step with a diagnostic name.
#[derive(Clone)]
pub struct ResponseMiddleware {
    name: Cow<'static, str>,
    step: Arc<dyn ResponseStep>,
}

impl ResponseMiddleware {
    pub fn new(name: impl Into<Cow<'static, str>>, step: impl ResponseStep + 'static) -> Self {
        Self {
            name: name.into(),
            step: Arc::new(step),
        }
    }

    pub fn from_fn<F>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut ResponseContext) -> BoxFuture<'a, Result<Option<EdgeResponse>, PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, FnResponseStep(f))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn invoke(&self, ctx: &mut ResponseContext) -> Result<Option<EdgeResponse>, PipelineError> {
        tracing::debug!(middleware = %self.name, "Running response middleware");
        self.step.run(ctx).await
    }
}

impl fmt::Debug for ResponseMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResponseMiddleware").field(&self.name).finish()
    }
}
