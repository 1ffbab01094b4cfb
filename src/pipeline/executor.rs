//! Sequential executors for one registration's middleware list.

use crate::observability::metrics;
use crate::pipeline::context::{RequestContext, ResponseContext};
use crate::pipeline::error::PipelineError;
use crate::pipeline::middleware::{Outcome, RequestMiddleware, ResponseMiddleware};

/// Run request middleware in order.
///
/// A short-circuit stores the response and leaves the request alone; later
/// middleware in the same list still run.
pub async fn execute_request_middleware(
    middleware: &[RequestMiddleware],
    ctx: &mut RequestContext,
) -> Result<(), PipelineError> {
    for m in middleware {
        metrics::record_middleware_run("request", m.name());
        match m.invoke(ctx).await? {
            Outcome::Continue(request) => ctx.set_request(request),
            Outcome::ShortCircuit(response) => {
                tracing::debug!(middleware = %m.name(), status = %response.status(), "Request short-circuited");
                ctx.set_response(response);
            }
        }
    }
    Ok(())
}

/// Run response middleware in order, each seeing the previous one's output.
pub async fn execute_response_middleware(
    middleware: &[ResponseMiddleware],
    ctx: &mut ResponseContext,
) -> Result<(), PipelineError> {
    for m in middleware {
        metrics::record_middleware_run("response", m.name());
        if let Some(response) = m.invoke(ctx).await? {
            ctx.set_response(response);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{EdgeRequest, EdgeResponse};
    use crate::pipeline::context::ContextConfig;
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use futures_util::future::BoxFuture;

    fn block(_ctx: &mut RequestContext) -> BoxFuture<'_, Result<Outcome, PipelineError>> {
        Box::pin(async { Ok(Outcome::ShortCircuit(EdgeResponse::text(StatusCode::BAD_REQUEST, "no"))) })
    }

    fn tag(ctx: &mut RequestContext) -> BoxFuture<'_, Result<Outcome, PipelineError>> {
        Box::pin(async move {
            let request = ctx.request().clone().with_header(
                HeaderName::from_static("x-tagged"),
                HeaderValue::from_static("yes"),
            );
            Ok(Outcome::Continue(request))
        })
    }

    fn keep(_ctx: &mut ResponseContext) -> BoxFuture<'_, Result<Option<EdgeResponse>, PipelineError>> {
        Box::pin(async { Ok(None) })
    }

    fn teapot(ctx: &mut ResponseContext) -> BoxFuture<'_, Result<Option<EdgeResponse>, PipelineError>> {
        Box::pin(async move { Ok(Some(ctx.response().clone().with_status(StatusCode::IM_A_TEAPOT))) })
    }

    fn request_context() -> RequestContext {
        RequestContext::new(
            EdgeRequest::get("https://www.example.com/").unwrap(),
            ContextConfig::Empty,
        )
    }

    #[tokio::test]
    async fn short_circuit_keeps_request_and_runs_the_rest() {
        let mut ctx = request_context();
        let list = vec![
            RequestMiddleware::from_fn("block", block),
            RequestMiddleware::from_fn("tag", tag),
        ];

        execute_request_middleware(&list, &mut ctx).await.unwrap();

        assert_eq!(ctx.response().map(|r| r.status()), Some(StatusCode::BAD_REQUEST));
        assert_eq!(ctx.request().header("x-tagged"), Some("yes"));
    }

    #[tokio::test]
    async fn none_leaves_response_unchanged() {
        let mut ctx = request_context().into_response_context(EdgeResponse::new(StatusCode::OK));
        let list = vec![
            ResponseMiddleware::from_fn("teapot", teapot),
            ResponseMiddleware::from_fn("keep", keep),
        ];

        execute_response_middleware(&list, &mut ctx).await.unwrap();

        assert_eq!(ctx.response().status(), StatusCode::IM_A_TEAPOT);
    }
}
