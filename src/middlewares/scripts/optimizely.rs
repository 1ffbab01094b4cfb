use futures_util::future::BoxFuture;

use crate::html::{self, InjectLocation};
use crate::http::EdgeResponse;
use crate::pipeline::{PipelineError, ResponseContext};

const OPTIMIZELY_SNIPPET: &str = "<script src = https://cdn.optimizely.com/js/25653730077.js defer></script>";

/// Adds the Optimizely experiment loader at the head end.
pub fn inject_optimizely(ctx: &mut ResponseContext) -> BoxFuture<'_, Result<Option<EdgeResponse>, PipelineError>> {
    Box::pin(async move {
        Ok(html::inject_into_html(
            ctx.response(),
            OPTIMIZELY_SNIPPET,
            InjectLocation::HeadEnd,
        )?)
    })
}
