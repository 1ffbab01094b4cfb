//! Home loan borrowing-power calculator, served by VisionAbacus through our
//! domain so its iframe interactions stay trackable.

use axum::http::header::{HeaderValue, CONTENT_TYPE};
use futures_util::future::BoxFuture;

use crate::http::EdgeResponse;
use crate::pipeline::{Outcome, PipelineError, RequestContext, ResponseContext};

pub const CALCULATOR_HOST: &str = "www.visionabacus.net";

/// Script path the provider serves as `text/html`.
const MISLABELLED_SCRIPT_PATH: &str = "/AbacusServer/JS/AbacusJS/AbacusJS_B3";

/// Sends calculator paths to the provider host, keeping path and query.
pub fn homeloan_calculator_redirect(ctx: &mut RequestContext) -> BoxFuture<'_, Result<Outcome, PipelineError>> {
    Box::pin(async move {
        let request = ctx.request();
        let mut url = request.url().clone();
        url.set_host(Some(CALCULATOR_HOST))?;
        Ok(Outcome::Continue(request.clone().with_url(url)))
    })
}

/// Relabels the calculator script so browsers will execute it.
pub fn content_type_fix(ctx: &mut ResponseContext) -> BoxFuture<'_, Result<Option<EdgeResponse>, PipelineError>> {
    Box::pin(async move {
        if !ctx.original_request().url().as_str().contains(MISLABELLED_SCRIPT_PATH) {
            return Ok(None);
        }
        Ok(Some(
            ctx.response()
                .clone()
                .with_header(CONTENT_TYPE, HeaderValue::from_static("text/javascript")),
        ))
    })
}
