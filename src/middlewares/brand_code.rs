use futures_util::future::BoxFuture;

use crate::pipeline::{Outcome, PipelineError, RequestContext};

const BRAND_CODE: &str = "brandCode";

/// Tags legacy JSP requests with `brandCode=ctm`; the health payment pages
/// depend on it.
pub fn add_brand_code(ctx: &mut RequestContext) -> BoxFuture<'_, Result<Outcome, PipelineError>> {
    Box::pin(async move {
        let request = ctx.request();
        if !request.path().contains(".jsp") {
            return Ok(Outcome::Continue(request.clone()));
        }

        let mut url = request.url().clone();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != BRAND_CODE)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(pairs)
            .append_pair(BRAND_CODE, "ctm");
        Ok(Outcome::Continue(request.clone().with_url(url)))
    })
}
