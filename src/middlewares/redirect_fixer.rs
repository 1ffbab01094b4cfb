//! Maps upstream redirects back onto the public URL space.
//!
//! When `/pet/compare/quote` is served by a page origin as `/quote`, a
//! redirect to `/quote/step2` must reach the browser as
//! `/pet/compare/quote/step2` on the public host. The part where the public
//! and forwarded paths differ (compared from the end) is swapped back in.

use axum::http::header::{HeaderValue, LOCATION};
use futures_util::future::BoxFuture;
use url::Url;

use crate::http::EdgeResponse;
use crate::pipeline::{PipelineError, ResponseContext};

/// Leading parts of `a` and `b` that remain once their common suffix is
/// removed.
pub fn diff_from_end<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    let (x, y) = (a.as_bytes(), b.as_bytes());
    let mut common = 0;
    while common < x.len() && common < y.len() && x[x.len() - 1 - common] == y[y.len() - 1 - common] {
        common += 1;
    }
    (
        a.get(..a.len() - common).unwrap_or_default(),
        b.get(..b.len() - common).unwrap_or_default(),
    )
}

fn url_error(what: &str) -> PipelineError {
    PipelineError::Middleware {
        name: "redirectUrlFixer".to_string(),
        message: format!("cannot set {what} on redirect url"),
    }
}

/// Rewrite the `Location` of a 3xx `response`.
///
/// `None` when the response is not a redirect, has no location, or
/// redirects away from the forwarded host.
pub fn fix_redirect(
    original: &Url,
    requested: &Url,
    response: &EdgeResponse,
) -> Result<Option<EdgeResponse>, PipelineError> {
    if !response.status().is_redirection() {
        return Ok(None);
    }
    let Some(location) = response.header(LOCATION.as_str()) else {
        tracing::warn!("Redirect without a Location header, leaving it alone");
        return Ok(None);
    };

    let absolute = if location.contains("http") {
        location.to_string()
    } else {
        format!(
            "{}://{}{}",
            requested.scheme(),
            requested.host_str().unwrap_or_default(),
            location
        )
    };
    let mut redirect = Url::parse(&absolute)?;
    if redirect.host_str() != requested.host_str() {
        tracing::debug!(location = %redirect, "Redirect leaves the forwarded host, leaving it alone");
        return Ok(None);
    }

    let (original_part, requested_part) = diff_from_end(original.path(), requested.path());
    let path = redirect.path().replacen(requested_part, original_part, 1);
    redirect.set_path(&path);
    redirect.set_host(original.host_str())?;
    redirect.set_port(original.port()).map_err(|()| url_error("port"))?;
    redirect.set_scheme(original.scheme()).map_err(|()| url_error("scheme"))?;

    tracing::debug!(location = %redirect, "Remapped redirect");
    let value = HeaderValue::from_str(redirect.as_str())
        .map_err(|e| PipelineError::invalid_header(LOCATION.as_str(), e))?;
    Ok(Some(response.clone().with_header(LOCATION, value)))
}

pub fn redirect_url_fixer(ctx: &mut ResponseContext) -> BoxFuture<'_, Result<Option<EdgeResponse>, PipelineError>> {
    Box::pin(async move { fix_redirect(ctx.original_request().url(), ctx.request().url(), ctx.response()) })
}
