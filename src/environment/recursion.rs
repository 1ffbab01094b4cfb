//! Loop protection for requests that route back into the router.

use axum::http::header::{HeaderName, HeaderValue};
use axum::http::StatusCode;

use crate::http::{EdgeRequest, EdgeResponse};
use crate::pipeline::{Outcome, PipelineError};

/// Counter header incremented on every pass through the router.
pub const RECURSION_HEADER: &str = "ctm-cf-router";

/// Passes allowed before the request is answered with a 404.
pub const MAX_PASSES: u32 = 5;

/// Page returned in testing mode when nothing serves the route.
pub const TEST_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Edge router test page</title></head>
<body>
<h1>Edge router test page</h1>
<p>Nothing upstream serves this route.</p>
</body>
</html>
"#;

/// Stop requests that have already looped through the router too often,
/// otherwise bump the counter on the forwarded request.
pub fn guard_recursion(request: EdgeRequest, test_mode: bool) -> Result<Outcome, PipelineError> {
    let passes = request
        .header(RECURSION_HEADER)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(0);

    if passes >= MAX_PASSES {
        tracing::warn!(passes, "Router called repeatedly for one request, refusing to recurse");
        let response = if test_mode {
            EdgeResponse::html(TEST_PAGE)
        } else {
            EdgeResponse::text(
                StatusCode::NOT_FOUND,
                format!(
                    "Worker was called for the {passes} time in one request. This indicates recursion because nothing exists on the route other than the worker."
                ),
            )
        };
        return Ok(Outcome::ShortCircuit(response));
    }

    let value = HeaderValue::from_str(&(passes + 1).to_string())
        .map_err(|e| PipelineError::invalid_header(RECURSION_HEADER, e))?;
    Ok(Outcome::Continue(
        request.with_header(HeaderName::from_static(RECURSION_HEADER), value),
    ))
}
