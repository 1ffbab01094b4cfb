use axum::http::header::{HeaderValue, SET_COOKIE};
use futures_util::future::BoxFuture;

use crate::http::EdgeResponse;
use crate::pipeline::{PipelineError, ResponseContext, ResponseStep};

const GA_COOKIE: &str = "_ga";

/// Longest accepted client id (last two dot segments of `_ga`).
const MAX_CLIENT_ID_LEN: usize = 21;

/// Length of the client id part of a `_ga` value, e.g. `GA1.2.123.456` → 7.
pub fn client_id_len(ga: &str) -> usize {
    let segments: Vec<&str> = ga.split('.').collect();
    let start = segments.len().saturating_sub(2);
    segments[start..].join(".").len()
}

/// Deletes malformed `_ga` cookies whose client id has grown too long.
#[derive(Debug, Clone)]
pub struct GaCookieFix {
    root_domain: String,
}

impl GaCookieFix {
    pub fn new(root_domain: impl Into<String>) -> Self {
        Self {
            root_domain: root_domain.into(),
        }
    }
}

impl ResponseStep for GaCookieFix {
    fn run<'a>(
        &'a self,
        ctx: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<Option<EdgeResponse>, PipelineError>> {
        Box::pin(async move {
            let too_long = ctx
                .request()
                .cookie(GA_COOKIE)
                .is_some_and(|ga| client_id_len(&ga) > MAX_CLIENT_ID_LEN);
            if !too_long {
                return Ok(None);
            }

            tracing::debug!("Deleting oversized _ga cookie");
            let expire = format!(
                "{GA_COOKIE}= ; Domain={}; Path=/; expires = Thu, 01 Jan 1970 00:00:00 GMT",
                self.root_domain
            );
            let value = HeaderValue::from_str(&expire)
                .map_err(|e| PipelineError::invalid_header(SET_COOKIE.as_str(), e))?;
            Ok(Some(ctx.response().clone().with_appended_header(SET_COOKIE, value)))
        })
    }
}
