use futures_util::future::BoxFuture;

use crate::pipeline::{Outcome, PipelineError, RequestContext, RequestStep};

/// Strips a path prefix before the request goes upstream.
#[derive(Debug, Clone)]
pub struct ReRouter {
    prefix: String,
}

impl ReRouter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl RequestStep for ReRouter {
    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<Outcome, PipelineError>> {
        Box::pin(async move {
            let request = ctx.request();
            let path = request.path();
            let stripped = path.replacen(self.prefix.as_str(), "", 1);
            if stripped == path {
                return Err(PipelineError::RoutePrefix {
                    path: path.to_string(),
                    prefix: self.prefix.clone(),
                });
            }

            let mut url = request.url().clone();
            url.set_path(&stripped);
            tracing::debug!(from = %request.url(), to = %url, "Rerouted request");
            Ok(Outcome::Continue(request.clone().with_url(url)))
        })
    }
}
