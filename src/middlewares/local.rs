//! Reroutes used when running locally or on a feature subdomain, so every
//! resource is fetched from the dev environment.

use futures_util::future::BoxFuture;

use crate::environment::recursion::TEST_PAGE;
use crate::http::{EdgeRequest, EdgeResponse};
use crate::middlewares::rehost;
use crate::pipeline::{Outcome, PipelineError, RequestContext, RequestStep};

const LOCALHOST: &str = "localhost";

/// Host that serves the legacy web application in dev.
pub const LEGACY_DEV_SUBDOMAIN: &str = "nxi";

fn force_https(request: &EdgeRequest, host: &str) -> Result<url::Url, PipelineError> {
    let mut url = request.url().clone();
    rehost(&mut url, host)?;
    if url.scheme() != "https" {
        url.set_scheme("https").map_err(|()| PipelineError::Middleware {
            name: "localReroute".to_string(),
            message: format!("cannot switch {url} to https"),
        })?;
    }
    Ok(url)
}

/// Sends `localhost` traffic to the dev site.
#[derive(Debug, Clone)]
pub struct DevReroute {
    dev_host: String,
}

impl DevReroute {
    pub fn new(dev_host: impl Into<String>) -> Self {
        Self {
            dev_host: dev_host.into(),
        }
    }
}

impl RequestStep for DevReroute {
    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<Outcome, PipelineError>> {
        Box::pin(async move {
            let request = ctx.request().clone();
            if request.hostname() != LOCALHOST {
                return Ok(Outcome::Continue(request));
            }
            let url = force_https(&request, &self.dev_host)?;
            tracing::debug!(to = %url, "Local request rerouted to dev");
            Ok(Outcome::Continue(request.with_url(url)))
        })
    }
}

/// Sends legacy web application paths to the secure dev host, trailing
/// slash removed.
#[derive(Debug, Clone)]
pub struct LegacyWebReroute {
    host: String,
}

impl LegacyWebReroute {
    pub fn new(secure_dev_domain: &str) -> Self {
        Self {
            host: format!("{LEGACY_DEV_SUBDOMAIN}.{secure_dev_domain}"),
        }
    }
}

impl RequestStep for LegacyWebReroute {
    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<Outcome, PipelineError>> {
        Box::pin(async move {
            let request = ctx.request().clone();
            let mut url = force_https(&request, &self.host)?;
            if let Some(trimmed) = url.path().strip_suffix('/').map(str::to_string) {
                url.set_path(&trimmed);
            }
            tracing::debug!(to = %url, "Legacy web request rerouted to dev");
            Ok(Outcome::Continue(request.with_url(url)))
        })
    }
}

/// Answers with the local test page.
pub fn test_page(_ctx: &mut RequestContext) -> BoxFuture<'_, Result<Outcome, PipelineError>> {
    Box::pin(async { Ok(Outcome::ShortCircuit(EdgeResponse::html(TEST_PAGE))) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ContextConfig;

    async fn run(step: &dyn RequestStep, url: &str) -> String {
        let mut ctx = RequestContext::new(EdgeRequest::get(url).unwrap(), ContextConfig::Empty);
        match step.run(&mut ctx).await.unwrap() {
            Outcome::Continue(request) => request.url().to_string(),
            Outcome::ShortCircuit(_) => panic!("expected continue"),
        }
    }

    #[tokio::test]
    async fn localhost_goes_to_dev_over_https() {
        let step = DevReroute::new("dev.comparethemarket.com.au");
        assert_eq!(
            run(&step, "http://localhost:8787/car-insurance/?a=1").await,
            "https://dev.comparethemarket.com.au/car-insurance/?a=1"
        );
        assert_eq!(
            run(&step, "https://www.comparethemarket.com.au/x").await,
            "https://www.comparethemarket.com.au/x"
        );
    }

    #[tokio::test]
    async fn legacy_paths_lose_their_trailing_slash() {
        let step = LegacyWebReroute::new("secure.dev.comparethemarket.com.au");
        assert_eq!(
            run(&step, "http://localhost:8787/ctm/health_quote_v4.jsp/").await,
            "https://nxi.secure.dev.comparethemarket.com.au/ctm/health_quote_v4.jsp"
        );
        assert_eq!(
            run(&step, "https://dev.comparethemarket.com.au/").await,
            "https://nxi.secure.dev.comparethemarket.com.au/"
        );
    }

    #[tokio::test]
    async fn test_page_short_circuits() {
        let mut ctx = RequestContext::new(EdgeRequest::get("http://localhost:8787/").unwrap(), ContextConfig::Empty);
        let Outcome::ShortCircuit(response) = test_page(&mut ctx).await.unwrap() else {
            panic!("expected short circuit");
        };
        assert!(response.is_html());
    }
}
