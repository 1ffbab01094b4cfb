//! Client-side script injection and third-party script proxying.
//!
//! # Data Flow
//! ```text
//! /metrics?id=GTM-X, /chat  → ScriptProxy (edge cache, fail open) → short-circuit
//! HTML response             → gtm / chat / optimizely / martech / threat injectors
//! DeferredScript            → header scripts → finalizer
//! ```

pub mod chat;
pub mod gtm;
pub mod martech;
pub mod optimizely;
pub mod threat;

use std::time::Duration;

use axum::http::header::{HeaderValue, CACHE_CONTROL};
use axum::http::Method;
use futures_util::future::BoxFuture;
use url::Url;

use crate::html::{self, InjectLocation};
use crate::http::{EdgeCache, EdgeRequest, EdgeResponse};
use crate::pipeline::{Outcome, PipelineError, RequestContext, RequestStep, ResponseContext, ResponseStep};
use crate::resilience::fail_open;

/// Serves a third-party script from our own domain.
///
/// GET requests are answered from the edge cache (or the upstream) with the
/// incoming query string; other methods, and failed retrievals, pass through.
pub struct ScriptProxy {
    name: &'static str,
    upstream: &'static str,
    edge_ttl: Duration,
    browser_max_age: u64,
    cache: EdgeCache,
    timeout: Duration,
}

impl ScriptProxy {
    pub fn new(
        name: &'static str,
        upstream: &'static str,
        edge_ttl: Duration,
        browser_max_age: u64,
        cache: EdgeCache,
        timeout: Duration,
    ) -> Self {
        Self {
            name,
            upstream,
            edge_ttl,
            browser_max_age,
            cache,
            timeout,
        }
    }

    /// Upstream URL carrying the incoming query string.
    pub fn upstream_url(&self, incoming: &Url) -> Result<Url, PipelineError> {
        let mut url = Url::parse(self.upstream)?;
        url.set_query(incoming.query());
        Ok(url)
    }
}

impl RequestStep for ScriptProxy {
    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<Outcome, PipelineError>> {
        Box::pin(async move {
            let request = ctx.request().clone();
            if request.method() != Method::GET {
                tracing::debug!(proxy = self.name, "Not a script request, passing through");
                return Ok(Outcome::Continue(request));
            }

            let url = self.upstream_url(request.url())?;
            tracing::debug!(proxy = self.name, upstream = %url, "Retrieving script");
            let fetched = fail_open(
                self.name,
                self.timeout,
                self.cache.fetch_with_ttl(EdgeRequest::new(Method::GET, url), self.edge_ttl),
            )
            .await;

            let Some(response) = fetched else {
                return Ok(Outcome::Continue(request));
            };
            let cache_control = HeaderValue::from_str(&format!("max-age={}", self.browser_max_age))
                .map_err(|e| PipelineError::invalid_header(CACHE_CONTROL.as_str(), e))?;
            Ok(Outcome::ShortCircuit(response.with_header(CACHE_CONTROL, cache_control)))
        })
    }
}

/// Injects a short console script at the head end, marking which router
/// variant served the page.
#[derive(Debug, Clone)]
pub struct BrandConsoleScript {
    script: String,
}

impl BrandConsoleScript {
    pub fn new(script: impl Into<String>) -> Self {
        Self { script: script.into() }
    }
}

impl ResponseStep for BrandConsoleScript {
    fn run<'a>(
        &'a self,
        ctx: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<Option<EdgeResponse>, PipelineError>> {
        Box::pin(async move {
            Ok(html::inject_scripts(
                ctx.response(),
                std::slice::from_ref(&self.script),
                InjectLocation::HeadEnd,
            )?)
        })
    }
}

/// Queues a script for the finalizer instead of injecting it now.
#[derive(Debug, Clone)]
pub struct DeferredScript {
    script: String,
}

impl DeferredScript {
    pub fn new(script: impl Into<String>) -> Self {
        Self { script: script.into() }
    }
}

impl ResponseStep for DeferredScript {
    fn run<'a>(
        &'a self,
        ctx: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<Option<EdgeResponse>, PipelineError>> {
        Box::pin(async move {
            ctx.push_header_script(self.script.as_str());
            Ok(None)
        })
    }
}
