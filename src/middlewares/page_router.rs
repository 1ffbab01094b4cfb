//! Routing to Cloudflare Pages projects behind Zero Trust.
//!
//! A public path such as `/profile/settings` is served by
//! `ctm-customer-accounts-auth0-ui.pages.dev/settings`: the host is swapped,
//! the route prefix optionally removed, and the Zero Trust service token is
//! attached so the page origin accepts the request.

use axum::http::header::{HeaderName, HeaderValue, SET_COOKIE};
use futures_util::future::BoxFuture;
use url::Url;

use crate::config::CredentialsConfig;
use crate::html;
use crate::http::{EdgeRequest, EdgeResponse};
use crate::middlewares::rehost;
use crate::pipeline::{Outcome, PipelineError, RequestContext, RequestStep, ResponseContext, ResponseStep};

pub const CF_ACCESS_CLIENT_ID: &str = "cf-access-client-id";
pub const CF_ACCESS_CLIENT_SECRET: &str = "cf-access-client-secret";

/// Cookie the Zero Trust edge sets on page responses.
const CF_AUTH_COOKIE: &str = "CF_Authorization";

/// Zero Trust service token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfAccessDetails {
    pub client_id: String,
    pub secret: String,
}

impl CfAccessDetails {
    /// `None` when no client id is configured.
    pub fn from_config(credentials: &CredentialsConfig) -> Option<Self> {
        if credentials.cf_access_client_id.is_empty() {
            return None;
        }
        Some(Self {
            client_id: credentials.cf_access_client_id.clone(),
            secret: credentials.cf_access_auth_token.clone(),
        })
    }

    /// Copy of `request` carrying the service token headers.
    pub fn apply(&self, request: EdgeRequest) -> Result<EdgeRequest, PipelineError> {
        let id = HeaderValue::from_str(&self.client_id)
            .map_err(|e| PipelineError::invalid_header(CF_ACCESS_CLIENT_ID, e))?;
        let secret = HeaderValue::from_str(&self.secret)
            .map_err(|e| PipelineError::invalid_header(CF_ACCESS_CLIENT_SECRET, e))?;
        Ok(request
            .with_header(HeaderName::from_static(CF_ACCESS_CLIENT_ID), id)
            .with_header(HeaderName::from_static(CF_ACCESS_CLIENT_SECRET), secret))
    }
}

/// Where a page route forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRouteSettings {
    /// Public prefix, e.g. `/pet/compare/`.
    pub route_prefix: String,
    /// Pages host the request is sent to.
    pub dest_host: String,
    /// Strip `route_prefix` from the forwarded path.
    pub remove_sub_route: bool,
    /// Fixed path sent to the page regardless of the public path.
    pub static_path: Option<String>,
    pub cf_access: Option<CfAccessDetails>,
}

impl PageRouteSettings {
    pub fn new(route_prefix: impl Into<String>, dest_host: impl Into<String>) -> Self {
        Self {
            route_prefix: route_prefix.into(),
            dest_host: dest_host.into(),
            remove_sub_route: true,
            static_path: None,
            cf_access: None,
        }
    }

    /// Forward the full public path.
    pub fn keep_sub_route(mut self) -> Self {
        self.remove_sub_route = false;
        self
    }

    pub fn static_path(mut self, path: impl Into<String>) -> Self {
        self.static_path = Some(path.into());
        self
    }
}

/// Compute the page URL for a public URL.
///
/// With `remove_sub_route` the first occurrence of the prefix becomes `/`;
/// a bare prefix without its trailing slash (`/legal`) is removed instead.
/// A path containing neither is an error.
pub fn change_url(url: &Url, settings: &PageRouteSettings) -> Result<Url, PipelineError> {
    let mut new_url = url.clone();
    rehost(&mut new_url, &settings.dest_host)?;

    let old_path = url.path();
    let mut new_path = old_path.to_string();
    if settings.remove_sub_route {
        new_path = old_path.replacen(settings.route_prefix.as_str(), "/", 1);
        if new_path == old_path {
            let mut bare = settings.route_prefix.chars();
            bare.next_back();
            new_path = old_path.replacen(bare.as_str(), "", 1);
            if new_path == old_path {
                return Err(PipelineError::RoutePrefix {
                    path: old_path.to_string(),
                    prefix: settings.route_prefix.clone(),
                });
            }
        }
    }
    if let Some(static_path) = &settings.static_path {
        new_path = static_path.clone();
    }
    if !new_path.starts_with('/') {
        new_path.insert(0, '/');
    }
    new_url.set_path(&new_path);
    Ok(new_url)
}

/// Forwards matching requests to a Pages project.
#[derive(Debug, Clone)]
pub struct PageRouter {
    settings: PageRouteSettings,
}

impl PageRouter {
    pub fn new(settings: PageRouteSettings) -> Self {
        Self { settings }
    }
}

impl RequestStep for PageRouter {
    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<Outcome, PipelineError>> {
        Box::pin(async move {
            let request = ctx.request();
            let url = change_url(request.url(), &self.settings)?;
            tracing::debug!(from = %request.url(), to = %url, "Routing to page origin");

            let routed = request.clone().with_url(url);
            let routed = match &self.settings.cf_access {
                Some(details) => details.apply(routed)?,
                None => routed,
            };
            Ok(Outcome::Continue(routed))
        })
    }
}

/// Attaches the Zero Trust service token to the working request.
#[derive(Debug, Clone)]
pub struct EmbedCfAccessHeaders {
    details: Option<CfAccessDetails>,
}

impl EmbedCfAccessHeaders {
    pub fn new(details: Option<CfAccessDetails>) -> Self {
        Self { details }
    }
}

impl RequestStep for EmbedCfAccessHeaders {
    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<Outcome, PipelineError>> {
        Box::pin(async move {
            let request = ctx.request().clone();
            match &self.details {
                Some(details) => Ok(Outcome::Continue(details.apply(request)?)),
                None => {
                    tracing::warn!("No Zero Trust credentials configured, page origin may reject the request");
                    Ok(Outcome::Continue(request))
                }
            }
        })
    }
}

/// Points the `<base href>` of single-page apps at the public route prefix,
/// so relative asset requests come back through the router.
#[derive(Debug, Clone)]
pub struct BaseTagRewrite {
    route_prefix: String,
}

impl BaseTagRewrite {
    pub fn new(route_prefix: impl Into<String>) -> Self {
        Self {
            route_prefix: route_prefix.into(),
        }
    }

    fn base_href(&self, original: &Url) -> String {
        let mut base = original.clone();
        base.set_path(&self.route_prefix);
        base.set_query(None);
        let mut href = base.to_string();
        if !href.ends_with('/') {
            href.push('/');
        }
        href
    }
}

impl ResponseStep for BaseTagRewrite {
    fn run<'a>(
        &'a self,
        ctx: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<Option<EdgeResponse>, PipelineError>> {
        Box::pin(async move {
            let href = self.base_href(ctx.original_request().url());
            tracing::debug!(href = %href, "Rewriting base tag");
            Ok(html::rewrite_attribute(ctx.response(), "base", "href", &href)?)
        })
    }
}

/// Drops the `CF_Authorization` cookie the page origin sets, so the
/// browser never holds a Zero Trust session for the brand domain.
pub fn remove_cf_auth_cookie(ctx: &mut ResponseContext) -> BoxFuture<'_, Result<Option<EdgeResponse>, PipelineError>> {
    Box::pin(async move {
        let response = ctx.response();
        let prefix = format!("{CF_AUTH_COOKIE}=");
        if !response.set_cookies().any(|c| c.trim_start().starts_with(&prefix)) {
            return Ok(None);
        }

        let kept: Vec<HeaderValue> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter(|v| !v.to_str().is_ok_and(|c| c.trim_start().starts_with(&prefix)))
            .cloned()
            .collect();

        let mut updated = response.clone();
        let headers = updated.headers_mut();
        headers.remove(SET_COOKIE);
        for value in kept {
            headers.append(SET_COOKIE, value);
        }
        tracing::debug!("Removed {CF_AUTH_COOKIE} from Set-Cookie");
        Ok(Some(updated))
    })
}
