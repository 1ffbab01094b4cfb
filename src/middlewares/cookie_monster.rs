//! Oversized cookie protection for the journey APIs.
//!
//! Amplify and Cognito client libraries leave large cookies on the root
//! domain that push requests past upstream header limits. The request side
//! strips them (and stray AWS signing headers) and rejects what is still too
//! large; the response side expires them in the browser.

use axum::http::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use axum::http::StatusCode;
use futures_util::future::BoxFuture;

use crate::http::{EdgeRequest, EdgeResponse};
use crate::pipeline::{Outcome, PipelineError, RequestContext, ResponseStep, ResponseContext};

/// Largest combined header size accepted, in bytes.
pub const HEADER_LIMIT_BYTES: usize = 10_000;

const BLOCKED_COOKIES: [&str; 6] = [
    "ca_deviceKey",
    "ca_passKey",
    "ca_refreshToken",
    "ca_accessToken",
    "ca_idToken",
    "ca_authuser",
];

const BLOCKED_COOKIE_PREFIXES: [&str; 2] = ["CognitoIdentity", "amplify"];

const BLOCKED_HEADERS: [&str; 2] = ["x-amz-security-token", "x-amz-date"];

pub fn is_blocked_cookie(name: &str) -> bool {
    BLOCKED_COOKIES.contains(&name) || BLOCKED_COOKIE_PREFIXES.iter().any(|p| name.starts_with(p))
}

fn cookie_name(pair: &str) -> &str {
    pair.split('=').next().unwrap_or_default().trim()
}

/// Every `name=value` pair across all `Cookie` headers. HTTP/2 clients may
/// split cookies over several header lines.
fn cookie_pairs(headers: &HeaderMap) -> impl Iterator<Item = &str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
}

/// Sum of `name: value` lengths over every header.
pub fn header_size(request: &EdgeRequest) -> usize {
    request
        .headers()
        .iter()
        .map(|(name, value)| name.as_str().len() + 2 + value.as_bytes().len())
        .sum()
}

/// Copy of `request` without blocked headers and cookies.
pub fn strip_request(request: EdgeRequest) -> Result<EdgeRequest, PipelineError> {
    let request = BLOCKED_HEADERS
        .iter()
        .fold(request, |request, name| request.without_header(name));

    if !request.headers().contains_key(COOKIE) {
        return Ok(request);
    }

    let permitted = cookie_pairs(request.headers())
        .filter(|pair| !is_blocked_cookie(cookie_name(pair)))
        .collect::<Vec<_>>()
        .join("; ");
    let request = request.without_header(COOKIE.as_str());
    if permitted.is_empty() {
        return Ok(request);
    }
    let value = HeaderValue::from_str(&permitted).map_err(|e| PipelineError::invalid_header(COOKIE.as_str(), e))?;
    Ok(request.with_header(COOKIE, value))
}

/// Request side: strip, then reject requests whose headers are still too big.
pub fn monster_cookie_request_fix(ctx: &mut RequestContext) -> BoxFuture<'_, Result<Outcome, PipelineError>> {
    Box::pin(async move {
        let request = strip_request(ctx.request().clone())?;
        let size = header_size(&request);
        if size >= HEADER_LIMIT_BYTES {
            tracing::info!(size, limit = HEADER_LIMIT_BYTES, "Header size limit exceeded, rejecting request");
            return Ok(Outcome::ShortCircuit(EdgeResponse::text(
                StatusCode::BAD_REQUEST,
                format!("total combined header size (in bytes) '{size}' exceeds limit '{HEADER_LIMIT_BYTES}'\n"),
            )));
        }
        Ok(Outcome::Continue(request))
    })
}

/// Response side: expire every blocked cookie the browser sent.
#[derive(Debug, Clone)]
pub struct MonsterCookieResponseFix {
    root_domain: String,
}

impl MonsterCookieResponseFix {
    pub fn new(root_domain: impl Into<String>) -> Self {
        Self {
            root_domain: root_domain.into(),
        }
    }
}

impl ResponseStep for MonsterCookieResponseFix {
    fn run<'a>(
        &'a self,
        ctx: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<Option<EdgeResponse>, PipelineError>> {
        Box::pin(async move {
            let blocked: Vec<String> = cookie_pairs(ctx.original_request().headers())
                .map(cookie_name)
                .filter(|name| is_blocked_cookie(name))
                .map(str::to_string)
                .collect();
            if blocked.is_empty() {
                return Ok(None);
            }

            let mut response = ctx.response().clone();
            for name in &blocked {
                tracing::debug!(cookie = name, "Expiring blocked cookie");
                let expire = format!(
                    "{name}= ; Domain={}; Path=/; expires = Thu, 01 Jan 1970 00:00:00 GMT;",
                    self.root_domain
                );
                let value = HeaderValue::from_str(&expire)
                    .map_err(|e| PipelineError::invalid_header(SET_COOKIE.as_str(), e))?;
                response = response.with_appended_header(SET_COOKIE, value);
            }
            Ok(Some(response))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ContextConfig;
    use axum::http::header::HeaderName;

    fn request_with(cookie: &str) -> EdgeRequest {
        EdgeRequest::get("https://www.comparethemarket.com.au/api/car-journey/journey/new")
            .unwrap()
            .with_header(COOKIE, HeaderValue::from_str(cookie).unwrap())
            .with_header(HeaderName::from_static("x-amz-date"), HeaderValue::from_static("20240101"))
    }

    #[tokio::test]
    async fn blocked_cookies_and_headers_are_stripped() {
        let mut ctx = RequestContext::new(
            request_with("keep=1; ca_idToken=x; amplify-signin=y; CognitoIdentityServiceProvider.abc=z; other=2"),
            ContextConfig::Empty,
        );

        let Outcome::Continue(request) = monster_cookie_request_fix(&mut ctx).await.unwrap() else {
            panic!("expected continue");
        };
        assert_eq!(request.header("cookie"), Some("keep=1; other=2"));
        assert!(request.header("x-amz-date").is_none());
    }

    #[tokio::test]
    async fn oversized_headers_are_rejected() {
        let big = format!("keep={}", "a".repeat(HEADER_LIMIT_BYTES));
        let mut ctx = RequestContext::new(request_with(&big), ContextConfig::Empty);

        let Outcome::ShortCircuit(response) = monster_cookie_request_fix(&mut ctx).await.unwrap() else {
            panic!("expected short circuit");
        };
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = String::from_utf8_lossy(response.body()).into_owned();
        assert!(body.starts_with("total combined header size (in bytes) '"));
        assert!(body.ends_with("' exceeds limit '10000'\n"));
    }

    #[test]
    fn cookies_split_across_headers_survive_the_strip() {
        let request = request_with("amplify-x=1; a=1")
            .with_appended_header(COOKIE, HeaderValue::from_static("user_anonymous_id=abc.1; ca_idToken=t"));

        let request = strip_request(request).unwrap();
        assert_eq!(request.headers().get_all(COOKIE).iter().count(), 1);
        assert_eq!(request.header("cookie"), Some("a=1; user_anonymous_id=abc.1"));
        assert_eq!(request.cookie("user_anonymous_id").as_deref(), Some("abc.1"));
    }

    #[test]
    fn a_cookie_header_of_only_blocked_cookies_is_dropped() {
        let request = strip_request(request_with("ca_idToken=x; amplify-y=2")).unwrap();
        assert!(request.header("cookie").is_none());
    }

    #[test]
    fn header_size_counts_name_separator_and_value() {
        let request = EdgeRequest::get("https://example.com/")
            .unwrap()
            .with_header(HeaderName::from_static("x-a"), HeaderValue::from_static("12345"));
        assert_eq!(header_size(&request), "x-a: 12345".len());
    }

    #[tokio::test]
    async fn response_expires_blocked_cookies() {
        let ctx = RequestContext::new(request_with("keep=1; ca_passKey=2; amplify-x=3"), ContextConfig::Empty);
        let mut ctx = ctx.into_response_context(EdgeResponse::new(StatusCode::OK));

        let response = MonsterCookieResponseFix::new("comparethemarket.com.au")
            .run(&mut ctx)
            .await
            .unwrap()
            .unwrap();
        let cookies: Vec<&str> = response.set_cookies().collect();
        assert_eq!(
            cookies,
            vec![
                "ca_passKey= ; Domain=comparethemarket.com.au; Path=/; expires = Thu, 01 Jan 1970 00:00:00 GMT;",
                "amplify-x= ; Domain=comparethemarket.com.au; Path=/; expires = Thu, 01 Jan 1970 00:00:00 GMT;",
            ]
        );
    }

    #[tokio::test]
    async fn response_expires_blocked_cookies_from_every_cookie_header() {
        let request = request_with("keep=1").with_appended_header(COOKIE, HeaderValue::from_static("ca_authuser=0"));
        let ctx = RequestContext::new(request, ContextConfig::Empty);
        let mut ctx = ctx.into_response_context(EdgeResponse::new(StatusCode::OK));

        let response = MonsterCookieResponseFix::new("comparethemarket.com.au")
            .run(&mut ctx)
            .await
            .unwrap()
            .unwrap();
        let cookies: Vec<&str> = response.set_cookies().collect();
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("ca_authuser= ;"));
    }
}
