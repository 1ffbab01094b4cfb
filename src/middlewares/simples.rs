use axum::http::header::SET_COOKIE;
use futures_util::future::BoxFuture;

use crate::http::EdgeResponse;
use crate::middlewares::cookie_jar::{SetCookie, EXPIRED};
use crate::pipeline::{PipelineError, ResponseContext, ResponseStep};

/// Cookie marking a browser logged into the health call centre (Simples).
pub const CALL_CENTRE_COOKIE: &str = "isSimplesUser";

pub const LOGGED_IN_FRAGMENT: &str = "ctm/simples/home.jsp";
pub const LOGOUT_FRAGMENT: &str = "ctm/security/simples_logout.jsp";

/// Sets the call centre cookie on login and expires it on logout.
///
/// The cookie is scoped to `.<root domain>` so the legacy host sees it too.
#[derive(Debug, Clone)]
pub struct SimplesCookieManager {
    domain: String,
}

impl SimplesCookieManager {
    pub fn new(root_domain: &str) -> Self {
        Self {
            domain: format!(".{root_domain}"),
        }
    }
}

impl ResponseStep for SimplesCookieManager {
    fn run<'a>(
        &'a self,
        ctx: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<Option<EdgeResponse>, PipelineError>> {
        Box::pin(async move {
            let url = ctx.request().url().as_str();
            let mut response = ctx.response().clone();

            if url.contains(LOGGED_IN_FRAGMENT) {
                tracing::debug!("Call centre login, setting {CALL_CENTRE_COOKIE}");
                let cookie = SetCookie::new(CALL_CENTRE_COOKIE, "true")
                    .http_only()
                    .domain(self.domain.as_str());
                response = response.with_appended_header(SET_COOKIE, cookie.header_value(false, &self.domain)?);
            }
            if url.contains(LOGOUT_FRAGMENT) {
                tracing::debug!("Call centre logout, expiring {CALL_CENTRE_COOKIE}");
                let cookie = SetCookie::new(CALL_CENTRE_COOKIE, "")
                    .expires(EXPIRED)
                    .http_only()
                    .domain(self.domain.as_str());
                response = response.with_appended_header(SET_COOKIE, cookie.header_value(false, &self.domain)?);
            }
            Ok(Some(response))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::EdgeRequest;
    use crate::pipeline::{ContextConfig, RequestContext};
    use axum::http::StatusCode;

    async fn cookies_for(url: &str) -> Vec<String> {
        let ctx = RequestContext::new(EdgeRequest::get(url).unwrap(), ContextConfig::Empty);
        let mut ctx = ctx.into_response_context(EdgeResponse::new(StatusCode::OK));
        let response = SimplesCookieManager::new("comparethemarket.com.au")
            .run(&mut ctx)
            .await
            .unwrap()
            .unwrap();
        response.set_cookies().map(str::to_string).collect()
    }

    #[tokio::test]
    async fn login_sets_the_cookie() {
        assert_eq!(
            cookies_for("https://www.comparethemarket.com.au/ctm/simples/home.jsp").await,
            vec!["isSimplesUser=true; path=/; Secure; SameSite=Strict; HttpOnly; Domain=.comparethemarket.com.au;"]
        );
    }

    #[tokio::test]
    async fn logout_expires_the_cookie() {
        assert_eq!(
            cookies_for("https://www.comparethemarket.com.au/ctm/security/simples_logout.jsp").await,
            vec!["isSimplesUser=; path=/; Secure; SameSite=Strict; expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Domain=.comparethemarket.com.au;"]
        );
    }

    #[tokio::test]
    async fn other_pages_set_nothing() {
        assert!(cookies_for("https://www.comparethemarket.com.au/ctm/simples/other.jsp").await.is_empty());
    }
}
