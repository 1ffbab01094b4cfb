//! Core marketing-technology scripts.
//!
//! The anonymous id the cookie jar just issued is not readable by the page
//! until the next request, so it is templated into the page here.

use futures_util::future::BoxFuture;

use crate::html::{self, InjectLocation, Script};
use crate::http::EdgeResponse;
use crate::pipeline::{PipelineError, ResponseContext, ResponseStep};

const XHR_HELPERS: &str = include_str!("js/xhr.js");
const GENERATE_GUID: &str = include_str!("js/generate_guid.js");
const SET_COOKIE_VAL: &str = include_str!("js/set_cookie_val.js");
const GET_DOMAIN: &str = include_str!("js/get_domain.js");
const SESSION_SETTERS: &str = include_str!("js/session.js");
const REPORTING_CHANNELS: &str = include_str!("js/reporting.js");
const CORE_FUNCTIONS: &str = include_str!("js/core.js");
const SET_ANON_ID: &str = include_str!("js/set_anon_id.js");

const BASE_SCRIPTS: [&str; 7] = [
    XHR_HELPERS,
    GENERATE_GUID,
    SET_COOKIE_VAL,
    GET_DOMAIN,
    SESSION_SETTERS,
    REPORTING_CHANNELS,
    CORE_FUNCTIONS,
];

/// Position of the anon id setter, ahead of the user/session setters.
const ANON_ID_INDEX: usize = 4;

/// Script list with the anon id setter in place.
pub fn martech_scripts(server_anon_id: &str) -> Vec<String> {
    let mut scripts: Vec<String> = BASE_SCRIPTS.iter().map(|s| s.to_string()).collect();
    let anon = Script::template(SET_ANON_ID)
        .param("SERVER_ANON_ID", server_anon_id)
        .render();
    scripts.insert(ANON_ID_INDEX, anon);
    scripts
}

/// Injects the martech bundle as a single script element.
#[derive(Debug, Clone)]
pub struct InjectCoreMartechScripts {
    location: InjectLocation,
    anon_cookie: String,
}

impl InjectCoreMartechScripts {
    pub fn new(location: InjectLocation, anon_cookie: impl Into<String>) -> Self {
        Self {
            location,
            anon_cookie: anon_cookie.into(),
        }
    }

    /// Anon id from the request cookie, else from a cookie issued on this
    /// response.
    fn server_anon_id(&self, ctx: &ResponseContext) -> String {
        ctx.request()
            .cookie(&self.anon_cookie)
            .or_else(|| ctx.response().set_cookie_value(&self.anon_cookie))
            .unwrap_or_default()
    }
}

impl ResponseStep for InjectCoreMartechScripts {
    fn run<'a>(
        &'a self,
        ctx: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<Option<EdgeResponse>, PipelineError>> {
        Box::pin(async move {
            let scripts = martech_scripts(&self.server_anon_id(ctx));
            Ok(html::inject_scripts(ctx.response(), &scripts, self.location)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::EdgeRequest;
    use crate::pipeline::{ContextConfig, RequestContext};
    use axum::http::header::{HeaderValue, COOKIE, SET_COOKIE};

    const PAGE: &str = "<html><head><title>t</title></head><body></body></html>";

    #[test]
    fn anon_setter_sits_at_its_slot() {
        let scripts = martech_scripts("abc.1");
        assert_eq!(scripts.len(), BASE_SCRIPTS.len() + 1);
        assert!(scripts[ANON_ID_INDEX].contains("const serverAnonId = 'abc.1';"));
        assert!(scripts.last().unwrap().contains("setAnonId();"));
    }

    async fn injected(request: EdgeRequest, response: EdgeResponse) -> String {
        let ctx = RequestContext::new(request, ContextConfig::Empty);
        let mut ctx = ctx.into_response_context(response);
        let out = InjectCoreMartechScripts::new(InjectLocation::HeadEnd, "user_anonymous_id")
            .run(&mut ctx)
            .await
            .unwrap()
            .unwrap();
        String::from_utf8_lossy(out.body()).into_owned()
    }

    #[tokio::test]
    async fn request_cookie_wins() {
        let request = EdgeRequest::get("https://www.comparethemarket.com.au/")
            .unwrap()
            .with_header(COOKIE, HeaderValue::from_static("user_anonymous_id=req-id.5"));
        let response = EdgeResponse::html(PAGE).with_appended_header(
            SET_COOKIE,
            HeaderValue::from_static("user_anonymous_id=resp-id.6; path=/"),
        );
        let body = injected(request, response).await;
        assert!(body.contains("const serverAnonId = 'req-id.5';"));
    }

    #[tokio::test]
    async fn falls_back_to_the_issued_cookie_then_empty() {
        let request = EdgeRequest::get("https://www.comparethemarket.com.au/").unwrap();
        let response = EdgeResponse::html(PAGE).with_appended_header(
            SET_COOKIE,
            HeaderValue::from_static("user_anonymous_id=resp-id.6; path=/"),
        );
        assert!(injected(request.clone(), response)
            .await
            .contains("const serverAnonId = 'resp-id.6';"));

        let body = injected(request, EdgeResponse::html(PAGE)).await;
        assert!(body.contains("const serverAnonId = '';"));
        assert_eq!(body.matches("<script>").count(), 1);
        assert!(body.find("</title>").unwrap() < body.find("<script>").unwrap());
    }
}
