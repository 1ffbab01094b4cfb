//! Client-side threat assessment challenge.
//!
//! Injected on journey entry pages. The challenge token it mints is checked
//! server-side by [`ArkoseVerify`](crate::middlewares::arkose::ArkoseVerify)
//! on the matching result call.

use futures_util::future::BoxFuture;

use crate::config::ArkoseConfig;
use crate::html::{self, InjectLocation, Script};
use crate::http::EdgeResponse;
use crate::middlewares::arkose::ENCRYPT_PATH;
use crate::pipeline::{PipelineError, ResponseContext, ResponseStep};

const DETECT_BODY: &str = include_str!("js/arkose_detect.js");

const WRAPPER_START: &str = "<div style=\"display: none; visibility: hidden;\">\n \
<script data-cfasync=\"false\" type=\"text/javascript\" src=\"$ARKOSE_JS_ENDPOINT\" data-callback=\"setupArkoseDetect\" async defer></script>\n \
<script data-cfasync=\"false\">\n function $ARKOSE_SETUP_FUNC {";
const WRAPPER_END: &str = "}\n </script>\n <div id=\"arkose-detect\" style=\"display: none\"/>\n</div>";

const RESULT_MARKER: &str = "result";
const RAY_HEADER: &str = "cf-ray";

/// Injects the challenge at body end, except on result pages.
#[derive(Debug, Clone)]
pub struct ThreatAssessmentInjector {
    hostname: String,
    arkose: ArkoseConfig,
}

impl ThreatAssessmentInjector {
    pub fn new(hostname: impl Into<String>, arkose: ArkoseConfig) -> Self {
        Self {
            hostname: hostname.into(),
            arkose,
        }
    }

    pub fn snippet(&self, ray_id: &str) -> String {
        Script::template(format!("{WRAPPER_START}{DETECT_BODY}{WRAPPER_END}"))
            .param("RAY_ID", ray_id)
            .param("THREAT_ENCRYPT_ENDPOINT", format!("https://{}/{ENCRYPT_PATH}", self.hostname))
            .param("TRACKING_DATA_RETRY", self.arkose.tracking_data_retry)
            .param("ARKOSE_SESSION_TOKEN_EXPIRY_HRS", self.arkose.session_token_expiry_hrs)
            .param("ARKOSE_JS_ENDPOINT", &self.arkose.js_endpoint)
            .param("ARKOSE_SETUP_FUNC", "setupArkoseDetect(arkoseDetect)")
            .param("ARKOSE_DETECT_PROP", "arkoseDetect")
            .render()
    }
}

impl ResponseStep for ThreatAssessmentInjector {
    fn run<'a>(
        &'a self,
        ctx: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<Option<EdgeResponse>, PipelineError>> {
        Box::pin(async move {
            if ctx.original_request().url().as_str().contains(RESULT_MARKER) {
                return Ok(None);
            }
            let snippet = self.snippet(ctx.request().header(RAY_HEADER).unwrap_or_default());
            Ok(html::inject_into_html(ctx.response(), &snippet, InjectLocation::BodyEnd)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::EdgeRequest;
    use crate::pipeline::{ContextConfig, RequestContext};
    use axum::http::header::{HeaderName, HeaderValue};

    fn injector() -> ThreatAssessmentInjector {
        ThreatAssessmentInjector::new("www.comparethemarket.com.au", ArkoseConfig::default())
    }

    #[test]
    fn every_placeholder_is_filled() {
        let snippet = injector().snippet("8a1b2c3d4e5f-SYD");
        assert!(!snippet.contains('$'));
        assert!(snippet.contains("const RAY_ID = \"8a1b2c3d4e5f-SYD\";"));
        assert!(snippet.contains("\"https://www.comparethemarket.com.au/api/verify/encrypt/v1\""));
        assert!(snippet.contains("const TRACKING_DATA_RETRY = 10;"));
        assert!(snippet.contains("function setupArkoseDetect(arkoseDetect) {"));
        assert!(snippet.contains("const ARKOSE_DETECT_PROP = arkoseDetect;"));
    }

    #[tokio::test]
    async fn injects_at_body_end_with_the_ray_id() {
        let request = EdgeRequest::get("https://www.comparethemarket.com.au/car-insurance/journey/prefill_check")
            .unwrap()
            .with_header(HeaderName::from_static("cf-ray"), HeaderValue::from_static("ray-1"));
        let ctx = RequestContext::new(request, ContextConfig::Empty);
        let mut ctx = ctx.into_response_context(EdgeResponse::html("<html><body><main></main></body></html>"));

        let out = injector().run(&mut ctx).await.unwrap().unwrap();
        let body = String::from_utf8_lossy(out.body()).into_owned();
        assert!(body.contains("const RAY_ID = \"ray-1\";"));
        assert!(body.find("</main>").unwrap() < body.find("arkose-detect").unwrap());
    }

    #[tokio::test]
    async fn result_pages_are_skipped() {
        let request = EdgeRequest::get("https://www.comparethemarket.com.au/energy/compare/result").unwrap();
        let ctx = RequestContext::new(request, ContextConfig::Empty);
        let mut ctx = ctx.into_response_context(EdgeResponse::html("<html><body></body></html>"));
        assert!(injector().run(&mut ctx).await.unwrap().is_none());
    }
}
