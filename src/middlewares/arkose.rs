//! Server-side threat verification for quote result calls.
//!
//! The session token minted by the client-side challenge is posted to the
//! threat API before the quote request continues. Verification is advisory:
//! the incoming request is forwarded whatever the outcome.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{HeaderValue, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use futures_util::future::BoxFuture;
use serde::Serialize;
use url::Url;

use crate::http::{EdgeRequest, Fetch, FetchError};
use crate::middlewares::page_router::CfAccessDetails;
use crate::pipeline::{Outcome, PipelineError, RequestContext, RequestStep};
use crate::resilience::fail_open;

pub const VERIFY_PATH: &str = "api/verify/threat/v1";
pub const ENCRYPT_PATH: &str = "api/verify/encrypt/v1";
pub const SESSION_TOKEN_COOKIE: &str = "sessionToken";

#[derive(Debug, Serialize)]
struct VerifyPayload<'a> {
    #[serde(rename = "sessionToken", skip_serializing_if = "Option::is_none")]
    session_token: Option<&'a str>,
}

/// Posts the challenge session token to the threat API.
pub struct ArkoseVerify {
    hostname: String,
    timeout: Duration,
    cf_access: Option<CfAccessDetails>,
    fetcher: Arc<dyn Fetch>,
}

impl ArkoseVerify {
    pub fn new(
        hostname: impl Into<String>,
        timeout: Duration,
        cf_access: Option<CfAccessDetails>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            timeout,
            cf_access,
            fetcher,
        }
    }

    /// The verification request for `incoming`.
    pub fn verify_request(&self, incoming: &EdgeRequest) -> Result<EdgeRequest, PipelineError> {
        let url = Url::parse(&format!("https://{}/{VERIFY_PATH}", self.hostname))?;
        let token = incoming.cookie(SESSION_TOKEN_COOKIE);
        let body = serde_json::to_vec(&VerifyPayload {
            session_token: token.as_deref(),
        })
        .map_err(|e| PipelineError::Middleware {
            name: "arkoseVerify".to_string(),
            message: e.to_string(),
        })?;

        let request = EdgeRequest::from_parts(Method::POST, url, incoming.headers().clone(), body.into())
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match &self.cf_access {
            Some(details) => details.apply(request),
            None => Ok(request),
        }
    }

    async fn verify(&self, request: EdgeRequest) -> Result<(), FetchError> {
        let response = self.fetcher.fetch(request).await?;
        if response.status() != StatusCode::OK {
            return Err(FetchError::Unavailable(format!(
                "verify returned {}: {}",
                response.status(),
                String::from_utf8_lossy(response.body())
            )));
        }
        tracing::info!("Threat verification succeeded");
        Ok(())
    }
}

impl RequestStep for ArkoseVerify {
    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<Outcome, PipelineError>> {
        Box::pin(async move {
            let incoming = ctx.request().clone();
            let verify = self.verify_request(&incoming)?;
            fail_open("threat-verify", self.timeout, self.verify(verify)).await;
            Ok(Outcome::Continue(incoming))
        })
    }
}
