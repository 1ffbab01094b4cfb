//! Feature-branch handling for the dev environment.
//!
//! A feature branch runs on its own `cf-feat-<n>` subdomain. Requests that
//! reach the dev router from a feature branch page (by cookie or `Origin`)
//! are sent back to the feature host, except for the few endpoints that must
//! keep the client's own credentials; those pass through with every
//! middleware disabled.

use std::sync::LazyLock;

use axum::http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, AUTHORIZATION, LOCATION, ORIGIN, SET_COOKIE,
};
use axum::http::{Method, StatusCode};
use regex::Regex;
use serde::Deserialize;

use crate::config::{RouterConfig, Stage};
use crate::http::{EdgeRequest, EdgeResponse, Fetch};
use crate::pipeline::{Outcome, PipelineError, Registrations};

pub const FEATURE_BRANCH_TAG: &str = "cf-feat-";
pub const FEATURE_COOKIE_NAME: &str = "cf-feature-tag";

const SECURED_ROUTES: &[&str] = &["/api/car-journey/", "/api/homecontents-journey/"];
const HANDOVER_ROUTES: &[&str] = &[
    "/api/car-journey/journey/load",
    "/api/homecontents-journey/journey/load",
];
const JOURNEY_CREATE_ROUTES: &[&str] = &[
    "/api/car-journey/journey/new/ctm",
    "/api/homecontents-journey/journey/new/ctm",
];
const AUTH_CALLBACK: &str = "/login/callback";
const ENERGY_ACTIVITY: &str = "/api/energy-journey/journey/activity";
const PET_HANDOVER: &str = "/api/pet/quote/handover";

/// Feature-branch facts determined once per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureBranchSettings {
    pub is_feature_subdomain: bool,
    pub feature_tag: String,
    pub is_redirect_allowed: bool,
    pub has_feature_cookie: bool,
    pub is_feature_origin: bool,
}

impl FeatureBranchSettings {
    /// Read the settings off an inbound request.
    pub fn detect(request: &EdgeRequest, stage: Stage) -> Self {
        let is_feature_subdomain = request.hostname().contains(FEATURE_BRANCH_TAG);

        let mut feature_tag = if is_feature_subdomain {
            find_tag(request.hostname()).unwrap_or_default()
        } else {
            String::new()
        };

        let cookie_tag = request.cookie(FEATURE_COOKIE_NAME);
        let has_feature_cookie = cookie_tag
            .as_deref()
            .is_some_and(|tag| tag.contains(FEATURE_BRANCH_TAG));
        if has_feature_cookie && feature_tag.is_empty() {
            feature_tag = cookie_tag.unwrap_or_default();
        }

        let origin = request.header(ORIGIN.as_str()).unwrap_or_default();
        let is_feature_origin = origin.contains(FEATURE_BRANCH_TAG);
        if is_feature_origin && feature_tag.is_empty() {
            feature_tag = find_tag(origin).unwrap_or_default();
        }

        let is_options = request.method() == Method::OPTIONS;
        let is_redirect_allowed = stage == Stage::Dev
            && !(is_feature_subdomain || is_options)
            && path_allows_redirect(request.path());

        Self {
            is_feature_subdomain,
            feature_tag,
            is_redirect_allowed,
            has_feature_cookie,
            is_feature_origin,
        }
    }

    /// Request came from a feature branch page but hit the dev host directly.
    fn bypassed_feature_worker(&self) -> bool {
        !self.is_feature_subdomain && (self.has_feature_cookie || self.is_feature_origin)
    }
}

static FEATURE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"cf-feat-\d+\b").expect("feature tag regex should be valid"));

/// First `cf-feat-<digits>` token that ends at a word boundary.
fn find_tag(text: &str) -> Option<String> {
    FEATURE_TAG.find(text).map(|m| m.as_str().to_string())
}

fn path_allows_redirect(path: &str) -> bool {
    let excluded = path.contains(AUTH_CALLBACK)
        || JOURNEY_CREATE_ROUTES.iter().any(|r| path.contains(r))
        || HANDOVER_ROUTES.iter().any(|r| path.contains(r))
        || path.contains(ENERGY_ACTIVITY)
        || path.contains(PET_HANDOVER);
    !excluded
}

#[derive(Debug, Deserialize)]
struct AnonymousToken {
    access_token: String,
}

/// Redirect bypassing requests back to the feature host, and give feature
/// requests to secured journey APIs an anonymous bearer token.
pub async fn handle_feature_branch_request(
    request: EdgeRequest,
    config: &RouterConfig,
    fetcher: &dyn Fetch,
) -> Result<(FeatureBranchSettings, Outcome), PipelineError> {
    let stage = config.environment.stage;
    let settings = FeatureBranchSettings::detect(&request, stage);

    if stage != Stage::Dev {
        return Ok((settings, Outcome::Continue(request)));
    }

    if settings.bypassed_feature_worker() && settings.is_redirect_allowed {
        let response = redirect_to_feature_host(&request, &settings, config)?;
        return Ok((settings, Outcome::ShortCircuit(response)));
    }

    if settings.is_feature_subdomain
        && request.method() != Method::OPTIONS
        && SECURED_ROUTES.iter().any(|r| request.path().contains(r))
    {
        let token = fetch_anonymous_token(config, fetcher).await?;
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| PipelineError::invalid_header(AUTHORIZATION.as_str(), e))?;
        tracing::info!(path = %request.path(), "Added auth header to secured journey endpoint");
        return Ok((settings, Outcome::Continue(request.with_appended_header(AUTHORIZATION, value))));
    }

    Ok((settings, Outcome::Continue(request)))
}

fn redirect_to_feature_host(
    request: &EdgeRequest,
    settings: &FeatureBranchSettings,
    config: &RouterConfig,
) -> Result<EdgeResponse, PipelineError> {
    let local = &config.local;
    let host = if request.host().contains(".secure") {
        let tag = if settings.feature_tag.is_empty() { "nxi" } else { &settings.feature_tag };
        format!("{tag}.{}", local.secure_dev_domain)
    } else if settings.feature_tag.is_empty() {
        local.dev_host.clone()
    } else {
        format!("{}.{}", settings.feature_tag, local.dev_host)
    };

    let mut url = request.url().clone();
    url.set_host(Some(&host))?;
    tracing::info!(location = %url, "Feature branch request bypassed the feature worker, redirecting");

    let location = HeaderValue::from_str(url.as_str())
        .map_err(|e| PipelineError::invalid_header(LOCATION.as_str(), e))?;
    Ok(EdgeResponse::new(StatusCode::TEMPORARY_REDIRECT)
        .with_header(LOCATION, location)
        .with_header(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true")))
}

async fn fetch_anonymous_token(config: &RouterConfig, fetcher: &dyn Fetch) -> Result<String, PipelineError> {
    let url = format!("https://{}/api/account/token/anonymous/ctm", config.local.dev_host);
    let response = fetcher.fetch(EdgeRequest::get(&url)?).await?;
    let token: AnonymousToken =
        serde_json::from_slice(response.body()).map_err(|e| PipelineError::Middleware {
            name: "featureBranchAuth".to_string(),
            message: e.to_string(),
        })?;
    Ok(token.access_token)
}

/// Drop all middleware for feature-branch requests that must not be redirected.
pub fn validate_feature_branch_middleware(
    settings: &FeatureBranchSettings,
    stage: Stage,
    registrations: &mut Registrations,
) {
    if stage == Stage::Dev && settings.bypassed_feature_worker() && !settings.is_redirect_allowed {
        tracing::info!("Disabling all middleware for request from feature branch");
        registrations.disable_all();
    }
}

/// Post-process responses served on a feature subdomain.
pub fn handle_feature_branch_response(
    settings: &FeatureBranchSettings,
    config: &RouterConfig,
    response: EdgeResponse,
    method: &Method,
) -> Result<EdgeResponse, PipelineError> {
    if config.environment.stage != Stage::Dev || !settings.is_feature_subdomain {
        return Ok(response);
    }

    let mut response = response;
    if !settings.has_feature_cookie {
        let cookie = format!(
            "{FEATURE_COOKIE_NAME}={}; Domain={}; Path=/; Secure; SameSite=None;",
            settings.feature_tag, config.sites.root_domain
        );
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| PipelineError::invalid_header(SET_COOKIE.as_str(), e))?;
        response = response.with_appended_header(SET_COOKIE, value);
    }

    let status = response.status();
    if (status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND) && method != Method::GET {
        tracing::info!(from = %status, "Feature branch redirect switched to 308");
        response = response.with_status(StatusCode::PERMANENT_REDIRECT);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;
    use futures_util::future::BoxFuture;
    use std::sync::Mutex;

    use crate::http::FetchError;
    use crate::pipeline::Finalizer;

    fn dev_config() -> RouterConfig {
        let mut config = RouterConfig::default();
        config.environment.stage = Stage::Dev;
        config
    }

    fn request(url: &str) -> EdgeRequest {
        EdgeRequest::get(url).unwrap()
    }

    #[derive(Default)]
    struct TokenOrigin {
        seen: Mutex<Vec<String>>,
    }

    impl Fetch for TokenOrigin {
        fn fetch<'a>(&'a self, request: EdgeRequest) -> BoxFuture<'a, Result<EdgeResponse, FetchError>> {
            self.seen.lock().unwrap().push(request.url().to_string());
            Box::pin(async { Ok(EdgeResponse::new(StatusCode::OK).with_body(r#"{"access_token":"abc"}"#)) })
        }
    }

    #[test]
    fn tag_detected_from_subdomain_then_cookie_then_origin() {
        let sub = FeatureBranchSettings::detect(
            &request("https://cf-feat-12.dev.comparethemarket.com.au/car"),
            Stage::Dev,
        );
        assert!(sub.is_feature_subdomain);
        assert_eq!(sub.feature_tag, "cf-feat-12");
        assert!(!sub.is_redirect_allowed);

        let cookie = FeatureBranchSettings::detect(
            &request("https://dev.comparethemarket.com.au/car").with_header(
                COOKIE,
                HeaderValue::from_static("cf-feature-tag=cf-feat-7"),
            ),
            Stage::Dev,
        );
        assert!(cookie.has_feature_cookie);
        assert_eq!(cookie.feature_tag, "cf-feat-7");
        assert!(cookie.is_redirect_allowed);

        let origin = FeatureBranchSettings::detect(
            &request("https://dev.comparethemarket.com.au/api/x")
                .with_header(ORIGIN, HeaderValue::from_static("https://cf-feat-3.dev.comparethemarket.com.au")),
            Stage::Dev,
        );
        assert!(origin.is_feature_origin);
        assert_eq!(origin.feature_tag, "cf-feat-3");
    }

    #[test]
    fn tag_needs_digits_and_a_word_boundary() {
        assert_eq!(find_tag("cf-feat-12.dev.x"), Some("cf-feat-12".to_string()));
        assert_eq!(find_tag("cf-feat-x.cf-feat-5"), Some("cf-feat-5".to_string()));
        assert_eq!(find_tag("cf-feat-12abc"), None);
        assert_eq!(find_tag("www.example.com"), None);
    }

    #[test]
    fn handover_paths_are_not_redirected() {
        for path in [
            "/login/callback",
            "/api/car-journey/journey/load",
            "/api/homecontents-journey/journey/new/ctm",
            "/api/energy-journey/journey/activity",
            "/api/pet/quote/handover",
        ] {
            assert!(!path_allows_redirect(path), "{path}");
        }
        assert!(path_allows_redirect("/car-insurance/journey/start"));
    }

    #[tokio::test]
    async fn bypassing_request_is_redirected_with_credentials_header() {
        let incoming = request("https://dev.comparethemarket.com.au/car-insurance?x=1")
            .with_header(COOKIE, HeaderValue::from_static("cf-feature-tag=cf-feat-9"));

        let (_, outcome) = handle_feature_branch_request(incoming, &dev_config(), &TokenOrigin::default())
            .await
            .unwrap();

        match outcome {
            Outcome::ShortCircuit(response) => {
                assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
                assert_eq!(
                    response.header("location"),
                    Some("https://cf-feat-9.dev.comparethemarket.com.au/car-insurance?x=1")
                );
                assert_eq!(response.header("access-control-allow-credentials"), Some("true"));
            }
            Outcome::Continue(_) => panic!("expected redirect"),
        }
    }

    #[tokio::test]
    async fn secure_hosts_redirect_to_the_secure_domain() {
        let incoming = request("https://nxi.secure.dev.comparethemarket.com.au/ctm/x.jsp")
            .with_header(COOKIE, HeaderValue::from_static("cf-feature-tag=cf-feat-9"));

        let (_, outcome) = handle_feature_branch_request(incoming, &dev_config(), &TokenOrigin::default())
            .await
            .unwrap();

        let Outcome::ShortCircuit(response) = outcome else { panic!("expected redirect") };
        assert_eq!(
            response.header("location"),
            Some("https://cf-feat-9.secure.dev.comparethemarket.com.au/ctm/x.jsp")
        );
    }

    #[tokio::test]
    async fn secured_routes_on_feature_subdomain_get_a_bearer_token() {
        let origin = TokenOrigin::default();
        let incoming = request("https://cf-feat-2.dev.comparethemarket.com.au/api/car-journey/journey/result");

        let (_, outcome) = handle_feature_branch_request(incoming, &dev_config(), &origin).await.unwrap();

        let Outcome::Continue(request) = outcome else { panic!("expected continue") };
        assert_eq!(request.header("authorization"), Some("Bearer abc"));
        assert_eq!(
            origin.seen.lock().unwrap().as_slice(),
            ["https://dev.comparethemarket.com.au/api/account/token/anonymous/ctm"]
        );
    }

    #[tokio::test]
    async fn production_ignores_feature_markers() {
        let incoming = request("https://www.comparethemarket.com.au/car")
            .with_header(COOKIE, HeaderValue::from_static("cf-feature-tag=cf-feat-9"));

        let (_, outcome) = handle_feature_branch_request(incoming, &RouterConfig::default(), &TokenOrigin::default())
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Continue(_)));
    }

    #[test]
    fn non_redirectable_feature_requests_disable_all_middleware() {
        let settings = FeatureBranchSettings::detect(
            &request("https://dev.comparethemarket.com.au/api/pet/quote/handover")
                .with_header(COOKIE, HeaderValue::from_static("cf-feature-tag=cf-feat-1")),
            Stage::Dev,
        );
        let mut registrations = Registrations::new(vec![crate::pipeline::Registration::global(vec![])], vec![]);

        validate_feature_branch_middleware(&settings, Stage::Dev, &mut registrations);

        assert!(registrations.request().is_empty());
        assert_eq!(registrations.finalizer(), &Finalizer::Passthrough);
    }

    #[test]
    fn feature_response_sets_cookie_and_upgrades_redirects() {
        let settings = FeatureBranchSettings::detect(
            &request("https://cf-feat-4.dev.comparethemarket.com.au/"),
            Stage::Dev,
        );
        let response = EdgeResponse::new(StatusCode::FOUND);

        let out = handle_feature_branch_response(&settings, &dev_config(), response, &Method::POST).unwrap();

        assert_eq!(out.status(), StatusCode::PERMANENT_REDIRECT);
        assert_eq!(
            out.set_cookies().collect::<Vec<_>>(),
            vec!["cf-feature-tag=cf-feat-4; Domain=comparethemarket.com.au; Path=/; Secure; SameSite=None;"]
        );

        let get = handle_feature_branch_response(&settings, &dev_config(), EdgeResponse::new(StatusCode::FOUND), &Method::GET)
            .unwrap();
        assert_eq!(get.status(), StatusCode::FOUND);
    }
}
