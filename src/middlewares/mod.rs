//! Business-rule middleware.
//!
//! # Data Flow
//! ```text
//! RouterConfig + shared fetcher/cache
//!     → Catalog (named constructors)
//!     → routing::tables (registrations per site)
//!     → pipeline
//! ```
//!
//! Each step lives in its own module; the catalog only binds configuration
//! and gives every instance the name it is logged under.

pub mod arkose;
pub mod brand_code;
pub mod cookie_jar;
pub mod cookie_monster;
pub mod ga_cookie;
pub mod homeloan;
pub mod local;
pub mod page_router;
pub mod redirect_fixer;
pub mod rerouter;
pub mod scripts;
pub mod simples;
pub mod traffic_type;
pub mod uk_redirect;

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::RouterConfig;
use crate::html::InjectLocation;
use crate::http::{EdgeCache, Fetch};
use crate::pipeline::{PipelineError, RequestMiddleware, ResponseMiddleware};

use self::arkose::ArkoseVerify;
use self::cookie_jar::CookieJar;
use self::cookie_monster::MonsterCookieResponseFix;
use self::ga_cookie::GaCookieFix;
use self::local::{DevReroute, LegacyWebReroute};
use self::page_router::{BaseTagRewrite, CfAccessDetails, EmbedCfAccessHeaders, PageRouteSettings, PageRouter};
use self::rerouter::ReRouter;
use self::scripts::chat::{self, ChatContainerIds, InjectChatScript};
use self::scripts::gtm::{self, InjectGtmScript};
use self::scripts::martech::InjectCoreMartechScripts;
use self::scripts::threat::ThreatAssessmentInjector;
use self::scripts::{BrandConsoleScript, DeferredScript};
use self::simples::SimplesCookieManager;

pub const BODY_SCRIPT: &str = "console.log('CF worker router body script')";
pub const WHITE_LABEL_SCRIPT: &str = "console.log('CF worker subdomain script')";
pub const CHOOSI_SCRIPT: &str = "console.log('CF worker choosi script')";

/// Point `url` at `host`, which may carry a port. Any previous port is
/// dropped.
pub(crate) fn rehost(url: &mut Url, host: &str) -> Result<(), PipelineError> {
    let (name, port) = match host.rsplit_once(':') {
        Some((name, port)) => match port.parse::<u16>() {
            Ok(port) => (name, Some(port)),
            Err(_) => (host, None),
        },
        None => (host, None),
    };
    url.set_host(Some(name))?;
    url.set_port(port).map_err(|()| PipelineError::Middleware {
        name: "rehost".to_string(),
        message: format!("cannot set port on {url}"),
    })
}

/// Builds configured middleware instances.
#[derive(Clone)]
pub struct Catalog {
    config: Arc<RouterConfig>,
    fetcher: Arc<dyn Fetch>,
    cache: EdgeCache,
}

impl Catalog {
    pub fn new(config: Arc<RouterConfig>, fetcher: Arc<dyn Fetch>, cache: EdgeCache) -> Self {
        Self { config, fetcher, cache }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    fn cf_access(&self) -> Option<CfAccessDetails> {
        CfAccessDetails::from_config(&self.config.credentials)
    }

    fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeouts.upstream_secs)
    }

    // Request phase

    pub fn embed_cf_access_headers(&self) -> RequestMiddleware {
        RequestMiddleware::new("embedCFAccessHeaders", EmbedCfAccessHeaders::new(self.cf_access()))
    }

    pub fn router(&self, settings: PageRouteSettings) -> RequestMiddleware {
        let name = format!("router for {}", settings.route_prefix);
        RequestMiddleware::new(name, PageRouter::new(settings))
    }

    pub fn rerouter(&self, prefix: &str) -> RequestMiddleware {
        RequestMiddleware::new(format!("rerouter for {prefix}"), ReRouter::new(prefix))
    }

    pub fn test_page(&self) -> RequestMiddleware {
        RequestMiddleware::from_fn("testPageInjector", local::test_page)
    }

    pub fn add_brand_code(&self) -> RequestMiddleware {
        RequestMiddleware::from_fn("addBrandCode", brand_code::add_brand_code)
    }

    pub fn arkose_verify(&self, hostname: &str) -> RequestMiddleware {
        let step = ArkoseVerify::new(
            hostname,
            Duration::from_secs(self.config.arkose.verify_timeout_secs),
            self.cf_access(),
            self.fetcher.clone(),
        );
        RequestMiddleware::new("arkoseVerify", step)
    }

    pub fn monster_cookie_request_fix(&self) -> RequestMiddleware {
        RequestMiddleware::from_fn("monsterCookieRequestFix", cookie_monster::monster_cookie_request_fix)
    }

    pub fn homeloan_calculator_redirect(&self) -> RequestMiddleware {
        RequestMiddleware::from_fn("hLCalculatorRedirect", homeloan::homeloan_calculator_redirect)
    }

    pub fn add_traffic_headers(&self) -> RequestMiddleware {
        RequestMiddleware::from_fn("addTrafficHeaders", traffic_type::add_traffic_headers)
    }

    pub fn retrieve_gtm_container(&self) -> RequestMiddleware {
        RequestMiddleware::new(
            "retrieveGtmContainer",
            gtm::retrieve_gtm_container(self.cache.clone(), self.upstream_timeout()),
        )
    }

    pub fn retrieve_chat_container(&self) -> RequestMiddleware {
        RequestMiddleware::new(
            "retrieveChatContainer",
            chat::retrieve_chat_container(self.cache.clone(), self.upstream_timeout()),
        )
    }

    pub fn uk_redirecter(&self) -> RequestMiddleware {
        RequestMiddleware::from_fn("ukRedirecter", uk_redirect::uk_redirecter)
    }

    pub fn dev_reroute(&self) -> RequestMiddleware {
        RequestMiddleware::new("devReroute", DevReroute::new(self.config.local.dev_host.as_str()))
    }

    pub fn legacy_web_reroute(&self) -> RequestMiddleware {
        RequestMiddleware::new(
            "legacyWebReroute",
            LegacyWebReroute::new(&self.config.local.secure_dev_domain),
        )
    }

    // Response phase

    pub fn body_script(&self) -> ResponseMiddleware {
        ResponseMiddleware::new("bodyScriptAdder", DeferredScript::new(BODY_SCRIPT))
    }

    pub fn white_label_script(&self) -> ResponseMiddleware {
        ResponseMiddleware::new("whiteLabelDomainScript", BrandConsoleScript::new(WHITE_LABEL_SCRIPT))
    }

    pub fn choosi_script(&self) -> ResponseMiddleware {
        ResponseMiddleware::new("choosiDomainScript", BrandConsoleScript::new(CHOOSI_SCRIPT))
    }

    pub fn base_tag_rewrite(&self, route_prefix: &str) -> ResponseMiddleware {
        ResponseMiddleware::new("baseTagRewrite", BaseTagRewrite::new(route_prefix))
    }

    /// Anonymous id cookie pair. An empty `domain` scopes to the root domain.
    pub fn cookie_jar(&self, name: &str, domain: &str) -> ResponseMiddleware {
        let step = CookieJar::new(
            name,
            domain,
            self.config.environment.testing,
            self.config.sites.root_domain.as_str(),
        );
        ResponseMiddleware::new("cookieJar", step)
    }

    pub fn remove_cf_auth_cookie(&self) -> ResponseMiddleware {
        ResponseMiddleware::from_fn("removeCFAuthSet", page_router::remove_cf_auth_cookie)
    }

    pub fn threat_assessment_injector(&self, hostname: &str) -> ResponseMiddleware {
        ResponseMiddleware::new(
            "threatAssessmentInjector",
            ThreatAssessmentInjector::new(hostname, self.config.arkose.clone()),
        )
    }

    pub fn inject_core_martech_scripts(&self, location: InjectLocation, anon_cookie: &str) -> ResponseMiddleware {
        ResponseMiddleware::new(
            "injectCoreMartechScripts",
            InjectCoreMartechScripts::new(location, anon_cookie),
        )
    }

    pub fn inject_optimizely(&self) -> ResponseMiddleware {
        ResponseMiddleware::from_fn("injectOptimizelyScripts", scripts::optimizely::inject_optimizely)
    }

    pub fn redirect_url_fixer(&self) -> ResponseMiddleware {
        ResponseMiddleware::from_fn("redirectUrlFixer", redirect_fixer::redirect_url_fixer)
    }

    pub fn ga_cookie_fix(&self) -> ResponseMiddleware {
        ResponseMiddleware::new("gaCookieFix", GaCookieFix::new(self.config.sites.root_domain.as_str()))
    }

    pub fn monster_cookie_response_fix(&self) -> ResponseMiddleware {
        ResponseMiddleware::new(
            "monsterCookieResponseFix",
            MonsterCookieResponseFix::new(self.config.sites.root_domain.as_str()),
        )
    }

    pub fn content_type_fix(&self) -> ResponseMiddleware {
        ResponseMiddleware::from_fn("hLCalculatorContentTypeFix", homeloan::content_type_fix)
    }

    pub fn inject_gtm_script(&self, location: InjectLocation, key: &str, hostname: &str) -> ResponseMiddleware {
        ResponseMiddleware::new("injectGtmScript", InjectGtmScript::new(location, key, hostname))
    }

    pub fn inject_chat_script(
        &self,
        location: InjectLocation,
        ids: ChatContainerIds,
        hostname: &str,
    ) -> ResponseMiddleware {
        let step = InjectChatScript::new(location, ids, hostname, self.config.environment.stage);
        ResponseMiddleware::new("injectChatScript", step)
    }

    pub fn simples_cookie_manager(&self) -> ResponseMiddleware {
        ResponseMiddleware::new(
            "simplesCookieManager",
            SimplesCookieManager::new(&self.config.sites.root_domain),
        )
    }

    pub fn uk_redirect_injector(&self) -> ResponseMiddleware {
        ResponseMiddleware::from_fn("ukRedirectInjector", uk_redirect::uk_redirect_injector)
    }
}
