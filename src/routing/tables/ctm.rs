//! Compare the Market, the default site.

use crate::environment::{default_page_prefix, pet_page_prefix, stage_page_prefix};
use crate::html::InjectLocation;
use crate::middlewares::page_router::PageRouteSettings;
use crate::middlewares::scripts::chat;
use crate::middlewares::scripts::gtm::keys;
use crate::middlewares::Catalog;
use crate::pipeline::{Registration, RegistryError, RequestRegistration, ResponseRegistration};
use crate::routing::tables::{
    branding_route, maintenance_route, page_route, page_routes, remove_cf_auth, static_assets_route, under,
    ANON_ID_COOKIE,
};

const COOKIE_MONSTER_ROUTES: [&str; 3] = ["/api/address/*", "/api/homecontents-journey/*", "/api/car-journey/*"];

const QUOTE_RESULT_ROUTES: [&str; 6] = [
    "/api/car-journey/journey/result",
    "/api/homecontents-journey/journey/result",
    "/api/energy-journey/journey/result",
    "/api/travel-micro-ui/productsFetch",
    "/api/pet/quote/",
    "/ctm/ajax/json/health_quote_results_ws.jsp",
];

/// Legacy web application routes that need a brand code.
const LEGACY_WEB_ROUTES: [&str; 6] = [
    "/ctm/*",
    "/ctm-leads-genesys/*",
    "/emails/*",
    "/health-quote-v2/*",
    "/reward/*",
    "/static/*",
];

const HOMELOAN_CALCULATOR_ROUTES: [&str; 2] = ["/Tools/B3/*", "/AbacusServer/*"];

/// Journey entry pages that carry the threat assessment challenge.
const CHALLENGE_ROUTES: [&str; 7] = [
    "/car-insurance/journey/prefill_check*",
    "/home-contents-insurance/journey/start*",
    "/home-contents-insurance/journey/prefill_check*",
    "/energy/compare*",
    "/travel/compare*",
    "/pet/compare*",
    "/ctm/health_quote*",
];

pub fn request(catalog: &Catalog) -> Result<Vec<RequestRegistration>, RegistryError> {
    let config = catalog.config();
    let default_prefix = default_page_prefix(config);
    let pet_prefix = pet_page_prefix(config);
    let stage_prefix = stage_page_prefix(config);
    let ctm_host = config.sites.ctm_hostname.as_str();

    let mut table = vec![
        page_route(
            catalog,
            page_routes::AUTH0,
            PageRouteSettings::new(
                page_routes::AUTH0,
                format!("{default_prefix}ctm-customer-accounts-auth0-ui.pages.dev"),
            ),
        )?,
        page_route(
            catalog,
            page_routes::PET,
            PageRouteSettings::new(page_routes::PET, format!("{pet_prefix}ctmpet.pages.dev")),
        )?,
        page_route(
            catalog,
            page_routes::LEGAL,
            PageRouteSettings::new(
                page_routes::LEGAL,
                format!("{stage_prefix}ctm-cf-page-enterprise-legal.pages.dev"),
            ),
        )?,
        page_route(
            catalog,
            page_routes::ACCOUNT,
            PageRouteSettings::new(
                page_routes::ACCOUNT,
                format!("{default_prefix}ctm-customer-accounts-react-ui.pages.dev"),
            )
            .keep_sub_route(),
        )?,
        branding_route(catalog, stage_prefix)?,
        static_assets_route(catalog, stage_prefix)?,
        maintenance_route(catalog, stage_prefix, "ctm/ctm")?,
    ];

    for route in COOKIE_MONSTER_ROUTES {
        table.push(Registration::path(route, vec![catalog.monster_cookie_request_fix()])?);
    }
    for route in QUOTE_RESULT_ROUTES {
        table.push(Registration::path(route, vec![catalog.arkose_verify(ctm_host)])?);
    }
    for route in LEGACY_WEB_ROUTES {
        table.push(Registration::path(route, vec![catalog.add_brand_code()])?);
    }
    for route in HOMELOAN_CALCULATOR_ROUTES {
        table.push(Registration::path(route, vec![catalog.homeloan_calculator_redirect()])?);
    }
    table.push(Registration::path("/metrics*", vec![catalog.retrieve_gtm_container()])?);
    table.push(Registration::path("/chat*", vec![catalog.retrieve_chat_container()])?);

    table.push(Registration::global(vec![
        catalog.add_traffic_headers(),
        catalog.uk_redirecter(),
    ]));
    Ok(table)
}

pub fn response(catalog: &Catalog) -> Result<Vec<ResponseRegistration>, RegistryError> {
    let ctm_host = catalog.config().sites.ctm_hostname.as_str();
    let journey_gtm = || catalog.inject_gtm_script(InjectLocation::HeadEnd, keys::CTM_JOURNEY, ctm_host);

    // Access pages break under the global middleware.
    let mut table = vec![
        Registration::path("/sergei-access/*", vec![])?.early_return(),
        Registration::path("/wp-admin/*", vec![])?.early_return(),
    ];

    for route in COOKIE_MONSTER_ROUTES {
        table.push(Registration::path(route, vec![catalog.monster_cookie_response_fix()])?);
    }

    for prefix in [page_routes::AUTH0, page_routes::PET] {
        table.push(Registration::path(
            &under(prefix),
            vec![catalog.base_tag_rewrite(prefix), catalog.remove_cf_auth_cookie()],
        )?);
    }
    for prefix in [
        page_routes::LEGAL,
        page_routes::BRANDING,
        page_routes::ACCOUNT,
        page_routes::STATIC_ASSETS,
        page_routes::MAINTENANCE,
    ] {
        table.push(remove_cf_auth(catalog, prefix)?);
    }

    for route in CHALLENGE_ROUTES {
        table.push(Registration::path(route, vec![catalog.threat_assessment_injector(ctm_host)])?);
    }

    table.extend([
        Registration::path(
            "/car-insurance/journey*",
            vec![
                catalog.inject_optimizely(),
                journey_gtm(),
                catalog.inject_chat_script(InjectLocation::HeadEnd, chat::CTM_CAR, ctm_host),
            ],
        )?,
        Registration::path(
            "/home-contents-insurance/journey*",
            vec![catalog.inject_optimizely(), journey_gtm()],
        )?,
        Registration::path("/ctm/health_quote_v4*", vec![catalog.inject_optimizely()])?,
        Registration::path("/ctm/health_confirmation_*", vec![catalog.inject_optimizely()])?,
        Registration::path("/AbacusServer/JS/AbacusJS/AbacusJS_B3*", vec![catalog.content_type_fix()])?,
        Registration::path("/international-money-transfers/journey*", vec![journey_gtm()])?,
        Registration::path("/ctm/simples/home*", vec![catalog.simples_cookie_manager()])?,
        Registration::path("/ctm/security/simples_logout*", vec![catalog.simples_cookie_manager()])?,
        Registration::path(&under(page_routes::MAINTENANCE), vec![journey_gtm()])?,
    ]);

    // The cookie jar must run before martech, which reads the cookie it sets.
    table.push(Registration::global(vec![
        catalog.cookie_jar(ANON_ID_COOKIE, ""),
        catalog.inject_core_martech_scripts(InjectLocation::HeadEnd, ANON_ID_COOKIE),
        catalog.body_script(),
        catalog.ga_cookie_fix(),
        catalog.uk_redirect_injector(),
    ]));
    Ok(table)
}
