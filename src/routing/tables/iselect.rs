//! iSelect.

use crate::environment::stage_page_prefix;
use crate::html::InjectLocation;
use crate::middlewares::scripts::chat;
use crate::middlewares::scripts::gtm::keys;
use crate::middlewares::Catalog;
use crate::pipeline::{Registration, RegistryError, RequestRegistration, ResponseRegistration};
use crate::routing::tables::{
    branding_route, maintenance_route, page_routes, remove_cf_auth, static_assets_route, ANON_ID_COOKIE,
};

const QUOTE_RESULT_ROUTES: [&str; 2] = [
    "/api/car-journey/journey/result",
    "/api/homecontents-journey/journey/result",
];

const CHALLENGE_ROUTES: [&str; 2] = [
    "/car-insurance/journey/prefill_check*",
    "/home-contents-insurance/journey/prefill_check*",
];

pub fn request(catalog: &Catalog) -> Result<Vec<RequestRegistration>, RegistryError> {
    let config = catalog.config();
    let stage_prefix = stage_page_prefix(config);
    // Quote results are verified against the CTM host, which serves the journey APIs.
    let verify_host = config.sites.ctm_hostname.as_str();

    let mut table = vec![
        branding_route(catalog, stage_prefix)?,
        maintenance_route(catalog, stage_prefix, "iselect/iselect")?,
        static_assets_route(catalog, stage_prefix)?,
        Registration::path("/metrics*", vec![catalog.retrieve_gtm_container()])?,
        Registration::path("/chat*", vec![catalog.retrieve_chat_container()])?,
    ];
    for route in QUOTE_RESULT_ROUTES {
        table.push(Registration::path(route, vec![catalog.arkose_verify(verify_host)])?);
    }
    table.push(Registration::global(vec![catalog.add_traffic_headers()]));
    Ok(table)
}

pub fn response(catalog: &Catalog) -> Result<Vec<ResponseRegistration>, RegistryError> {
    let iselect_host = catalog.config().sites.iselect_hostname.as_str();

    let mut table = Vec::new();
    for prefix in [page_routes::BRANDING, page_routes::STATIC_ASSETS, page_routes::MAINTENANCE] {
        table.push(remove_cf_auth(catalog, prefix)?);
    }
    for route in CHALLENGE_ROUTES {
        table.push(Registration::path(route, vec![catalog.threat_assessment_injector(iselect_host)])?);
    }
    table.push(Registration::path(
        "/car-insurance/journey/*",
        vec![catalog.inject_chat_script(InjectLocation::HeadEnd, chat::ISELECT_CAR, iselect_host)],
    )?);
    table.push(Registration::global(vec![
        catalog.white_label_script(),
        catalog.cookie_jar(ANON_ID_COOKIE, iselect_host),
        catalog.inject_core_martech_scripts(InjectLocation::HeadEnd, ANON_ID_COOKIE),
        catalog.inject_gtm_script(InjectLocation::HeadEnd, keys::ISELECT, iselect_host),
    ]));
    Ok(table)
}
