//! Registration tables per site.
//!
//! Tables are rebuilt per request from the current config snapshot; each
//! one is a plain list, so a table reads top to bottom in the order its
//! middleware runs.

pub mod choosi;
pub mod ctm;
pub mod iselect;
pub mod local;
pub mod white_label;

use crate::middlewares::page_router::PageRouteSettings;
use crate::middlewares::Catalog;
use crate::pipeline::{
    Finalizer, Registration, RegistryError, Registrations, RequestRegistration, ResponseRegistration,
};
use crate::routing::site::Site;

/// Public prefixes served by Pages projects.
pub mod page_routes {
    pub const PET: &str = "/pet/compare/";
    pub const LEGAL: &str = "/legal/";
    pub const BRANDING: &str = "/api/client/*/brands/";
    pub const BRANDING_PREFIX: &str = "/api/client/";
    pub const ACCOUNT: &str = "/account/";
    pub const AUTH0: &str = "/profile/";
    pub const STATIC_ASSETS: &str = "/static/assets/";
    pub const MAINTENANCE: &str = "/temporary-outage/";
}

pub const ANON_ID_COOKIE: &str = "user_anonymous_id";

pub const BRANDING_HOST: &str = "ctm-cf-page-enterprise-branding.pages.dev";
pub const STATIC_ASSETS_HOST: &str = "ctm-cf-page-enterprise-static-assets.pages.dev";
pub const MAINTENANCE_HOST: &str = "ctm-cf-page-devops-maintenance.pages.dev";

/// `prefix*` pattern.
pub(crate) fn under(prefix: &str) -> String {
    format!("{prefix}*")
}

/// Service token plus page router for a Pages route.
pub(crate) fn page_route(
    catalog: &Catalog,
    pattern_prefix: &str,
    settings: PageRouteSettings,
) -> Result<RequestRegistration, RegistryError> {
    Registration::path(
        &under(pattern_prefix),
        vec![catalog.embed_cf_access_headers(), catalog.router(settings)],
    )
}

pub(crate) fn remove_cf_auth(catalog: &Catalog, pattern_prefix: &str) -> Result<ResponseRegistration, RegistryError> {
    Registration::path(&under(pattern_prefix), vec![catalog.remove_cf_auth_cookie()])
}

/// The shared branding route, forwarded under `/api/client/`.
pub(crate) fn branding_route(catalog: &Catalog, stage_prefix: &str) -> Result<RequestRegistration, RegistryError> {
    page_route(
        catalog,
        page_routes::BRANDING,
        PageRouteSettings::new(page_routes::BRANDING_PREFIX, format!("{stage_prefix}{BRANDING_HOST}")),
    )
}

/// The outage page, always served from one static path per brand.
pub(crate) fn maintenance_route(
    catalog: &Catalog,
    stage_prefix: &str,
    static_path: &str,
) -> Result<RequestRegistration, RegistryError> {
    page_route(
        catalog,
        page_routes::MAINTENANCE,
        PageRouteSettings::new(page_routes::MAINTENANCE, format!("{stage_prefix}{MAINTENANCE_HOST}"))
            .static_path(static_path),
    )
}

pub(crate) fn static_assets_route(catalog: &Catalog, stage_prefix: &str) -> Result<RequestRegistration, RegistryError> {
    page_route(
        catalog,
        page_routes::STATIC_ASSETS,
        PageRouteSettings::new(page_routes::STATIC_ASSETS, format!("{stage_prefix}{STATIC_ASSETS_HOST}")),
    )
}

pub fn request_table(site: Site, catalog: &Catalog) -> Result<Vec<RequestRegistration>, RegistryError> {
    match site.request_site() {
        Site::Iselect => iselect::request(catalog),
        Site::Choosi => choosi::request(catalog),
        _ => ctm::request(catalog),
    }
}

pub fn response_table(site: Site, catalog: &Catalog) -> Result<Vec<ResponseRegistration>, RegistryError> {
    match site {
        Site::Ctm => ctm::response(catalog),
        Site::Iselect => iselect::response(catalog),
        Site::Choosi => choosi::response(catalog),
        Site::Life => white_label::life_response(catalog),
        Site::Business => white_label::business_response(catalog),
    }
}

/// Full, validated registrations for `site`, with the local reroutes
/// in front when `local` is set.
pub fn build(site: Site, catalog: &Catalog, local: bool) -> Result<Registrations, RegistryError> {
    let mut registrations = Registrations::new(request_table(site, catalog)?, response_table(site, catalog)?)
        .with_finalizer(Finalizer::InjectHeaderScripts(
            catalog.config().injection.header_scripts_location,
        ));
    if local {
        registrations.prepend_request(local::preflight(catalog)?);
    }
    registrations.validate()?;
    Ok(registrations)
}
