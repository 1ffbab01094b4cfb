//! Choosi.

use crate::environment::stage_page_prefix;
use crate::html::InjectLocation;
use crate::middlewares::scripts::gtm::keys;
use crate::middlewares::Catalog;
use crate::pipeline::{Registration, RegistryError, RequestRegistration, ResponseRegistration};
use crate::routing::tables::{branding_route, maintenance_route, page_routes, remove_cf_auth, ANON_ID_COOKIE};

pub fn request(catalog: &Catalog) -> Result<Vec<RequestRegistration>, RegistryError> {
    let stage_prefix = stage_page_prefix(catalog.config());
    Ok(vec![
        branding_route(catalog, stage_prefix)?,
        maintenance_route(catalog, stage_prefix, "choosi/choosi")?,
        Registration::path("/metrics*", vec![catalog.retrieve_gtm_container()])?,
        Registration::global(vec![catalog.add_traffic_headers()]),
    ])
}

pub fn response(catalog: &Catalog) -> Result<Vec<ResponseRegistration>, RegistryError> {
    let choosi_host = catalog.config().sites.choosi_hostname.as_str();
    Ok(vec![
        remove_cf_auth(catalog, page_routes::BRANDING)?,
        remove_cf_auth(catalog, page_routes::MAINTENANCE)?,
        Registration::global(vec![
            catalog.choosi_script(),
            catalog.cookie_jar(ANON_ID_COOKIE, choosi_host),
            catalog.inject_core_martech_scripts(InjectLocation::HeadEnd, ANON_ID_COOKIE),
            catalog.inject_gtm_script(InjectLocation::HeadEnd, keys::CHOOSI, choosi_host),
        ]),
    ])
}

#[cfg(test)]
mod tests {
    use super::super::tests::{catalog, request_names, response_names};
    use crate::pipeline::Registrations;

    #[test]
    fn choosi_tables() {
        let catalog = catalog();
        let regs = Registrations::new(super::request(&catalog).unwrap(), super::response(&catalog).unwrap());

        assert_eq!(
            request_names(&regs, "/temporary-outage/"),
            vec!["embedCFAccessHeaders", "router for /temporary-outage/", "addTrafficHeaders"]
        );
        assert_eq!(request_names(&regs, "/chat"), vec!["addTrafficHeaders"]);
        assert_eq!(
            response_names(&regs, "/"),
            vec!["choosiDomainScript", "cookieJar", "injectCoreMartechScripts", "injectGtmScript"]
        );
    }
}
