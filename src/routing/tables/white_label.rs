//! Response tables for the white-label subdomains. Their request side is
//! the CTM table.

use crate::html::InjectLocation;
use crate::middlewares::scripts::gtm::keys;
use crate::middlewares::Catalog;
use crate::pipeline::{Registration, RegistryError, ResponseRegistration};
use crate::routing::tables::ANON_ID_COOKIE;

pub fn life_response(catalog: &Catalog) -> Result<Vec<ResponseRegistration>, RegistryError> {
    let life_host = catalog.config().sites.life_hostname.as_str();
    Ok(vec![Registration::global(vec![
        catalog.white_label_script(),
        catalog.cookie_jar(ANON_ID_COOKIE, ""),
        catalog.inject_core_martech_scripts(InjectLocation::HeadStart, ANON_ID_COOKIE),
        catalog.inject_gtm_script(InjectLocation::HeadEnd, keys::WHITE_LABEL, life_host),
    ])])
}

pub fn business_response(catalog: &Catalog) -> Result<Vec<ResponseRegistration>, RegistryError> {
    Ok(vec![Registration::global(vec![
        catalog.white_label_script(),
        catalog.cookie_jar(ANON_ID_COOKIE, ""),
        catalog.inject_core_martech_scripts(InjectLocation::HeadEnd, ANON_ID_COOKIE),
    ])])
}

#[cfg(test)]
mod tests {
    use super::super::tests::{catalog, response_names};
    use super::*;
    use crate::pipeline::Registrations;

    #[test]
    fn business_has_no_gtm() {
        let catalog = catalog();
        let life = Registrations::new(vec![], life_response(&catalog).unwrap());
        let business = Registrations::new(vec![], business_response(&catalog).unwrap());

        assert_eq!(response_names(&life, "/any").last().map(String::as_str), Some("injectGtmScript"));
        assert_eq!(
            response_names(&business, "/any"),
            vec!["whiteLabelDomainScript", "cookieJar", "injectCoreMartechScripts"]
        );
    }
}
