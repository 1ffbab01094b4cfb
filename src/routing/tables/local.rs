//! Preflight reroutes for local runs and feature subdomains.

use crate::middlewares::Catalog;
use crate::pipeline::{Registration, RegistryError, RequestRegistration};

/// Legacy web application prefixes served from the secure dev host.
const LEGACY_WEB_ROUTES: [&str; 2] = ["/ctm/*", "/launcher/wars*"];

pub fn preflight(catalog: &Catalog) -> Result<Vec<RequestRegistration>, RegistryError> {
    let mut table = vec![Registration::preflight("/*", vec![catalog.dev_reroute()])?];
    for route in LEGACY_WEB_ROUTES {
        table.push(Registration::preflight(route, vec![catalog.legacy_web_reroute()])?);
    }
    Ok(table)
}
