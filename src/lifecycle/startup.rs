//! Startup checks.
//!
//! Site tables are built per request, so a bad pattern or a misordered
//! registration would otherwise only surface on the first matching
//! request. Building every table once before binding the listener turns
//! that into a startup failure.

use crate::middlewares::Catalog;
use crate::pipeline::RegistryError;
use crate::routing::{tables, Site};

/// Build and validate every site table, with and without the local
/// reroutes. Returns the total number of registrations checked.
pub fn self_check(catalog: &Catalog) -> Result<usize, RegistryError> {
    let mut checked = 0;
    for site in Site::ALL {
        for local in [false, true] {
            let registrations = tables::build(site, catalog, local)?;
            checked += registrations.request().len() + registrations.response().len();
        }
        tracing::debug!(site = %site, "Site tables valid");
    }
    Ok(checked)
}
