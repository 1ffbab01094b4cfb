//! Brand selection from the request host.

use std::fmt;

use crate::config::SitesConfig;
use crate::http::EdgeRequest;
use crate::routing::matcher::{HostMatcher, Matcher};

const BUSINESS_SUBDOMAIN: &str = "business";

/// The brand whose tables serve a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    Ctm,
    Iselect,
    Choosi,
    Life,
    Business,
}

impl Site {
    pub const ALL: [Site; 5] = [Site::Ctm, Site::Iselect, Site::Choosi, Site::Life, Site::Business];

    /// Pick the site for `request`.
    ///
    /// Hosts are compared with their port; the business subdomain is the
    /// single label `business` directly under the root domain.
    pub fn select(request: &EdgeRequest, sites: &SitesConfig) -> Site {
        if HostMatcher::new(&sites.choosi_hostname).matches(request) {
            Site::Choosi
        } else if HostMatcher::new(&sites.iselect_hostname).matches(request) {
            Site::Iselect
        } else if is_business_subdomain(request.hostname(), &sites.root_domain) {
            Site::Business
        } else if HostMatcher::new(&sites.life_hostname).matches(request) {
            Site::Life
        } else {
            Site::Ctm
        }
    }

    /// Site whose request table applies. Life and Business only differ on
    /// the response side.
    pub fn request_site(self) -> Site {
        match self {
            Site::Life | Site::Business => Site::Ctm,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Site::Ctm => "ctm",
            Site::Iselect => "iselect",
            Site::Choosi => "choosi",
            Site::Life => "life",
            Site::Business => "business",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_business_subdomain(hostname: &str, root_domain: &str) -> bool {
    if hostname == root_domain {
        return false;
    }
    let labels: Vec<&str> = hostname
        .strip_suffix(root_domain)
        .and_then(|rest| rest.strip_suffix('.'))
        .unwrap_or(hostname)
        .split('.')
        .collect();
    labels.len() == 1 && labels[0] == BUSINESS_SUBDOMAIN
}
