//! Traffic classification header for upstream analytics.
//!
//! # Responsibilities
//! - Classify each request as synthetic, call centre, internal or external
//! - Forward the classification in `x-ctm-traffic-type`
//!
//! # Design Decisions
//! - Checks run in priority order; the first match wins
//! - Unparseable client IPs never match a range

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use axum::http::header::{HeaderName, HeaderValue};
use futures_util::future::BoxFuture;

use crate::http::EdgeRequest;
use crate::middlewares::simples::CALL_CENTRE_COOKIE;
use crate::pipeline::{Outcome, PipelineError, RequestContext};

pub const TRAFFIC_TYPE_HEADER: &str = "x-ctm-traffic-type";
pub const CONNECTING_IPV4_HEADER: &str = "cf-connecting-ip";
pub const CONNECTING_IPV6_HEADER: &str = "cf-connecting-ipv6";
pub const SYNTHETIC_MONITOR_HEADER: &str = "x-abuse-info";

const SYNTHETIC_MONITOR_MARKER: &str = "Request sent by a synthetic monitor";
const AUTOMATED_TEST_PARAM: &str = "automated-test";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficType {
    AutomatedTest,
    CallCentre,
    Internal,
    External,
}

impl TrafficType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficType::AutomatedTest => "SYNTHETICS",
            TrafficType::CallCentre => "INTERNAL_CALL_CENTRE",
            TrafficType::Internal => "INTERNAL",
            TrafficType::External => "EXTERNAL",
        }
    }
}

impl fmt::Display for TrafficType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An address range in CIDR notation.
#[derive(Debug, Clone, Copy)]
struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    const fn v4(a: u8, b: u8, c: u8, d: u8, prefix: u8) -> Self {
        Self {
            network: IpAddr::V4(Ipv4Addr::new(a, b, c, d)),
            prefix,
        }
    }

    fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(network), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(network) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(network), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(network) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

/// Selenium egress, New Relic monitors, legacy selenium and Sauce Labs.
const SYNTHETIC_RANGES: [Cidr; 12] = [
    Cidr::v4(13, 236, 81, 73, 32),
    Cidr::v4(52, 62, 150, 168, 32),
    Cidr::v4(13, 54, 163, 135, 32),
    Cidr {
        network: IpAddr::V6(Ipv6Addr::new(0x2406, 0xda2c, 0xc, 0x100, 0, 0, 0, 0)),
        prefix: 56,
    },
    Cidr::v4(3, 26, 252, 0, 24),
    Cidr::v4(3, 26, 245, 128, 25),
    Cidr::v4(3, 27, 51, 0, 25),
    Cidr::v4(13, 54, 55, 150, 32),
    Cidr::v4(13, 54, 250, 208, 32),
    Cidr::v4(13, 55, 11, 204, 32),
    Cidr::v4(13, 54, 42, 28, 32),
    Cidr::v4(13, 54, 148, 101, 32),
];

/// Office, VPN and partner office ranges.
const INTERNAL_RANGES: [Cidr; 4] = [
    Cidr::v4(202, 56, 60, 0, 23),
    Cidr::v4(202, 56, 61, 2, 32),
    Cidr::v4(104, 30, 134, 155, 32),
    Cidr::v4(104, 30, 133, 228, 32),
];

fn in_ranges(ip: &str, ranges: &[Cidr]) -> bool {
    ip.trim()
        .parse::<IpAddr>()
        .is_ok_and(|ip| ranges.iter().any(|range| range.contains(ip)))
}

fn is_automated_test(request: &EdgeRequest) -> bool {
    if request.query_param(AUTOMATED_TEST_PARAM).as_deref() == Some("true") {
        return true;
    }
    if request
        .header(SYNTHETIC_MONITOR_HEADER)
        .is_some_and(|v| v.contains(SYNTHETIC_MONITOR_MARKER))
    {
        return true;
    }
    request
        .header(CONNECTING_IPV4_HEADER)
        .or_else(|| request.header(CONNECTING_IPV6_HEADER))
        .is_some_and(|ip| in_ranges(ip, &SYNTHETIC_RANGES))
}

fn is_call_centre(request: &EdgeRequest) -> bool {
    request.cookie(CALL_CENTRE_COOKIE).as_deref() == Some("true")
}

fn is_internal(request: &EdgeRequest) -> bool {
    request
        .header(CONNECTING_IPV4_HEADER)
        .is_some_and(|ip| in_ranges(ip, &INTERNAL_RANGES))
}

pub fn classify(request: &EdgeRequest) -> TrafficType {
    if is_automated_test(request) {
        TrafficType::AutomatedTest
    } else if is_call_centre(request) {
        TrafficType::CallCentre
    } else if is_internal(request) {
        TrafficType::Internal
    } else {
        TrafficType::External
    }
}

pub fn add_traffic_headers(ctx: &mut RequestContext) -> BoxFuture<'_, Result<Outcome, PipelineError>> {
    Box::pin(async move {
        let traffic_type = classify(ctx.request());
        tracing::debug!(traffic_type = %traffic_type, "Classified traffic");
        Ok(Outcome::Continue(ctx.request().clone().with_header(
            HeaderName::from_static(TRAFFIC_TYPE_HEADER),
            HeaderValue::from_static(traffic_type.as_str()),
        )))
    })
}
