//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::html::InjectLocation;

/// Root configuration for the edge router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Deployment stage and testing switches.
    pub environment: EnvironmentConfig,

    /// Public brand hostnames.
    pub sites: SitesConfig,

    /// Zero Trust service credentials for protected page origins.
    pub credentials: CredentialsConfig,

    /// Anti-fraud challenge settings.
    pub arkose: ArkoseConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Script injection settings.
    pub injection: InjectionConfig,

    /// Dev hosts used by local testing and feature branches.
    pub local: LocalConfig,

    /// Public host to upstream base URL mappings.
    pub origins: Vec<OriginConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Scheme of the public URL when no `x-forwarded-proto` is present.
    pub public_scheme: String,

    /// Largest request body buffered for the pipeline.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            public_scheme: "https".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Deployment stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Dev,
    Uat,
    #[default]
    Prod,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Dev => "dev",
            Stage::Uat => "uat",
            Stage::Prod => "prod",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Stage::Dev),
            "uat" => Ok(Stage::Uat),
            "prod" => Ok(Stage::Prod),
            other => Err(format!("unknown stage '{other}'")),
        }
    }
}

/// Environment configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Deployment stage.
    pub stage: Stage,

    /// Local testing mode: cookies scoped to localhost, local preflight routes.
    pub testing: bool,

    /// Page origin prefix, e.g. "uat." or "" in prod.
    pub cf_page_prefix: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            stage: Stage::Prod,
            testing: false,
            cf_page_prefix: String::new(),
        }
    }
}

/// Brand hostnames. Values may include a port.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SitesConfig {
    /// Registrable root domain shared by the CTM sites.
    pub root_domain: String,
    pub ctm_hostname: String,
    pub iselect_hostname: String,
    pub choosi_hostname: String,
    pub life_hostname: String,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            root_domain: "comparethemarket.com.au".to_string(),
            ctm_hostname: "www.comparethemarket.com.au".to_string(),
            iselect_hostname: "www.iselect.com.au".to_string(),
            choosi_hostname: "www.choosi.com.au".to_string(),
            life_hostname: "life.comparethemarket.com.au".to_string(),
        }
    }
}

/// Zero Trust credentials. Overridable via `CF_ACCESS_CLIENT_ID` and
/// `CF_ACCESS_AUTH_TOKEN`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CredentialsConfig {
    pub cf_access_client_id: String,
    pub cf_access_auth_token: String,
}

/// Anti-fraud challenge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArkoseConfig {
    /// Client-side challenge script URL.
    pub js_endpoint: String,

    /// Budget for the server-side verification call.
    pub verify_timeout_secs: u64,

    /// Session token lifetime handed to the client script.
    pub session_token_expiry_hrs: u32,

    /// Attempts the client script makes to read tracking data.
    pub tracking_data_retry: u32,
}

impl Default for ArkoseConfig {
    fn default() -> Self {
        Self {
            js_endpoint: "https://client-api.arkoselabs.com/v2/api.js".to_string(),
            verify_timeout_secs: 3,
            session_token_expiry_hrs: 1,
            tracking_data_retry: 10,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Per-fetch timeout for origin and third-party requests in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            upstream_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InjectionConfig {
    /// Where accumulated header scripts are flushed.
    pub header_scripts_location: InjectLocation,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            header_scripts_location: InjectLocation::HeadEnd,
        }
    }
}

/// Hosts that local testing and feature branches forward to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Dev site host, e.g. "dev.comparethemarket.com.au".
    pub dev_host: String,

    /// Base of the legacy secure host, prefixed by "nxi." or a feature tag.
    pub secure_dev_domain: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            dev_host: "dev.comparethemarket.com.au".to_string(),
            secure_dev_domain: "secure.dev.comparethemarket.com.au".to_string(),
        }
    }
}

/// Maps a public host to the upstream that actually serves it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OriginConfig {
    /// Public host as seen in the request URL.
    pub host: String,

    /// Upstream base URL, e.g. "http://127.0.0.1:9000".
    pub upstream: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "edge_router=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
