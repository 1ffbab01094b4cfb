//! Origin fetching.
//!
//! # Responsibilities
//! - Define the `Fetch` seam the pipeline uses for its single origin fetch
//! - Forward requests upstream with `reqwest`, buffering the response
//! - Map configured public hosts onto upstream base URLs
//!
//! # Design Decisions
//! - Redirects are never followed; the browser must see them
//! - The public `Host` header is preserved when a host is remapped
//! - Hop-by-hop headers are stripped in both directions

use std::collections::HashMap;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::header::{HeaderValue, ACCEPT_ENCODING, CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use axum::http::HeaderMap;
use futures_util::future::BoxFuture;
use thiserror::Error;
use url::Url;

use crate::config::{OriginConfig, TimeoutConfig};
use crate::http::{EdgeRequest, EdgeResponse};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream request to {0} timed out")]
    Timeout(String),

    #[error("invalid upstream for {host}: {upstream}")]
    InvalidUpstream { host: String, upstream: String },

    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}

/// Performs one HTTP exchange.
pub trait Fetch: Send + Sync {
    fn fetch<'a>(&'a self, request: EdgeRequest) -> BoxFuture<'a, Result<EdgeResponse, FetchError>>;
}

const HOP_BY_HOP: [&str; 6] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "upgrade",
];

/// `reqwest`-backed fetcher for origins and third-party hosts.
#[derive(Debug, Clone)]
pub struct HttpOrigin {
    client: reqwest::Client,
    upstreams: HashMap<String, Url>,
}

impl HttpOrigin {
    pub fn new(origins: &[OriginConfig], timeouts: &TimeoutConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.upstream_secs))
            .build()?;

        let mut upstreams = HashMap::with_capacity(origins.len());
        for origin in origins {
            let url = Url::parse(&origin.upstream).map_err(|_| FetchError::InvalidUpstream {
                host: origin.host.clone(),
                upstream: origin.upstream.clone(),
            })?;
            upstreams.insert(origin.host.to_ascii_lowercase(), url);
        }

        Ok(Self { client, upstreams })
    }

    /// URL actually dialled for `url`, with scheme/host/port swapped when mapped.
    pub fn resolve(&self, url: &Url) -> Url {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let with_port = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.clone(),
        };
        let Some(upstream) = self
            .upstreams
            .get(&with_port)
            .or_else(|| self.upstreams.get(&host))
        else {
            return url.clone();
        };

        let mut resolved = upstream.clone();
        let base = upstream.path().trim_end_matches('/');
        resolved.set_path(&format!("{}{}", base, url.path()));
        resolved.set_query(url.query());
        resolved
    }

    fn outbound_headers(request: &EdgeRequest) -> HeaderMap {
        let mut headers = request.headers().clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(CONTENT_LENGTH);
        // Bodies may be rewritten, so ask for them uncompressed.
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        if let Ok(host) = HeaderValue::from_str(&request.host()) {
            headers.insert(HOST, host);
        }
        headers
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove(TRANSFER_ENCODING);
    headers.remove(CONNECTION);
}

impl Fetch for HttpOrigin {
    fn fetch<'a>(&'a self, request: EdgeRequest) -> BoxFuture<'a, Result<EdgeResponse, FetchError>> {
        Box::pin(async move {
            let target = self.resolve(request.url());
            tracing::debug!(
                method = %request.method(),
                url = %request.url(),
                target = %target,
                "Fetching upstream"
            );

            let result = self
                .client
                .request(request.method().clone(), target.clone())
                .headers(Self::outbound_headers(&request))
                .body(request.body().clone())
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    metrics::record_origin_fetch("timeout");
                    return Err(FetchError::Timeout(target.to_string()));
                }
                Err(e) => {
                    metrics::record_origin_fetch("error");
                    return Err(e.into());
                }
            };

            let status = response.status();
            let mut headers = response.headers().clone();
            strip_hop_by_hop(&mut headers);
            headers.remove(CONTENT_LENGTH);
            let body: Bytes = response.bytes().await?;

            metrics::record_origin_fetch("ok");
            Ok(EdgeResponse::from_parts(status, headers, body))
        })
    }
}
