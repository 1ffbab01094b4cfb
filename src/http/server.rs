//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with one catch-all handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Buffer inbound requests into `EdgeRequest` values
//! - Dispatch to the edge router with the current config snapshot
//! - Record request metrics and map pipeline errors to 502

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header::HOST, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Instrument;
use url::Url;

use crate::config::{ListenerConfig, RouterConfig};
use crate::http::request::request_id_layer;
use crate::http::{EdgeCache, EdgeRequest, Fetch, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::EdgeRouter;

const FORWARDED_PROTO: &str = "x-forwarded-proto";
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<RouterConfig>>,
    pub router: EdgeRouter,
}

/// Why an inbound request could not be turned into an `EdgeRequest`.
#[derive(Debug, Error)]
pub enum InboundError {
    #[error("request has no host")]
    MissingHost,

    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),

    #[error("request body rejected: {0}")]
    Body(#[from] axum::Error),
}

impl InboundError {
    fn status(&self) -> StatusCode {
        match self {
            InboundError::Body(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// HTTP front end of the edge router.
pub struct HttpServer {
    router: Router,
    cache: EdgeCache,
}

impl HttpServer {
    pub fn new(config: Arc<ArcSwap<RouterConfig>>, fetcher: Arc<dyn Fetch>, cache: EdgeCache) -> Self {
        let request_timeout = Duration::from_secs(config.load().timeouts.request_secs);
        let state = AppState {
            config,
            router: EdgeRouter::new(fetcher, cache.clone()),
        };
        Self {
            router: Self::build_router(request_timeout, state),
            cache,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(request_timeout: Duration, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(edge_handler))
            .route("/", any(edge_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(request_id_layer())
            .layer(TraceLayer::new_for_http())
    }

    /// Axum router, for serving or driving directly in tests.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let cache = self.cache.clone();
        let mut purge_stop = shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CACHE_PURGE_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => cache.purge_expired(),
                    _ = purge_stop.recv() => break,
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(Shutdown::wait(shutdown.subscribe()))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Buffer an inbound request into an absolute-URL `EdgeRequest`.
///
/// The scheme comes from `x-forwarded-proto` when a front proxy sets it,
/// otherwise from the configured public scheme.
pub async fn into_edge_request(request: Request<Body>, listener: &ListenerConfig) -> Result<EdgeRequest, InboundError> {
    let (parts, body) = request.into_parts();

    let host = parts
        .headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .ok_or(InboundError::MissingHost)?;
    let scheme = parts
        .headers
        .get(FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .filter(|proto| matches!(*proto, "http" | "https"))
        .unwrap_or(listener.public_scheme.as_str());
    let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    let url = Url::parse(&format!("{scheme}://{host}{path_and_query}"))?;
    let body = axum::body::to_bytes(body, listener.max_body_bytes).await?;

    Ok(EdgeRequest::from_parts(parts.method, url, parts.headers, body))
}

/// Catch-all handler: every request goes through the edge router.
async fn edge_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let config = state.config.load_full();
    let method = request.method().to_string();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let edge_request = match into_edge_request(request, &config.listener).await {
        Ok(edge_request) => edge_request,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejected inbound request");
            let status = e.status();
            metrics::record_request(&method, status.as_u16(), "none", started);
            return (status, e.to_string()).into_response();
        }
    };

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        host = %edge_request.host(),
        path = %edge_request.path(),
    );

    match state.router.route(config, edge_request).instrument(span).await {
        Ok(routed) => {
            let site = routed.site.map(|site| site.as_str()).unwrap_or("none");
            metrics::record_request(&method, routed.response.status().as_u16(), site, started);
            routed.response.into_response()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Pipeline failed");
            metrics::record_request(&method, StatusCode::BAD_GATEWAY.as_u16(), "none", started);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{EdgeResponse, FetchError};
    use axum::http::Method;
    use futures_util::future::BoxFuture;
    use tower::ServiceExt;

    struct StaticPage;

    impl Fetch for StaticPage {
        fn fetch<'a>(&'a self, _request: EdgeRequest) -> BoxFuture<'a, Result<EdgeResponse, FetchError>> {
            Box::pin(async { Ok(EdgeResponse::html("<html><head></head><body></body></html>")) })
        }
    }

    fn app() -> Router {
        let fetcher: Arc<dyn Fetch> = Arc::new(StaticPage);
        let cache = EdgeCache::new(fetcher.clone(), Duration::from_secs(30));
        HttpServer::new(Arc::new(ArcSwap::from_pointee(RouterConfig::default())), fetcher, cache).into_router()
    }

    #[tokio::test]
    async fn requests_are_routed_through_the_pipeline() {
        let request = Request::builder()
            .uri("/")
            .header(HOST, "www.comparethemarket.com.au")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get_all("set-cookie").iter().count() >= 2);
    }

    #[tokio::test]
    async fn requests_without_a_host_are_rejected() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn inbound_requests_get_absolute_urls() {
        let listener = ListenerConfig::default();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/car-journey/journey/result?x=1")
            .header(HOST, "www.comparethemarket.com.au")
            .body(Body::from("{}"))
            .unwrap();

        let edge = into_edge_request(request, &listener).await.unwrap();
        assert_eq!(
            edge.url().as_str(),
            "https://www.comparethemarket.com.au/api/car-journey/journey/result?x=1"
        );
        assert_eq!(edge.method(), Method::POST);
        assert_eq!(edge.body().as_ref(), b"{}");
    }

    #[tokio::test]
    async fn forwarded_proto_and_port_are_kept() {
        let listener = ListenerConfig::default();
        let request = Request::builder()
            .uri("/")
            .header(HOST, "localhost:8787")
            .header(FORWARDED_PROTO, "http")
            .body(Body::empty())
            .unwrap();

        let edge = into_edge_request(request, &listener).await.unwrap();
        assert_eq!(edge.url().as_str(), "http://localhost:8787/");
        assert_eq!(edge.host(), "localhost:8787");
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let listener = ListenerConfig {
            max_body_bytes: 4,
            ..ListenerConfig::default()
        };
        let request = Request::builder()
            .uri("/")
            .header(HOST, "www.comparethemarket.com.au")
            .body(Body::from("too long"))
            .unwrap();

        let err = into_edge_request(request, &listener).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
