//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE, COOKIE};
use futures_util::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use edge_router::config::RouterConfig;
use edge_router::http::{EdgeCache, EdgeRequest, EdgeResponse, Fetch, FetchError, HttpOrigin, HttpServer};
use edge_router::lifecycle::Shutdown;
use edge_router::routing::EdgeRouter;

pub const PAGE: &str = "<!DOCTYPE html><html><head><title>page</title></head><body><main>content</main></body></html>";

type Responder = dyn Fn(&EdgeRequest) -> Result<EdgeResponse, FetchError> + Send + Sync;

/// In-process origin that records every request it is asked to fetch.
pub struct RecordingOrigin {
    seen: Mutex<Vec<EdgeRequest>>,
    respond: Box<Responder>,
}

impl RecordingOrigin {
    pub fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(&EdgeRequest) -> Result<EdgeResponse, FetchError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    /// Answers every request with [`PAGE`].
    pub fn html() -> Arc<Self> {
        Self::new(|_| Ok(EdgeResponse::html(PAGE)))
    }

    pub fn seen(&self) -> Vec<EdgeRequest> {
        self.seen.lock().unwrap().clone()
    }

    /// Requests whose host is `host`.
    pub fn seen_for(&self, host: &str) -> Vec<EdgeRequest> {
        self.seen().into_iter().filter(|r| r.hostname() == host).collect()
    }
}

impl Fetch for RecordingOrigin {
    fn fetch<'a>(&'a self, request: EdgeRequest) -> BoxFuture<'a, Result<EdgeResponse, FetchError>> {
        let result = (self.respond)(&request);
        self.seen.lock().unwrap().push(request);
        Box::pin(async move { result })
    }
}

pub fn router(origin: Arc<RecordingOrigin>) -> EdgeRouter {
    let fetcher: Arc<dyn Fetch> = origin;
    EdgeRouter::new(fetcher.clone(), EdgeCache::new(fetcher, Duration::from_secs(30)))
}

pub fn get(url: &str) -> EdgeRequest {
    EdgeRequest::get(url).unwrap()
}

pub fn with_cookie(request: EdgeRequest, cookie: &'static str) -> EdgeRequest {
    request.with_header(COOKIE, HeaderValue::from_static(cookie))
}

pub fn with_header(request: EdgeRequest, name: &'static str, value: &'static str) -> EdgeRequest {
    request.with_header(HeaderName::from_static(name), HeaderValue::from_static(value))
}

pub fn body(response: &EdgeResponse) -> String {
    String::from_utf8(response.body().to_vec()).unwrap()
}

pub fn json_response(body: &'static str) -> EdgeResponse {
    EdgeResponse::new(axum::http::StatusCode::OK)
        .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .with_body(body)
}

/// Start a TCP origin that answers every request with an HTML page.
pub async fn start_mock_origin(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        let mut read = 0;
                        while read < buf.len() {
                            match socket.read(&mut buf[read..]).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => read += n,
                            }
                            if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start the full server on an ephemeral port.
pub async fn start_router(config: RouterConfig) -> (SocketAddr, Shutdown) {
    let fetcher: Arc<dyn Fetch> = Arc::new(HttpOrigin::new(&config.origins, &config.timeouts).unwrap());
    let cache = EdgeCache::new(fetcher.clone(), Duration::from_secs(30));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(Arc::new(ArcSwap::from_pointee(config)), fetcher, cache);
    let stop = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, stop).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, shutdown)
}
