//! Request values flowing through the pipeline.
//!
//! # Responsibilities
//! - Hold the buffered inbound request (method, absolute URL, headers, body)
//! - Produce modified copies for middleware (`with_*` builders)
//! - Cookie and header lookups used by routing and middleware
//! - Stamp inbound requests with an `x-request-id` (UUID v4)
//!
//! # Design Decisions
//! - Requests are values: middleware never mutate a request in place, they
//!   build a replacement and hand it back to the executor
//! - The URL is absolute (scheme + host from the inbound `Host` header) so
//!   host rewrites are plain URL edits

use axum::body::Bytes;
use axum::http::header::{HeaderName, HeaderValue, COOKIE};
use axum::http::{HeaderMap, Method, Request};
use tower_http::request_id::{MakeRequestId, RequestId, SetRequestIdLayer};
use url::Url;
use uuid::Uuid;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates a UUID v4 request ID when the client did not send one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Tower layer that sets `x-request-id` on every inbound request.
pub type RequestIdLayer = SetRequestIdLayer<UuidRequestId>;

/// Build the request ID layer used by the server.
pub fn request_id_layer() -> RequestIdLayer {
    SetRequestIdLayer::x_request_id(UuidRequestId)
}

/// An immutable, fully buffered HTTP request.
#[derive(Debug, Clone)]
pub struct EdgeRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
}

impl EdgeRequest {
    /// Create a body-less request.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Create a request from its parts.
    pub fn from_parts(method: Method, url: Url, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            url,
            headers,
            body,
        }
    }

    /// Convenience constructor for a GET request.
    pub fn get(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Method::GET, Url::parse(url)?))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Path component of the URL.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Host component of the URL (no port).
    pub fn hostname(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Host component including a non-default port, e.g. `localhost:3000`.
    pub fn host(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{}", self.hostname(), port),
            None => self.hostname().to_string(),
        }
    }

    /// First value of a header as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Value of a named cookie from the `Cookie` header.
    pub fn cookie(&self, name: &str) -> Option<String> {
        cookie_value(&self.headers, name)
    }

    /// Value of a query parameter.
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Request correlation ID, or `"unknown"` when the layer did not run.
    pub fn request_id(&self) -> &str {
        self.header(X_REQUEST_ID).unwrap_or("unknown")
    }

    /// Copy with a different URL.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = url;
        self
    }

    /// Copy with a different method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Copy with a header set, replacing existing values.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Copy with a header value appended to any existing values.
    pub fn with_appended_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Copy without the named header.
    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    /// Copy with the whole header map replaced.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Copy with a different body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Look up a cookie in the `Cookie` header(s) of a header map.
///
/// Names are compared exactly; pairs without `=` are ignored.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_cookie(cookie: &'static str) -> EdgeRequest {
        EdgeRequest::get("https://www.example.com/path?a=1&b=two")
            .unwrap()
            .with_header(COOKIE, HeaderValue::from_static(cookie))
    }

    #[test]
    fn cookie_lookup_is_exact() {
        let req = request_with_cookie("anon_ga=1; _ga=GA1.2.3; user_anonymous_id=abc.123");
        assert_eq!(req.cookie("_ga").as_deref(), Some("GA1.2.3"));
        assert_eq!(req.cookie("user_anonymous_id").as_deref(), Some("abc.123"));
        assert_eq!(req.cookie("ga"), None);
    }

    #[test]
    fn builders_leave_original_untouched() {
        let original = request_with_cookie("a=b");
        let changed = original
            .clone()
            .with_header(HeaderName::from_static("x-test"), HeaderValue::from_static("1"));

        assert!(original.header("x-test").is_none());
        assert_eq!(changed.header("x-test"), Some("1"));
    }

    #[test]
    fn host_and_query_accessors() {
        let req = EdgeRequest::get("http://localhost:3000/metrics?id=GTM-1").unwrap();
        assert_eq!(req.hostname(), "localhost");
        assert_eq!(req.host(), "localhost:3000");
        assert_eq!(req.query_param("id").as_deref(), Some("GTM-1"));
        assert_eq!(req.request_id(), "unknown");
    }
}
