//! Response values flowing through the pipeline.
//!
//! # Responsibilities
//! - Hold a fully buffered response (status, headers, body)
//! - Content-type and `Set-Cookie` helpers used by response middleware
//! - Convert into an Axum response for the client
//!
//! # Design Decisions
//! - Bodies are buffered so HTML injection can rewrite them in one pass
//! - `Content-Length` is dropped whenever the body changes; Axum recomputes it

use axum::body::{Body, Bytes};
use axum::http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct EdgeResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl EdgeResponse {
    /// Empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn from_parts(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// `200 OK` with a `text/html` body.
    pub fn html(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))
            .with_body(body)
    }

    /// Plain text response with the given status.
    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
            .with_body(body)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// First value of a header as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    /// True when the response advertises an HTML document.
    pub fn is_html(&self) -> bool {
        self.content_type()
            .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
            .unwrap_or(false)
    }

    /// All `Set-Cookie` values in order.
    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
    }

    /// Value assigned to `name` by any `Set-Cookie` header on this response.
    pub fn set_cookie_value(&self, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        self.set_cookies()
            .flat_map(|cookie| cookie.split("; "))
            .find_map(|part| part.strip_prefix(prefix.as_str()))
            .map(|value| value.split('=').next().unwrap_or_default().to_string())
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set a header, replacing existing values.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Append a header value, keeping existing values.
    pub fn with_appended_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.headers.remove(CONTENT_LENGTH);
        self
    }

    /// Convert into an Axum response.
    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_detection_ignores_parameters_and_case() {
        let res = EdgeResponse::new(StatusCode::OK)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("Text/HTML; charset=UTF-8"));
        assert!(res.is_html());

        let js = EdgeResponse::new(StatusCode::OK)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/javascript"));
        assert!(!js.is_html());
        assert!(!EdgeResponse::new(StatusCode::OK).is_html());
    }

    #[test]
    fn set_cookie_value_reads_any_header() {
        let res = EdgeResponse::new(StatusCode::OK)
            .with_appended_header(SET_COOKIE, HeaderValue::from_static("other=1; path=/"))
            .with_appended_header(
                SET_COOKIE,
                HeaderValue::from_static("user_anonymous_id=abc.42; path=/; Secure"),
            );

        assert_eq!(res.set_cookie_value("user_anonymous_id").as_deref(), Some("abc.42"));
        assert_eq!(res.set_cookie_value("missing"), None);
        assert_eq!(res.set_cookies().count(), 2);
    }

    #[test]
    fn replacing_body_drops_content_length() {
        let res = EdgeResponse::new(StatusCode::OK)
            .with_header(CONTENT_LENGTH, HeaderValue::from_static("3"))
            .with_body("hello");
        assert!(res.header("content-length").is_none());
        assert_eq!(res.body().as_ref(), b"hello");
    }
}
