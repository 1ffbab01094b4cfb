//! Route matching logic.
//!
//! # Responsibilities
//! - Match host (exact match, case-insensitive, port aware)
//! - Match path patterns with `*` wildcards and `:name` segments
//!
//! # Design Decisions
//! - Host matching is case-insensitive (RFC 9110)
//! - Path matching is case-sensitive and ignores the query string
//! - Trailing slashes on the request path are ignored
//! - Patterns compile to anchored regexes once, when tables are built

use regex::Regex;

use crate::http::EdgeRequest;
use crate::pipeline::RegistryError;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &EdgeRequest) -> bool;
}

/// Matches the request host, including a non-default port when configured.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, req: &EdgeRequest) -> bool {
        req.host().to_lowercase() == self.expected_host
    }
}

/// A compiled path pattern.
///
/// - `*` matches any run of characters including `/`; `/*` also matches
///   the bare prefix (`/ctm/*` matches `/ctm` but not `/ctmx`)
/// - `:name` matches exactly one non-empty segment
#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    compiled: Compiled,
}

#[derive(Debug, Clone)]
enum Compiled {
    Any,
    Regex(Regex),
}

impl RoutePattern {
    pub fn new(pattern: &str) -> Result<Self, RegistryError> {
        let normalized = collapse_slashes(pattern);
        let compiled = if normalized == "*" || normalized == "/*" {
            Compiled::Any
        } else {
            let regex = Regex::new(&compile(&normalized)).map_err(|source| {
                RegistryError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                }
            })?;
            Compiled::Regex(regex)
        };
        Ok(Self {
            source: pattern.to_string(),
            compiled,
        })
    }

    /// The catch-all pattern `*`.
    pub fn any() -> Self {
        Self {
            source: "*".to_string(),
            compiled: Compiled::Any,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_catch_all(&self) -> bool {
        matches!(self.compiled, Compiled::Any)
    }

    /// Match a URL path (no query string).
    pub fn matches_path(&self, path: &str) -> bool {
        match &self.compiled {
            Compiled::Any => true,
            Compiled::Regex(regex) => regex.is_match(path),
        }
    }
}

impl Matcher for RoutePattern {
    fn matches(&self, req: &EdgeRequest) -> bool {
        self.matches_path(req.path())
    }
}

/// Translate a normalized route pattern into an anchored regex.
fn compile(normalized: &str) -> String {
    let mut out = String::from("^");
    let mut chars = normalized.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str("(/.*)?");
            }
            '*' => out.push_str("(.*)?"),
            ':' if chars.peek().is_some_and(|n| n.is_alphanumeric() || *n == '_') => {
                while chars.peek().is_some_and(|n| n.is_alphanumeric() || *n == '_') {
                    chars.next();
                }
                out.push_str("[^/]+");
            }
            other => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }

    out.push_str("/*$");
    out
}

/// Collapse repeated slashes and drop a trailing slash.
fn collapse_slashes(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    if out.ends_with('/') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        RoutePattern::new(pattern).unwrap().matches_path(path)
    }

    #[test]
    fn test_host_matcher() {
        let matcher = HostMatcher::new("www.iselect.com.au");

        let req = EdgeRequest::get("https://WWW.ISELECT.COM.AU/car").unwrap();
        assert!(matcher.matches(&req));

        let other = EdgeRequest::get("https://www.choosi.com.au/").unwrap();
        assert!(!matcher.matches(&other));

        let local = HostMatcher::new("localhost:8787");
        assert!(local.matches(&EdgeRequest::get("http://localhost:8787/").unwrap()));
        assert!(!local.matches(&EdgeRequest::get("http://localhost/").unwrap()));
    }

    #[test]
    fn slash_star_makes_the_tail_optional() {
        assert!(matches("/ctm/*", "/ctm"));
        assert!(matches("/ctm/*", "/ctm/"));
        assert!(matches("/ctm/*", "/ctm/health_quote.jsp"));
        assert!(matches("/ctm/*", "/ctm/a/b/c"));
        assert!(!matches("/ctm/*", "/ctmx"));
        assert!(!matches("/ctm/*", "/other/ctm"));
    }

    #[test]
    fn bare_star_matches_anything_after_the_prefix() {
        assert!(matches("/metrics*", "/metrics"));
        assert!(matches("/metrics*", "/metricsX"));
        assert!(matches("/car-insurance/journey*", "/car-insurance/journey/start"));
        assert!(!matches("/metrics*", "/chat"));
    }

    #[test]
    fn catch_all_patterns() {
        for path in ["/", "/anything", "/a/b/c.js"] {
            assert!(matches("*", path));
            assert!(matches("/*", path));
            assert!(RoutePattern::any().matches_path(path));
        }
        assert!(RoutePattern::new("/*").unwrap().is_catch_all());
        assert!(!RoutePattern::new("/ctm/*").unwrap().is_catch_all());
    }

    #[test]
    fn exact_patterns_ignore_trailing_slashes() {
        assert!(matches("/api/pet/quote/", "/api/pet/quote"));
        assert!(matches("/api/pet/quote/", "/api/pet/quote/"));
        assert!(matches("/api/car-journey/journey/result", "/api/car-journey/journey/result/"));
        assert!(!matches("/api/car-journey/journey/result", "/api/car-journey/journey/results"));
    }

    #[test]
    fn wildcards_in_the_middle() {
        assert!(matches("/api/client/*/brands/*", "/api/client/v1/brands/ctm"));
        assert!(matches("/api/client/*/brands/*", "/api/client/x/y/brands"));
        assert!(!matches("/api/client/*/brands/*", "/api/client/v1/other"));
    }

    #[test]
    fn named_segments_match_one_segment() {
        assert!(matches("/users/:id", "/users/42"));
        assert!(!matches("/users/:id", "/users/42/posts"));
        assert!(!matches("/users/:id", "/users"));
    }

    #[test]
    fn dots_are_literal() {
        assert!(matches("/ctm/ajax/json/health_quote_results_ws.jsp", "/ctm/ajax/json/health_quote_results_ws.jsp"));
        assert!(!matches("/ctm/ajax/json/health_quote_results_ws.jsp", "/ctm/ajax/json/health_quote_results_wsxjsp"));
    }
}
