//! Anonymous ID cookie persistence.
//!
//! The anonymous ID lives in two cookies: `name` (readable by page scripts)
//! and `name_saved` (HttpOnly backup). Both hold `<id>.<created-epoch-ms>`.
//! When the exposed cookie is cleared client side, the backup restores it;
//! when both agree and are more than an hour old, both are re-stamped so the
//! 400 day max age keeps rolling forward.

use axum::http::header::{HeaderValue, SET_COOKIE};
use futures_util::future::BoxFuture;
use uuid::Uuid;

use crate::http::{EdgeRequest, EdgeResponse};
use crate::pipeline::{PipelineError, ResponseContext, ResponseStep};

/// 400 days.
pub const DEFAULT_MAX_AGE_SECS: u64 = 34_560_000;

/// Expiry date that deletes a cookie.
pub const EXPIRED: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

const SEPARATOR: char = '.';
const SAVED_SUFFIX: &str = "_saved";
const RENEWAL_PERIOD_MS: i64 = 60 * 60 * 1000;

/// A `Set-Cookie` header value in the format the brand sites expect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    name: String,
    value: String,
    http_only: bool,
    max_age: Option<u64>,
    expires: Option<String>,
    domain: String,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            http_only: false,
            max_age: None,
            expires: None,
            domain: String::new(),
        }
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn max_age(mut self, secs: u64) -> Self {
        self.max_age = Some(secs);
        self
    }

    pub fn expires(mut self, date: impl Into<String>) -> Self {
        self.expires = Some(date.into());
        self
    }

    /// Cookie domain. Empty means the root domain.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Render the header. In testing mode the domain is always `localhost`.
    pub fn render(&self, testing: bool, root_domain: &str) -> String {
        let mut cookie = format!("{}={}; path=/; Secure; SameSite=Strict", self.name, self.value);
        if let Some(max_age) = self.max_age {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        if let Some(expires) = &self.expires {
            cookie.push_str(&format!("; expires={expires}"));
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        let domain = if testing {
            "localhost"
        } else if self.domain.is_empty() {
            root_domain
        } else {
            self.domain.as_str()
        };
        cookie.push_str(&format!("; Domain={domain};"));
        cookie
    }

    pub fn header_value(&self, testing: bool, root_domain: &str) -> Result<HeaderValue, PipelineError> {
        HeaderValue::from_str(&self.render(testing, root_domain))
            .map_err(|e| PipelineError::invalid_header(SET_COOKIE.as_str(), e))
    }
}

/// What the jar does for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JarAction {
    /// No backup cookie: mint a new ID.
    Create,
    /// Both cookies agree and are stale: same ID, fresh timestamp.
    Renew(String),
    /// Exposed cookie missing or different: restore the backup's ID.
    Restore(String),
    /// Both cookies agree and are fresh.
    Keep,
}

/// Decide the jar action from the request cookies at `now_ms`.
pub fn plan(saved: Option<&str>, exposed: Option<&str>, now_ms: i64) -> JarAction {
    let Some(saved) = saved else {
        return JarAction::Create;
    };

    match exposed {
        Some(exposed) if exposed == saved => {
            let mut pieces = exposed.split(SEPARATOR);
            let id = pieces.next().unwrap_or_default();
            let created = pieces.next().and_then(|epoch| epoch.parse::<i64>().ok());
            match created {
                Some(created) if created.saturating_add(RENEWAL_PERIOD_MS) < now_ms => {
                    JarAction::Renew(id.to_string())
                }
                _ => JarAction::Keep,
            }
        }
        _ => {
            let id = saved.split(SEPARATOR).next().unwrap_or_default();
            JarAction::Restore(id.to_string())
        }
    }
}

/// Keeps the anonymous ID cookie pair alive.
#[derive(Debug, Clone)]
pub struct CookieJar {
    name: String,
    domain: String,
    testing: bool,
    root_domain: String,
}

impl CookieJar {
    pub fn new(
        name: impl Into<String>,
        domain: impl Into<String>,
        testing: bool,
        root_domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            testing,
            root_domain: root_domain.into(),
        }
    }

    /// Apply the jar to `response` for `request` at `now_ms`.
    pub fn apply_at(
        &self,
        request: &EdgeRequest,
        response: &EdgeResponse,
        now_ms: i64,
    ) -> Result<Option<EdgeResponse>, PipelineError> {
        let saved_name = format!("{}{SAVED_SUFFIX}", self.name);
        let saved = request.cookie(&saved_name);
        let exposed = request.cookie(&self.name);

        let id = match plan(saved.as_deref(), exposed.as_deref(), now_ms) {
            JarAction::Keep => return Ok(None),
            JarAction::Create => Uuid::new_v4().to_string(),
            JarAction::Renew(id) => {
                tracing::debug!(cookie = %self.name, "Renewing cookie expiry");
                id
            }
            JarAction::Restore(id) => {
                tracing::debug!(cookie = %self.name, "Restoring cookie from backup");
                id
            }
        };
        let value = format!("{id}{SEPARATOR}{now_ms}");

        let exposed = SetCookie::new(self.name.as_str(), value.as_str())
            .max_age(DEFAULT_MAX_AGE_SECS)
            .domain(self.domain.as_str());
        let saved = SetCookie::new(saved_name, value)
            .http_only()
            .max_age(DEFAULT_MAX_AGE_SECS)
            .domain(self.domain.as_str());

        Ok(Some(
            response
                .clone()
                .with_appended_header(SET_COOKIE, exposed.header_value(self.testing, &self.root_domain)?)
                .with_appended_header(SET_COOKIE, saved.header_value(self.testing, &self.root_domain)?),
        ))
    }
}

impl ResponseStep for CookieJar {
    fn run<'a>(
        &'a self,
        ctx: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<Option<EdgeResponse>, PipelineError>> {
        Box::pin(async move {
            let now_ms = chrono::Utc::now().timestamp_millis();
            self.apply_at(ctx.request(), ctx.response(), now_ms)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;
    use axum::http::StatusCode;

    const NOW: i64 = 1_700_000_000_000;

    fn jar(testing: bool) -> CookieJar {
        CookieJar::new("user_anonymous_id", "", testing, "comparethemarket.com.au")
    }

    fn request(cookie: &'static str) -> EdgeRequest {
        EdgeRequest::get("https://www.comparethemarket.com.au/")
            .unwrap()
            .with_header(COOKIE, HeaderValue::from_static(cookie))
    }

    #[test]
    fn set_cookie_format() {
        let cookie = SetCookie::new("user_anonymous_id_saved", "abc.1")
            .http_only()
            .max_age(DEFAULT_MAX_AGE_SECS);
        assert_eq!(
            cookie.render(false, "comparethemarket.com.au"),
            "user_anonymous_id_saved=abc.1; path=/; Secure; SameSite=Strict; Max-Age=34560000; HttpOnly; Domain=comparethemarket.com.au;"
        );
        assert_eq!(
            SetCookie::new("a", "").expires(EXPIRED).domain("www.iselect.com.au").render(false, "x"),
            "a=; path=/; Secure; SameSite=Strict; expires=Thu, 01 Jan 1970 00:00:00 GMT; Domain=www.iselect.com.au;"
        );
        assert!(cookie.render(true, "comparethemarket.com.au").ends_with("; Domain=localhost;"));
    }

    #[test]
    fn plan_covers_every_cookie_state() {
        assert_eq!(plan(None, None, NOW), JarAction::Create);
        assert_eq!(plan(None, Some("abc.1"), NOW), JarAction::Create);
        assert_eq!(plan(Some("abc.1"), None, NOW), JarAction::Restore("abc".into()));
        assert_eq!(plan(Some("abc.1"), Some("xyz.2"), NOW), JarAction::Restore("abc".into()));
        assert_eq!(plan(Some("abc.1000"), Some("abc.1000"), NOW), JarAction::Renew("abc".into()));

        let fresh = format!("abc.{}", NOW - 1000);
        assert_eq!(plan(Some(&fresh), Some(&fresh), NOW), JarAction::Keep);
        assert_eq!(plan(Some("abc"), Some("abc"), NOW), JarAction::Keep);
    }

    #[test]
    fn stale_pair_is_renewed_with_the_same_id() {
        let req = request("user_anonymous_id=ABC.1000; user_anonymous_id_saved=ABC.1000");
        let res = jar(false)
            .apply_at(&req, &EdgeResponse::new(StatusCode::OK), NOW)
            .unwrap()
            .unwrap();

        let cookies: Vec<&str> = res.set_cookies().collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with(&format!("user_anonymous_id=ABC.{NOW}; ")));
        assert!(cookies[1].starts_with(&format!("user_anonymous_id_saved=ABC.{NOW}; ")));
        assert!(cookies[1].contains("HttpOnly"));
    }

    #[test]
    fn fresh_pair_is_left_alone() {
        let jar = jar(false);
        let req = request("user_anonymous_id=ABC.1000; user_anonymous_id_saved=ABC.1000");
        let res = EdgeResponse::new(StatusCode::OK);

        assert!(jar.apply_at(&req, &res, 1000 + RENEWAL_PERIOD_MS).unwrap().is_none());
        assert!(jar.apply_at(&req, &res, 2000).unwrap().is_none());
    }

    #[test]
    fn new_visitor_gets_matching_cookies() {
        let req = EdgeRequest::get("http://localhost:8787/").unwrap();
        let res = jar(true)
            .apply_at(&req, &EdgeResponse::new(StatusCode::OK), NOW)
            .unwrap()
            .unwrap();

        let first = res.set_cookie_value("user_anonymous_id").unwrap();
        let second = res.set_cookie_value("user_anonymous_id_saved").unwrap();
        assert_eq!(first, second);
        assert!(first.ends_with(&format!(".{NOW}")));
        assert!(res.set_cookies().all(|c| c.ends_with("; Domain=localhost;")));
    }
}
