//! HTML rewriting on top of the `lol_html` streaming rewriter.
//!
//! Every helper is content-type gated: responses that are not `text/html`
//! come back as `None` and callers keep the response they already have.

mod script;

pub use script::Script;

use lol_html::html_content::ContentType;
use lol_html::{element, HtmlRewriter, Settings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::EdgeResponse;

/// Where content is placed inside the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectLocation {
    HeadStart,
    HeadEnd,
    BodyStart,
    BodyEnd,
}

impl InjectLocation {
    fn selector(self) -> &'static str {
        match self {
            InjectLocation::HeadStart | InjectLocation::HeadEnd => "head",
            InjectLocation::BodyStart | InjectLocation::BodyEnd => "body",
        }
    }

    fn appends(self) -> bool {
        matches!(self, InjectLocation::HeadEnd | InjectLocation::BodyEnd)
    }
}

#[derive(Debug, Error)]
pub enum HtmlError {
    #[error("html rewrite failed: {0}")]
    Rewrite(#[from] lol_html::errors::RewritingError),
}

/// Insert raw HTML at `location`. `None` when the response is not HTML.
pub fn inject_into_html(
    response: &EdgeResponse,
    content: &str,
    location: InjectLocation,
) -> Result<Option<EdgeResponse>, HtmlError> {
    if !response.is_html() {
        return Ok(None);
    }

    let appends = location.appends();
    let handler = element!(location.selector(), move |el| {
        if appends {
            el.append(content, ContentType::Html);
        } else {
            el.prepend(content, ContentType::Html);
        }
        Ok(())
    });

    let body = rewrite(response.body(), vec![handler])?;
    Ok(Some(response.clone().with_body(body)))
}

/// Wrap scripts in one `<script>` element and inject it.
///
/// `None` when there is nothing to inject or the response is not HTML.
pub fn inject_scripts(
    response: &EdgeResponse,
    scripts: &[String],
    location: InjectLocation,
) -> Result<Option<EdgeResponse>, HtmlError> {
    if scripts.is_empty() {
        return Ok(None);
    }
    let mut content = String::from("\n<script>\n");
    for script in scripts {
        content.push_str(script);
        content.push('\n');
    }
    content.push_str("</script>\n");
    inject_into_html(response, &content, location)
}

/// Set `attribute` on every element matching `selector` that already has it.
pub fn rewrite_attribute(
    response: &EdgeResponse,
    selector: &str,
    attribute: &str,
    value: &str,
) -> Result<Option<EdgeResponse>, HtmlError> {
    if !response.is_html() {
        return Ok(None);
    }

    let handler = element!(selector, move |el| {
        if el.get_attribute(attribute).is_some() {
            el.set_attribute(attribute, value)?;
            tracing::debug!(attribute, value, "Rewrote attribute");
        }
        Ok(())
    });

    let body = rewrite(response.body(), vec![handler])?;
    Ok(Some(response.clone().with_body(body)))
}

fn rewrite<'h>(
    input: &[u8],
    handlers: Vec<(
        std::borrow::Cow<'static, lol_html::Selector>,
        lol_html::ElementContentHandlers<'h>,
    )>,
) -> Result<Vec<u8>, HtmlError> {
    let mut output = Vec::with_capacity(input.len() + 256);
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );
    rewriter.write(input)?;
    rewriter.end()?;
    Ok(output)
}
