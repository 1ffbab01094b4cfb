//! Google Tag Manager, served through our own domain.

use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::html::{self, InjectLocation, Script};
use crate::http::{EdgeCache, EdgeResponse};
use crate::middlewares::scripts::ScriptProxy;
use crate::pipeline::{PipelineError, ResponseContext, ResponseStep};

pub const GTM_UPSTREAM: &str = "https://www.googletagmanager.com/gtm.js";
pub const GTM_PROXY_PATH: &str = "metrics";
pub const GTM_EDGE_TTL: Duration = Duration::from_secs(30);
pub const GTM_BROWSER_MAX_AGE: u64 = 180;

/// Container keys per brand.
pub mod keys {
    pub const WHITE_LABEL: &str = "GTM-PZJR3D3";
    pub const CTM_JOURNEY: &str = "GTM-PW6ZGHG";
    pub const ISELECT: &str = "GTM-KDTNBVB4";
    pub const CHOOSI: &str = "GTM-TTFV6KJ";
}

const GTM_SNIPPET: &str = r#"<script data-cfasync="false">(function(w,d,s,l,i){w[l]=w[l]||[];w[l].push({'gtm.start':
new Date().getTime(),event:'gtm.js'});var f=d.getElementsByTagName(s)[0],
j=d.createElement(s),dl=l!='dataLayer'?'&l='+l:'';j.async=true;j.src=
'https://$HOST/$PROXY_PATH?id='+i+dl;f.parentNode.insertBefore(j,f);
})(window,document,'script','dataLayer','$GTM_KEY');</script>"#;

/// Proxy step answering `/metrics?id=...` with the GTM container.
pub fn retrieve_gtm_container(cache: EdgeCache, timeout: Duration) -> ScriptProxy {
    ScriptProxy::new("gtm", GTM_UPSTREAM, GTM_EDGE_TTL, GTM_BROWSER_MAX_AGE, cache, timeout)
}

/// Loader snippet for container `key`, fetched through `host`.
pub fn gtm_snippet(key: &str, host: &str) -> String {
    Script::template(GTM_SNIPPET)
        .param("HOST", host)
        .param("PROXY_PATH", GTM_PROXY_PATH)
        .param("GTM_KEY", key)
        .render()
}

/// Injects the GTM loader into HTML responses.
#[derive(Debug, Clone)]
pub struct InjectGtmScript {
    location: InjectLocation,
    snippet: String,
}

impl InjectGtmScript {
    pub fn new(location: InjectLocation, key: &str, host: &str) -> Self {
        Self {
            location,
            snippet: gtm_snippet(key, host),
        }
    }
}

impl ResponseStep for InjectGtmScript {
    fn run<'a>(
        &'a self,
        ctx: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<Option<EdgeResponse>, PipelineError>> {
        Box::pin(async move { Ok(html::inject_into_html(ctx.response(), &self.snippet, self.location)?) })
    }
}
