//! Genesys chat widget, served through our own domain.

use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::config::Stage;
use crate::html::{self, InjectLocation, Script};
use crate::http::{EdgeCache, EdgeResponse};
use crate::middlewares::scripts::ScriptProxy;
use crate::pipeline::{PipelineError, ResponseContext, ResponseStep};

pub const CHAT_UPSTREAM: &str = "https://apps.mypurecloud.com.au/genesys-bootstrap/genesys.min.js";
pub const CHAT_PROXY_PATH: &str = "chat";
pub const CHAT_EDGE_TTL: Duration = Duration::from_secs(300);
pub const CHAT_BROWSER_MAX_AGE: u64 = 300;

/// Chat deployment per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatContainerIds {
    pub prod: &'static str,
    pub non_prod: &'static str,
}

impl ChatContainerIds {
    pub fn for_stage(&self, stage: Stage) -> &'static str {
        match stage {
            Stage::Prod => self.prod,
            Stage::Dev | Stage::Uat => self.non_prod,
        }
    }
}

pub const CTM_CAR: ChatContainerIds = ChatContainerIds {
    prod: "95c2732b-2892-4b13-9e66-f310ec93c28f",
    non_prod: "1206c75c-1f48-4983-a538-2c7541e1800e",
};

pub const ISELECT_CAR: ChatContainerIds = ChatContainerIds {
    prod: "4ab464e5-10c0-432f-b683-e8e102cd1538",
    non_prod: "1c27c005-4a94-434f-b535-995933560e50",
};

const CHAT_SNIPPET: &str = r#"<script data-cfasync="false" type="text/javascript" charset="utf-8">
  (function (g, e, n, es, ys) {
    g['_genesysJs'] = e;
    g[e] = g[e] || function () {
      (g[e].q = g[e].q || []).push(arguments)
    };
    g[e].t = 1 * new Date();
    g[e].c = es;
    ys = document.createElement('script'); ys.async = 1; ys.src = n; ys.charset = 'utf-8'; document.head.appendChild(ys);
  })(window, 'Genesys', '$PROXY_URL', {
    environment: 'apse2',
    deploymentId: '$DEPLOYMENT_ID'
  });
</script>"#;

/// Proxy step answering `/chat` with the Genesys bootstrap script.
pub fn retrieve_chat_container(cache: EdgeCache, timeout: Duration) -> ScriptProxy {
    ScriptProxy::new("chat", CHAT_UPSTREAM, CHAT_EDGE_TTL, CHAT_BROWSER_MAX_AGE, cache, timeout)
}

/// Injects the chat loader pointing at `https://<host>/chat`.
#[derive(Debug, Clone)]
pub struct InjectChatScript {
    location: InjectLocation,
    snippet: String,
}

impl InjectChatScript {
    pub fn new(location: InjectLocation, ids: ChatContainerIds, host: &str, stage: Stage) -> Self {
        let snippet = Script::template(CHAT_SNIPPET)
            .param("PROXY_URL", format!("https://{host}/{CHAT_PROXY_PATH}"))
            .param("DEPLOYMENT_ID", ids.for_stage(stage))
            .render();
        Self { location, snippet }
    }
}

impl ResponseStep for InjectChatScript {
    fn run<'a>(
        &'a self,
        ctx: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<Option<EdgeResponse>, PipelineError>> {
        Box::pin(async move { Ok(html::inject_into_html(ctx.response(), &self.snippet, self.location)?) })
    }
}
