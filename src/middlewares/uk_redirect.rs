//! UK visitor prompt.
//!
//! Visitors from GB or IE are flagged on the request; the response side then
//! injects a modal offering the UK site. Verified crawlers and visitors who
//! already chose to stay (cookie set by the modal) are left alone.

use axum::http::header::{HeaderName, HeaderValue};
use futures_util::future::BoxFuture;
use uuid::Uuid;

use crate::html::{self, InjectLocation, Script};
use crate::http::{EdgeRequest, EdgeResponse};
use crate::pipeline::{Outcome, PipelineError, RequestContext, ResponseContext};

/// Cookie set by the modal, and header set on flagged requests.
pub const NO_UK_REDIRECT_KEY: &str = "X-NO-UK-Redirect";

const UK_COUNTRY_CODES: [&str; 2] = ["GB", "IE"];
const COUNTRY_HEADER: &str = "cf-ipcountry";
const VERIFIED_BOT_HEADER: &str = "x-ctm-bot-verified";

const MODAL_SCRIPT: &str = r#"(function () {
    const ukRedirectUrl = "//www.comparethemarket.com/";
    const modal = document.getElementById("$MODAL_ID");
    const stay = modal.querySelector("button.stay-in-au");
    const leave = modal.querySelector("button.return-to-uk");
    window.dataLayer = window.dataLayer || [];

    function close() {
        document.cookie = "$NO_UKREDIRECT_KEY=true; path=/; Secure; SameSite=Strict; Max-Age=34560000";
        modal.classList.remove("d-show");
        modal.classList.add("d-none");
        document.body.classList.remove("no-scrolls");
    }

    stay.addEventListener("click", function () {
        window.dataLayer.push({ event: "INTERACTION_EVENT", interaction: { ixn_object: "UK redirect modal", ixn_label: "Yes, keep me here" } });
        close();
    });
    leave.addEventListener("click", function () {
        const target = ukRedirectUrl + "?redirectPath=" + window.location.pathname;
        window.dataLayer.push({ event: "INTERACTION_EVENT", interaction: { ixn_object: "UK redirect modal", ixn_link: target } });
        window.location.href = target;
    });

    modal.classList.remove("d-none");
    modal.classList.add("d-show");
    document.body.classList.add("no-scrolls");
})();"#;

const MODAL_CSS: &str = ".d-none { display: none; } .d-show { display: flex; } .no-scrolls { overflow: hidden; } \
.modal-bg { position: fixed; inset: 0; z-index: 9999; align-items: center; justify-content: center; background: rgba(0, 20, 67, 0.6); } \
.modal { display: flex; flex-direction: column; gap: 16px; padding: 32px; border-radius: 12px; background-color: #fff; } \
.modal button { font-weight: 700; font-size: 20px; padding: 30px 40px; border: 2px solid #ECEBEB; border-radius: 12px; }";

/// Modal markup with a fresh element id.
pub fn uk_modal_html() -> String {
    let modal_id = Uuid::new_v4().to_string();
    let script = Script::template(MODAL_SCRIPT)
        .param("MODAL_ID", &modal_id)
        .param("NO_UKREDIRECT_KEY", NO_UK_REDIRECT_KEY)
        .render();
    format!(
        r#"<div id="{modal_id}" class="modal-bg d-none">
        <div class="modal">
            <h5 class="modal-title">Did you mean to visit our Australian site?</h5>
            <button type="button" class="stay-in-au" aria-label="Stay in AU Button">Yes, keep me here</button>
            <button type="button" class="return-to-uk" aria-label="Return to UK Button">No, go to the UK site</button>
        </div>
    </div><script id="ukPopupModalJS">{script}</script><style id="ukPopupModalCSS">{MODAL_CSS}</style>"#
    )
}

/// True when the visitor should see the UK prompt.
pub fn is_uk_visitor(request: &EdgeRequest) -> bool {
    let from_uk = request
        .header(COUNTRY_HEADER)
        .is_some_and(|code| UK_COUNTRY_CODES.contains(&code));
    let verified_bot = request.header(VERIFIED_BOT_HEADER) == Some("true");
    let opted_out = request.cookie(NO_UK_REDIRECT_KEY).as_deref() == Some("true");
    from_uk && !verified_bot && !opted_out
}

/// Request side: flag UK visitors with `X-NO-UK-Redirect: false`.
pub fn uk_redirecter(ctx: &mut RequestContext) -> BoxFuture<'_, Result<Outcome, PipelineError>> {
    Box::pin(async move {
        let request = ctx.request().clone();
        if !is_uk_visitor(&request) {
            return Ok(Outcome::Continue(request));
        }
        tracing::debug!("UK visitor, flagging for the redirect prompt");
        Ok(Outcome::Continue(request.with_header(
            HeaderName::from_static("x-no-uk-redirect"),
            HeaderValue::from_static("false"),
        )))
    })
}

/// Response side: inject the prompt for flagged requests.
pub fn uk_redirect_injector(ctx: &mut ResponseContext) -> BoxFuture<'_, Result<Option<EdgeResponse>, PipelineError>> {
    Box::pin(async move {
        if ctx.request().header(NO_UK_REDIRECT_KEY) != Some("false") {
            return Ok(None);
        }
        Ok(html::inject_into_html(ctx.response(), &uk_modal_html(), InjectLocation::BodyEnd)?)
    })
}
