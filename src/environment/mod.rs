//! Per-request environment adapter.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → feature_branch.rs (detect tag, maybe 307 back to the feature host)
//!     → recursion.rs (loop counter, 404 after too many passes)
//!     → site tables (+ local preflight reroutes in testing mode)
//!     → feature_branch.rs (maybe disable every middleware)
//!     → pipeline
//!     → feature_branch.rs (feature cookie, 301/302 → 308)
//! ```

pub mod feature_branch;
pub mod recursion;

pub use feature_branch::{
    handle_feature_branch_request, handle_feature_branch_response,
    validate_feature_branch_middleware, FeatureBranchSettings,
};
pub use recursion::guard_recursion;

use crate::config::RouterConfig;
use crate::http::EdgeRequest;

/// Cookie that switches a single browser into testing mode.
pub const TEST_MODE_COOKIE: &str = "cf_worker_test_mode";

/// Testing mode is on when configured or requested by cookie.
pub fn is_test_mode(config: &RouterConfig, request: &EdgeRequest) -> bool {
    config.environment.testing
        || request
            .cookie(TEST_MODE_COOKIE)
            .is_some_and(|value| !value.is_empty())
}

/// Page origin prefix for most page projects.
pub fn default_page_prefix(config: &RouterConfig) -> &str {
    &config.environment.cf_page_prefix
}

/// The pet project deploys its UAT build under `merge.`.
pub fn pet_page_prefix(config: &RouterConfig) -> &str {
    match config.environment.cf_page_prefix.as_str() {
        "uat." => "merge.",
        other => other,
    }
}

/// Enterprise projects deploy their UAT build under `stg.`.
pub fn stage_page_prefix(config: &RouterConfig) -> &str {
    match config.environment.cf_page_prefix.as_str() {
        "uat." => "stg.",
        other => other,
    }
}
