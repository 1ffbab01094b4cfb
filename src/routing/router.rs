//! Per-request dispatch.
//!
//! # Responsibilities
//! - Apply the environment adapter around the pipeline
//! - Select the site and build its tables from the config snapshot
//! - Run the pipeline and hand back the final response
//!
//! # Design Decisions
//! - Stateless between requests apart from the shared fetcher and cache
//! - Tables are built from the snapshot the request started with, so a
//!   config reload never changes a request in flight

use std::sync::Arc;

use crate::config::RouterConfig;
use crate::environment::{
    guard_recursion, handle_feature_branch_request, handle_feature_branch_response, is_test_mode,
    validate_feature_branch_middleware,
};
use crate::http::{EdgeCache, EdgeRequest, EdgeResponse, Fetch};
use crate::middlewares::Catalog;
use crate::pipeline::{ContextConfig, Outcome, Pipeline, PipelineError};
use crate::routing::site::Site;
use crate::routing::tables;

/// A routed response, with the site that served it when the pipeline ran.
#[derive(Debug)]
pub struct Routed {
    pub site: Option<Site>,
    pub response: EdgeResponse,
}

impl Routed {
    fn answered(response: EdgeResponse) -> Self {
        Self { site: None, response }
    }
}

/// Entry point for every inbound request.
#[derive(Clone)]
pub struct EdgeRouter {
    fetcher: Arc<dyn Fetch>,
    cache: EdgeCache,
}

impl EdgeRouter {
    pub fn new(fetcher: Arc<dyn Fetch>, cache: EdgeCache) -> Self {
        Self { fetcher, cache }
    }

    pub async fn route(&self, config: Arc<RouterConfig>, request: EdgeRequest) -> Result<Routed, PipelineError> {
        let test_mode = is_test_mode(&config, &request);
        let method = request.method().clone();

        let (settings, outcome) = handle_feature_branch_request(request, &config, self.fetcher.as_ref()).await?;
        let request = match outcome {
            Outcome::Continue(request) => request,
            Outcome::ShortCircuit(response) => return Ok(Routed::answered(response)),
        };

        let request = match guard_recursion(request, test_mode)? {
            Outcome::Continue(request) => request,
            Outcome::ShortCircuit(response) => return Ok(Routed::answered(response)),
        };

        let site = Site::select(&request, &config.sites);
        let local = test_mode || settings.is_feature_subdomain;
        let catalog = Catalog::new(config.clone(), self.fetcher.clone(), self.cache.clone());
        let mut registrations = tables::build(site, &catalog, local)?;
        validate_feature_branch_middleware(&settings, config.environment.stage, &mut registrations);

        tracing::debug!(site = %site, local, feature_tag = %settings.feature_tag, "Site selected");

        let response = Pipeline::new(registrations, self.fetcher.clone())
            .handle(request, ContextConfig::FeatureBranch(settings.clone()))
            .await?;
        let response = handle_feature_branch_response(&settings, &config, response, &method)?;

        Ok(Routed {
            site: Some(site),
            response,
        })
    }
}
