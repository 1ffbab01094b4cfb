//! Edge middleware router for the comparison brand sites.

pub mod config;
pub mod environment;
pub mod html;
pub mod http;
pub mod lifecycle;
pub mod middlewares;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod routing;

pub use config::RouterConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::EdgeRouter;
