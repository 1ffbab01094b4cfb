//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, body buffering)
//!     → request.rs (EdgeRequest value)
//!     → routing::EdgeRouter (site tables + pipeline)
//!     → origin.rs / cache.rs (the one origin fetch, third-party scripts)
//!     → response.rs (EdgeResponse → Axum response)
//!     → Send to client
//! ```

pub mod cache;
pub mod origin;
pub mod request;
pub mod response;
pub mod server;

pub use cache::EdgeCache;
pub use origin::{Fetch, FetchError, HttpOrigin};
pub use request::{cookie_value, request_id_layer, EdgeRequest, RequestIdLayer, X_REQUEST_ID};
pub use response::EdgeResponse;
pub use server::{into_edge_request, HttpServer};
