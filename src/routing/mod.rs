//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (host, path, cookies)
//!     → router.rs (feature branch + recursion guard)
//!     → site.rs (brand from host)
//!     → tables/ (registrations for that brand, local reroutes in front)
//!     → pipeline
//! ```
//!
//! # Design Decisions
//! - Patterns compile when a table is built; tables are plain data
//! - Cumulative: every matching registration runs, in table order
//! - Deterministic: same config and request always build the same tables

pub mod matcher;
pub mod router;
pub mod site;
pub mod tables;

pub use matcher::{HostMatcher, Matcher, RoutePattern};
pub use router::{EdgeRouter, Routed};
pub use site::Site;
