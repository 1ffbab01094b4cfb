//! Middleware pipeline.
//!
//! # Data Flow
//! ```text
//! EdgeRequest
//!     → registry.rs (every registration matching the original path, in order)
//!     → executor.rs (request middleware: Continue(request) | ShortCircuit(response))
//!     → origin fetch (only when no response exists yet)
//!     → executor.rs (response middleware, early return per registration)
//!     → orchestrator.rs (finalizer flushes header scripts once)
//!     → EdgeResponse
//! ```
//!
//! # Design Decisions
//! - Registrations are cumulative: all matches run, not just the first
//! - Ordering is a `Phase` tag checked when tables are validated
//! - One sequential task per request; the context is never shared

pub mod context;
pub mod error;
pub mod executor;
pub mod middleware;
pub mod orchestrator;
pub mod registry;

pub use context::{ContextConfig, HeaderScripts, RequestContext, ResponseContext};
pub use error::{PipelineError, RegistryError};
pub use middleware::{Outcome, RequestMiddleware, RequestStep, ResponseMiddleware, ResponseStep};
pub use orchestrator::{Finalizer, Pipeline, PipelineState};
pub use registry::{
    Phase, Registration, Registrations, RequestRegistration, ResponseRegistration,
};
