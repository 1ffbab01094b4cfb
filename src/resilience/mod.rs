//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Optional subrequest (threat verify, tag manager, chat bootstrap)
//!     → timeouts.rs (deadline, fail open on timeout or error)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - No retries: a failed request fails, a failed optional step is skipped

pub mod timeouts;

pub use timeouts::fail_open;
