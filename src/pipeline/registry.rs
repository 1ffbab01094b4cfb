//! Route registrations.
//!
//! Every registration whose pattern matches the request path runs, in
//! registration order. Each registration carries a [`Phase`]; a table whose
//! phases go backwards is rejected by [`Registrations::validate`].

use crate::pipeline::error::RegistryError;
use crate::pipeline::middleware::{RequestMiddleware, ResponseMiddleware};
use crate::pipeline::orchestrator::Finalizer;
use crate::routing::matcher::RoutePattern;

/// Ordering band of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Environment reroutes that must see the request first.
    Preflight,
    /// Routes for specific paths.
    PathSpecific,
    /// Catch-all middleware that runs after everything else.
    Global,
}

/// A pattern plus the middleware list it triggers.
#[derive(Debug, Clone)]
pub struct Registration<M> {
    pattern: RoutePattern,
    middleware: Vec<M>,
    phase: Phase,
    early_return: bool,
}

pub type RequestRegistration = Registration<RequestMiddleware>;
pub type ResponseRegistration = Registration<ResponseMiddleware>;

impl<M> Registration<M> {
    /// A path-specific registration.
    pub fn path(pattern: &str, middleware: Vec<M>) -> Result<Self, RegistryError> {
        Ok(Self {
            pattern: RoutePattern::new(pattern)?,
            middleware,
            phase: Phase::PathSpecific,
            early_return: false,
        })
    }

    /// A preflight registration.
    pub fn preflight(pattern: &str, middleware: Vec<M>) -> Result<Self, RegistryError> {
        Ok(Self {
            phase: Phase::Preflight,
            ..Self::path(pattern, middleware)?
        })
    }

    /// A catch-all registration that runs last.
    pub fn global(middleware: Vec<M>) -> Self {
        Self {
            pattern: RoutePattern::any(),
            middleware,
            phase: Phase::Global,
            early_return: false,
        }
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn middleware(&self) -> &[M] {
        &self.middleware
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.matches_path(path)
    }
}

impl Registration<ResponseMiddleware> {
    /// Finalize right after this registration's list completes.
    pub fn early_return(mut self) -> Self {
        self.early_return = true;
        self
    }

    pub fn is_early_return(&self) -> bool {
        self.early_return
    }
}

/// The full set of tables for one request.
#[derive(Debug, Clone)]
pub struct Registrations {
    request: Vec<RequestRegistration>,
    response: Vec<ResponseRegistration>,
    finalizer: Finalizer,
}

impl Registrations {
    pub fn new(request: Vec<RequestRegistration>, response: Vec<ResponseRegistration>) -> Self {
        Self {
            request,
            response,
            finalizer: Finalizer::default(),
        }
    }

    pub fn with_finalizer(mut self, finalizer: Finalizer) -> Self {
        self.finalizer = finalizer;
        self
    }

    pub fn request(&self) -> &[RequestRegistration] {
        &self.request
    }

    pub fn response(&self) -> &[ResponseRegistration] {
        &self.response
    }

    pub fn finalizer(&self) -> &Finalizer {
        &self.finalizer
    }

    /// Request registrations matching `path`, in order.
    pub fn matching_request<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a RequestRegistration> {
        self.request.iter().filter(move |r| r.matches(path))
    }

    /// Response registrations matching `path`, in order.
    pub fn matching_response<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ResponseRegistration> {
        self.response.iter().filter(move |r| r.matches(path))
    }

    /// Put preflight registrations ahead of everything else.
    pub fn prepend_request(&mut self, preflight: Vec<RequestRegistration>) {
        self.request.splice(0..0, preflight);
    }

    /// Drop every registration and pass the response through untouched.
    pub fn disable_all(&mut self) {
        self.request.clear();
        self.response.clear();
        self.finalizer = Finalizer::Passthrough;
    }

    /// Check that phases never decrease in registration order.
    pub fn validate(&self) -> Result<(), RegistryError> {
        check_order("request", &self.request)?;
        check_order("response", &self.response)
    }
}

fn check_order<M>(table: &'static str, registrations: &[Registration<M>]) -> Result<(), RegistryError> {
    let mut previous = Phase::Preflight;
    for (index, registration) in registrations.iter().enumerate() {
        if registration.phase < previous {
            return Err(RegistryError::PhaseOrder {
                table,
                index,
                pattern: registration.pattern().to_string(),
                phase: registration.phase,
                previous,
            });
        }
        previous = registration.phase;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(regs: &Registrations, path: &str) -> Vec<String> {
        regs.matching_request(path)
            .map(|r| r.pattern().to_string())
            .collect()
    }

    #[test]
    fn every_matching_registration_is_returned_in_order() {
        let regs = Registrations::new(
            vec![
                Registration::path("/ctm/*", vec![]).unwrap(),
                Registration::path("/metrics*", vec![]).unwrap(),
                Registration::path("/ctm/simples/*", vec![]).unwrap(),
                Registration::global(vec![]),
            ],
            vec![],
        );

        assert_eq!(names(&regs, "/ctm/simples/home.jsp"), vec!["/ctm/*", "/ctm/simples/*", "*"]);
        assert_eq!(names(&regs, "/metrics"), vec!["/metrics*", "*"]);
    }

    #[test]
    fn decreasing_phases_are_rejected() {
        let regs = Registrations::new(
            vec![
                Registration::global(vec![]),
                Registration::path("/ctm/*", vec![]).unwrap(),
            ],
            vec![],
        );

        match regs.validate() {
            Err(RegistryError::PhaseOrder { table, index, .. }) => {
                assert_eq!(table, "request");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn preflight_prepends_and_stays_valid() {
        let mut regs = Registrations::new(
            vec![
                Registration::path("/ctm/*", vec![]).unwrap(),
                Registration::global(vec![]),
            ],
            vec![],
        );
        regs.prepend_request(vec![
            Registration::preflight("/*", vec![]).unwrap(),
            Registration::preflight("/ctm/*", vec![]).unwrap(),
        ]);

        assert!(regs.validate().is_ok());
        assert_eq!(regs.request()[0].phase(), Phase::Preflight);
        assert_eq!(regs.request().len(), 4);
    }

    #[test]
    fn disable_all_switches_to_passthrough() {
        let mut regs = Registrations::new(
            vec![Registration::global(vec![])],
            vec![Registration::path("/wp-admin/*", vec![]).unwrap().early_return()],
        );
        assert!(regs.response()[0].is_early_return());

        regs.disable_all();
        assert!(regs.request().is_empty());
        assert!(regs.response().is_empty());
        assert_eq!(regs.finalizer(), &Finalizer::Passthrough);
    }
}
