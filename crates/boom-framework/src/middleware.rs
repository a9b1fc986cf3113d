//! Middleware bindings.
//!
//! A middleware is a [`Callable`](boom_core::Callable) bound to a [`Phase`].
//! Global middlewares live on the application; layered middlewares live on a
//! router node and apply to every route at or below that node's template.
//!
//! Request-phase middlewares run before the handler; the first one that
//! returns a response short-circuits the handler. Response-phase middlewares
//! run after it and may read the outgoing response through a parameter named
//! `response`; the first one that returns a response replaces it.

use std::collections::HashSet;
use std::fmt;

use boom_core::BoxedCallable;
use http::Method;
use serde::{Deserialize, Serialize};

/// When a middleware runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Request,
    Response,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Request => "request",
            Self::Response => "response",
        })
    }
}

/// Every standard method; the default method set of a layered middleware.
pub fn all_methods() -> HashSet<Method> {
    HashSet::from([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
        Method::HEAD,
        Method::OPTIONS,
        Method::CONNECT,
        Method::TRACE,
    ])
}

/// A middleware bound to a phase and, when layered, to a template.
#[derive(Clone)]
pub struct Middleware {
    callable: BoxedCallable,
    phase: Phase,
    methods: HashSet<Method>,
    scope: String,
}

impl Middleware {
    pub fn new(
        callable: BoxedCallable,
        phase: Phase,
        methods: HashSet<Method>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            callable,
            phase,
            methods,
            scope: scope.into(),
        }
    }

    /// A global middleware: every method, scope `/`.
    pub fn global(callable: BoxedCallable, phase: Phase) -> Self {
        Self::new(callable, phase, all_methods(), "/")
    }

    pub fn callable(&self) -> &BoxedCallable {
        &self.callable
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The template this middleware is layered on.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn applies_to(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("callable", &self.callable.signature().name())
            .field("phase", &self.phase)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
