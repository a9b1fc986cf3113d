//! Error types shared by every Boom layer.
//!
//! Registration-time variants ([`BoomError::RouteConflict`],
//! [`BoomError::InvalidRoute`], [`BoomError::InvalidComponent`],
//! [`BoomError::NoApplicationBound`]) are fatal to startup. Everything else is
//! raised while a request is being handled and travels, unmodified, up to the
//! dispatch loop, which is the single place that turns it into a response via
//! [`BoomError::status`].

use std::collections::HashSet;
use std::time::Duration;

use http::{Method, StatusCode};
use thiserror::Error;

/// Opaque error produced by user code (handlers, middlewares, component fetches).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the router, the resolver, the cache engine and dispatch.
#[derive(Debug, Error)]
pub enum BoomError {
    /// A route name or an unambiguous (path, method) pair is already taken.
    #[error("route conflict: {0}")]
    RouteConflict(String),

    /// A template or method list was rejected while registering.
    #[error("invalid route `{uri}`: {reason}")]
    InvalidRoute {
        /// The template as supplied.
        uri: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No node in the route tree matches the path.
    #[error("no route matches `{path}`")]
    RouteNotFound {
        /// The requested path.
        path: String,
    },

    /// The path matched, but not for this method.
    #[error("method {method} not allowed for `{path}`")]
    MethodNotAllowed {
        /// The requested method.
        method: Method,
        /// The requested path.
        path: String,
        /// Methods that do have a route at this path.
        allowed: HashSet<Method>,
    },

    /// `url_for` could not produce a URL.
    #[error("could not build url: {0}")]
    UrlBuild(String),

    /// No registered component claims the parameter.
    #[error("unable to resolve parameter `{name}` of `{callable}`")]
    UnresolvableParameter {
        /// Parameter name.
        name: String,
        /// Name of the callable that declared it.
        callable: String,
    },

    /// A prefetched scalar could not be coerced to its declared annotation.
    #[error("invalid value `{value}` for parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// The raw value that failed to parse.
        value: String,
        /// Parse failure.
        reason: String,
    },

    /// A resolved argument was missing or of another type than requested.
    #[error("argument `{name}` is unavailable: {reason}")]
    Argument {
        /// Argument name.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// A component's `fetch` failed; the source is passed through untouched.
    #[error("component `{component}` failed to fetch `{param}`")]
    ComponentFetch {
        /// Component type name.
        component: &'static str,
        /// Parameter being filled.
        param: String,
        /// Whatever the component returned.
        #[source]
        source: BoxError,
    },

    /// A handler or middleware returned an error.
    #[error("`{callable}` failed")]
    Handler {
        /// Name of the failing callable.
        callable: String,
        /// Whatever the callable returned.
        #[source]
        source: BoxError,
    },

    /// A component does not satisfy the component contract.
    #[error("invalid component `{component}`: {reason}")]
    InvalidComponent {
        /// Component type name.
        component: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A component was registered on a resolver with no application bound.
    #[error("component `{0}` registered before an application was bound")]
    NoApplicationBound(&'static str),

    /// Request handling was cancelled before it produced a response.
    #[error("request handling was cancelled")]
    Cancelled,

    /// Request handling exceeded the response timeout.
    #[error("response timed out after {0:?}")]
    Timeout(Duration),

    /// Free-form error.
    #[error("{0}")]
    Custom(String),
}

impl BoomError {
    /// Creates a custom error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates an [`InvalidRoute`](Self::InvalidRoute) error.
    pub fn invalid_route(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRoute {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Creates an [`Argument`](Self::Argument) error.
    pub fn argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Argument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Wraps a component fetch failure.
    ///
    /// Errors that already are a [`BoomError`] (a nested dependency that could
    /// not be resolved, a cancellation) pass through unchanged.
    pub fn from_fetch(component: &'static str, param: &str, err: BoxError) -> Self {
        match err.downcast::<BoomError>() {
            Ok(inner) => *inner,
            Err(source) => Self::ComponentFetch {
                component,
                param: param.to_string(),
                source,
            },
        }
    }

    /// Wraps a handler or middleware failure, passing [`BoomError`]s through.
    pub fn from_handler(callable: &str, err: BoxError) -> Self {
        match err.downcast::<BoomError>() {
            Ok(inner) => *inner,
            Err(source) => Self::Handler {
                callable: callable.to_string(),
                source,
            },
        }
    }

    /// Returns `true` for cancellation and timeouts.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout(_))
    }

    /// The status class the dispatch loop reports for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            Self::Cancelled | Self::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type for Boom operations.
pub type BoomResult<T> = Result<T, BoomError>;
