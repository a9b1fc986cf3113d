//! # Boom Framework
//!
//! Routing, dependency resolution and dispatch for Boom applications.
//!
//! This layer provides:
//! - A segment-tree [`Router`] with layered middlewares, a lookup memo and
//!   reverse URL building
//! - The [`Resolver`], which fills callable parameters from path values, the
//!   request and registered components
//! - The [`CacheEngine`], which reuses component values at their declared
//!   lifecycle
//! - The [`Boom`] application with its dispatch loop, error handler and
//!   tower service
//!
//! Leaf types (requests, signatures, components) come from `boom-core`.

pub mod app;
pub mod cache;
pub mod error_handler;
pub mod middleware;
pub mod resolver;
pub mod router;
pub mod timeout;
pub mod view;

pub use app::{Boom, BoomBuilder, BoomService};
pub use cache::{AppKey, AppStore, CacheEngine, ProcessStore};
pub use error_handler::{DefaultErrorHandler, ErrorHandler};
pub use middleware::{Middleware, Phase, all_methods};
pub use resolver::{DEFAULT_RESOLVER_CACHE_SIZE, Prefetch, Prefetched, Resolver};
pub use router::{
    DEFAULT_LOOKUP_CACHE_SIZE, Route, RouteMatch, RouteOptions, Router, UrlOptions, UrlParam,
};
pub use timeout::{ResponseTimeout, ResponseTimeoutLayer};
pub use view::MethodView;

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        Boom, BoomBuilder, ErrorHandler, MethodView, Phase, Prefetched, ProcessStore,
        RouteOptions, UrlOptions, UrlParam,
    };
    pub use boom_core::prelude::*;
}
