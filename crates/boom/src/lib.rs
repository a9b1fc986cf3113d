//! # Boom
//!
//! A layered URL router with component-based dependency injection.
//!
//! ## Overview
//!
//! Handlers and middlewares declare their parameters up front. For every
//! request Boom fills them from path values, the request itself, or
//! pluggable components whose results are cached per request, per endpoint,
//! per worker or per process.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌────────────┐     ┌──────────┐     ┌──────────────────────┐
//! │   Runtime   │────▶│   Router   │────▶│ Resolver │────▶│ CacheEngine          │
//! │ (WorkerPool)│     │ (+ layered │     │          │     │  request / endpoint  │
//! └─────────────┘     │ middleware)│     └──────────┘     │  worker / app stores │
//!                     └────────────┘          │           └──────────┬───────────┘
//!                                             ▼                      ▼
//!                                        ┌──────────┐          ┌───────────┐
//!                                        │ Handler  │          │ Component │
//!                                        └──────────┘          └───────────┘
//! ```
//!
//! - **Router**: segment tree with `:name` captures and `*name` wildcards;
//!   middlewares attach to path prefixes
//! - **Resolver**: binds each declared parameter, asking components in
//!   registration order
//! - **CacheEngine**: reuses component values at their declared lifecycle
//! - **Runtime**: configuration, logging and the worker pool
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use boom::prelude::*;
//!
//! #[endpoint]
//! async fn user(id: i64, db: Arc<Database>) -> Result<Response, BoxError> {
//!     Ok(Response::json(&db.user(id).await?)?)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = BoomRuntime::new();
//!     let app = runtime.build_app(|app| {
//!         app.component::<DatabaseComponent>()?
//!             .route("/users/:id", user())
//!     })?;
//!
//!     runtime.run(app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `macros`: `#[endpoint]` attribute (default)
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use boom_core as core;
pub use boom_framework as framework;
pub use boom_runtime as runtime;

#[cfg(feature = "macros")]
pub use boom_macros::endpoint;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use boom::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use boom_runtime::{BoomRuntime, RuntimeHandle, WorkerPool};

    // Application assembly
    pub use boom_framework::{
        Boom, BoomBuilder, ErrorHandler, MethodView, Phase, ProcessStore, RouteOptions,
        UrlOptions, UrlParam,
    };

    // Declaring handlers and components
    pub use boom_core::{
        AppContext, Arguments, BoomError, BoomResult, BoxError, CacheLifecycle, Callable,
        Component, FromApp, Parameter, Request, Response, Signature, Value, WorkerId,
        async_trait, from_fn,
    };

    #[cfg(feature = "macros")]
    pub use boom_macros::endpoint;

    pub use std::sync::Arc;
}
