//! # Boom Core
//!
//! Leaf types of the Boom router and dependency resolver.
//!
//! This crate defines the vocabulary every other Boom crate speaks:
//!
//! - **Descriptors**: statically declared parameter lists ([`Signature`],
//!   [`Parameter`], [`Annotation`]) with stable identities ([`ParamKey`],
//!   [`ParamSlot`]) used as cache keys
//! - **Values**: type-erased, shared [`Value`]s and resolved [`Arguments`]
//! - **Callables**: handlers and middlewares ([`Callable`], [`from_fn`])
//! - **Components**: pluggable suppliers of parameter values
//!   ([`Component`], [`CacheLifecycle`], [`FromApp`])
//! - **Wire objects**: [`Request`] and [`Response`]
//! - **Errors**: the [`BoomError`] taxonomy
//!
//! ## Request Flow
//!
//! ```text
//! ┌─────────┐   ┌────────┐   ┌──────────┐   ┌─────────────┐   ┌───────────┐
//! │ Request │──▶│ Router │──▶│ Resolver │──▶│ CacheEngine │──▶│ Component │
//! └─────────┘   └────────┘   └──────────┘   └─────────────┘   └───────────┘
//!                                 │
//!                                 ▼
//!                           ┌──────────┐
//!                           │ Callable │──▶ Response
//!                           └──────────┘
//! ```
//!
//! The router, resolver and cache engine live in `boom-framework`.

pub mod app;
pub mod arguments;
pub mod callable;
pub mod component;
pub mod error;
pub mod parser;
pub mod request;
pub mod response;
pub mod signature;
pub mod value;
pub mod worker;

pub use app::{AppClock, AppContext};
pub use arguments::Arguments;
pub use callable::{
    BoxedCallable, Callable, FnCallable, IntoOutcome, IntoReply, Reply, from_fn,
};
pub use component::{CacheLifecycle, Component, FromApp};
pub use error::{BoomError, BoomResult, BoxError};
pub use parser::{AFFIRMATIVE, ParamParser, param_parser};
pub use request::{QueryArgs, Request, RequestBuilder, RequestCache};
pub use response::Response;
pub use signature::{
    Annotation, CallableId, ParamKey, ParamKind, ParamSlot, Parameter, Signature,
    SignatureBuilder,
};
pub use value::{TypeTag, Value};
pub use worker::WorkerId;

// Re-exported for implementors of `Callable` and `Component`.
pub use async_trait::async_trait;
pub use http;

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        AppContext, Arguments, BoomError, BoomResult, BoxError, CacheLifecycle, Callable,
        Component, FromApp, Parameter, Request, Response, Signature, Value, async_trait,
        from_fn,
    };
}
