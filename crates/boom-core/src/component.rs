//! The component contract.
//!
//! A component claims handler parameters and supplies their values. The
//! resolver asks every registered component, in registration order, whether
//! it [`resolve`](Component::resolve)s a parameter; the first one that does is
//! asked to [`fetch`](Component::fetch) the value, through the cache engine
//! and at the component's declared [`CacheLifecycle`].
//!
//! `fetch` declares its own parameters with
//! [`fetch_signature`](Component::fetch_signature). They are resolved through
//! the same resolver, so a component can depend on other components. A
//! parameter of the fetch signature annotated as
//! [`Annotation::Parameter`](crate::Annotation::Parameter) receives the
//! handler parameter being filled.
//!
//! # Example
//!
//! ```rust,ignore
//! use boom_core::prelude::*;
//!
//! struct HeadersComponent {
//!     signature: Signature,
//! }
//!
//! impl FromApp for HeadersComponent {
//!     fn from_app(_: &AppContext) -> Self {
//!         Self { signature: Signature::builder("headers").request("request").build() }
//!     }
//! }
//!
//! #[async_trait]
//! impl Component for HeadersComponent {
//!     fn resolve(&self, param: &Parameter) -> bool {
//!         param.annotation().is::<Headers>()
//!     }
//!
//!     fn fetch_signature(&self) -> &Signature {
//!         &self.signature
//!     }
//!
//!     async fn fetch(&self, args: Arguments) -> Result<Value, BoxError> {
//!         Ok(Value::new(Headers::from(args.request()?.headers())))
//!     }
//! }
//! ```

use std::fmt;
use std::sync::OnceLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::AppContext;
use crate::arguments::Arguments;
use crate::error::BoxError;
use crate::signature::{Parameter, Signature};
use crate::value::Value;

/// How long a fetched value is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLifecycle {
    /// Fetch on every resolution.
    #[default]
    NoCache,
    /// Reuse within one request.
    Request,
    /// Reuse for every request to the same endpoint, for the process lifetime.
    Endpoint,
    /// Reuse within one worker.
    WorkerThread,
    /// Process-wide; only cached when an app store is installed.
    App,
}

impl fmt::Display for CacheLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoCache => "no_cache",
            Self::Request => "request",
            Self::Endpoint => "endpoint",
            Self::WorkerThread => "worker_thread",
            Self::App => "app",
        })
    }
}

/// A pluggable supplier of parameter values.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Name used in logs and errors.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns `true` if this component supplies `param`.
    ///
    /// Must be pure: the answer is memoized per parameter site.
    fn resolve(&self, param: &Parameter) -> bool;

    /// The parameters `fetch` wants resolved.
    ///
    /// Defaults to the current request as `request` and the parameter being
    /// filled as `param`.
    fn fetch_signature(&self) -> &Signature {
        default_fetch_signature()
    }

    /// Produces the value.
    async fn fetch(&self, args: Arguments) -> Result<Value, BoxError>;

    fn cache_lifecycle(&self) -> CacheLifecycle {
        CacheLifecycle::NoCache
    }
}

fn default_fetch_signature() -> &'static Signature {
    static SIGNATURE: OnceLock<Signature> = OnceLock::new();
    SIGNATURE.get_or_init(|| {
        Signature::builder("fetch")
            .request("request")
            .parameter("param")
            .build()
    })
}

/// Construction of a component from the application it is bound to.
pub trait FromApp: Sized {
    fn from_app(app: &AppContext) -> Self;
}
