//! Callables: anything the dispatch loop invokes with resolved arguments.
//!
//! Route handlers, request middlewares and response middlewares are all
//! [`Callable`]s. Each exposes its static [`Signature`] so the resolver knows
//! which parameters to fill, and is then called with the resulting
//! [`Arguments`].
//!
//! Most callables are plain async closures wrapped with [`from_fn`]:
//!
//! ```rust,ignore
//! use boom_core::{Response, Signature, from_fn};
//!
//! let hello = from_fn(
//!     Signature::builder("hello").string("name").build(),
//!     |args| async move {
//!         let name = args.cloned::<String>("name")?;
//!         Ok::<_, BoomError>(Response::text(format!("hello, {name}")))
//!     },
//! );
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::arguments::Arguments;
use crate::error::BoxError;
use crate::response::Response;
use crate::signature::Signature;

/// What a callable produces: a response, or nothing to let handling continue.
///
/// Handlers are expected to always produce a response. Middlewares return
/// `None` to pass and `Some` to short-circuit (request phase) or replace the
/// outgoing response (response phase).
pub type Reply = Option<Response>;

/// A handler or middleware.
#[async_trait]
pub trait Callable: Send + Sync + 'static {
    /// The declared parameters.
    fn signature(&self) -> &Signature;

    /// Invokes the callable.
    async fn call(&self, args: Arguments) -> Result<Reply, BoxError>;
}

/// Shared, type-erased callable.
pub type BoxedCallable = Arc<dyn Callable>;

/// Conversion into a [`Reply`].
pub trait IntoReply {
    fn into_reply(self) -> Reply;
}

impl IntoReply for Response {
    fn into_reply(self) -> Reply {
        Some(self)
    }
}

impl IntoReply for Option<Response> {
    fn into_reply(self) -> Reply {
        self
    }
}

impl IntoReply for () {
    fn into_reply(self) -> Reply {
        None
    }
}

/// Conversion of a handler's return value into a call result.
///
/// Implemented for every [`IntoReply`] type (infallible handlers) and for
/// `Result<R, E>` (fallible handlers). Used by the `#[endpoint]` attribute.
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<Reply, BoxError>;
}

impl<R, E> IntoOutcome for Result<R, E>
where
    R: IntoReply,
    E: Into<BoxError>,
{
    fn into_outcome(self) -> Result<Reply, BoxError> {
        self.map(IntoReply::into_reply).map_err(Into::into)
    }
}

impl IntoOutcome for Response {
    fn into_outcome(self) -> Result<Reply, BoxError> {
        Ok(Some(self))
    }
}

impl IntoOutcome for Option<Response> {
    fn into_outcome(self) -> Result<Reply, BoxError> {
        Ok(self)
    }
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<Reply, BoxError> {
        Ok(None)
    }
}

/// A [`Callable`] backed by an async closure.
pub struct FnCallable<F> {
    signature: Signature,
    f: F,
}

impl<F> fmt::Debug for FnCallable<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCallable")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut, R, E> Callable for FnCallable<F>
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoReply + 'static,
    E: Into<BoxError> + 'static,
{
    fn signature(&self) -> &Signature {
        &self.signature
    }

    async fn call(&self, args: Arguments) -> Result<Reply, BoxError> {
        (self.f)(args)
            .await
            .map(IntoReply::into_reply)
            .map_err(Into::into)
    }
}

/// Wraps an async closure as a shared callable.
pub fn from_fn<F, Fut, R, E>(signature: Signature, f: F) -> BoxedCallable
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoReply + 'static,
    E: Into<BoxError> + 'static,
{
    Arc::new(FnCallable { signature, f })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoomError;
    use crate::value::Value;

    #[tokio::test]
    async fn test_from_fn_reply_kinds() {
        let handler = from_fn(Signature::builder("handler").int("n").build(), |args| async move {
            let n = args.get::<i64>("n")?;
            Ok::<_, BoomError>(Response::text(n.to_string()))
        });
        let middleware = from_fn(Signature::empty("noop"), |_| async { Ok::<_, BoomError>(()) });

        let mut args = Arguments::new();
        args.insert("n", Value::new(7_i64));
        let reply = handler.call(args).await.unwrap().unwrap();
        assert_eq!(reply.body_text(), "7");

        assert!(middleware.call(Arguments::new()).await.unwrap().is_none());
        assert_eq!(handler.signature().name(), "handler");
    }

    #[tokio::test]
    async fn test_errors_are_boxed() {
        let failing = from_fn(Signature::empty("failing"), |_| async {
            Err::<Response, _>(BoomError::custom("boom"))
        });
        let err = failing.call(Arguments::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
