//! Response timeout as a tower layer.
//!
//! Unlike `tower::timeout`, elapsed time is not an error: the request's
//! cancellation token is tripped and a 503 response is produced, so a slow
//! handler never takes the worker down with it.
//!
//! ```rust,ignore
//! use tower::{Layer, ServiceExt};
//!
//! let service = ResponseTimeoutLayer::new(Duration::from_secs(60)).layer(app);
//! let response = service.oneshot(request).await?;
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use boom_core::{BoomError, Request, Response};
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::Service;
use tower_layer::Layer;
use tracing::warn;

/// Bounds the time a request may take to produce a response.
#[derive(Debug, Clone, Copy)]
pub struct ResponseTimeoutLayer {
    timeout: Duration,
}

impl ResponseTimeoutLayer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl<S> Layer<S> for ResponseTimeoutLayer {
    type Service = ResponseTimeout<S>;

    fn layer(&self, inner: S) -> ResponseTimeout<S> {
        ResponseTimeout {
            inner,
            timeout: self.timeout,
        }
    }
}

/// The [`Service`] produced by [`ResponseTimeoutLayer`].
#[derive(Debug, Clone)]
pub struct ResponseTimeout<S> {
    inner: S,
    timeout: Duration,
}

impl<S> Service<Arc<Request>> for ResponseTimeout<S>
where
    S: Service<Arc<Request>, Response = Response> + Send,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Arc<Request>) -> Self::Future {
        let timeout = self.timeout;
        let fut = self.inner.call(Arc::clone(&request));
        async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => {
                    request.cancellation().cancel();
                    let err = BoomError::Timeout(timeout);
                    warn!(
                        method = %request.method(),
                        path = request.path(),
                        ?timeout,
                        "Response timed out"
                    );
                    Ok(Response::text("Response Timeout").with_status(err.status()))
                }
            }
        }
        .boxed()
    }
}
