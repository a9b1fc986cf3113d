//! The application: registration, dispatch and the tower service.
//!
//! A [`Boom`] owns one [`Router`], one [`Resolver`] (and through it the
//! [`CacheEngine`](crate::cache::CacheEngine)), the global middlewares and the
//! error handler. It is assembled once with a [`BoomBuilder`] and is immutable
//! afterwards; cloning is cheap.
//!
//! # Dispatch
//!
//! 1. Global request middlewares, in registration order.
//! 2. Router lookup; the matched template is recorded on the request.
//! 3. Layered request middlewares, root to leaf.
//! 4. The handler, with path parameters prefetched.
//! 5. Any error is turned into a response by the [`ErrorHandler`].
//! 6. Layered response middlewares, then global response middlewares in
//!    reverse registration order. Each may read the outgoing response
//!    through a parameter named `response`.
//!
//! In both phases the first middleware that returns a response wins: it
//! short-circuits the handler (request phase) or replaces the response and
//! ends the chain (response phase).
//!
//! # Example
//!
//! ```rust,ignore
//! use boom_framework::prelude::*;
//!
//! let app = Boom::builder("hello")
//!     .component::<UserComponent>()?
//!     .route("/users/:id", user_details)?
//!     .middleware(Phase::Response, add_server_header)
//!     .response_timeout(Duration::from_secs(60))
//!     .build();
//!
//! let response = app.handle(Arc::new(request)).await;
//! ```

use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use boom_core::{
    AppClock, AppContext, BoomError, BoomResult, BoxedCallable, Component, FromApp, ParamParser,
    Reply, Request, Response, Value,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use http::Method;
use tower::Service;
use tower::util::BoxCloneSyncService;
use tower_layer::Layer;
use tracing::{Instrument, debug, info_span, warn};

use crate::cache::AppStore;
use crate::error_handler::{DefaultErrorHandler, ErrorHandler};
use crate::middleware::{Middleware, Phase, all_methods};
use crate::resolver::{Prefetched, Resolver};
use crate::router::{RouteMatch, RouteOptions, Router, UrlOptions, UrlParam};
use crate::timeout::ResponseTimeoutLayer;
use crate::view::MethodView;

/// A type-erased, cloneable [`Boom`] service, timeout included.
pub type BoomService = BoxCloneSyncService<Arc<Request>, Response, Infallible>;

struct BoomInner {
    context: Arc<AppContext>,
    router: Router,
    resolver: Resolver,
    request_middlewares: Vec<Middleware>,
    response_middlewares: Vec<Middleware>,
    error_handler: Arc<dyn ErrorHandler>,
    response_timeout: Option<Duration>,
}

/// A built application.
#[derive(Clone)]
pub struct Boom {
    inner: Arc<BoomInner>,
}

impl Boom {
    /// Starts an application named `name`.
    pub fn builder(name: impl Into<String>) -> BoomBuilder {
        Self::with_context(AppContext::new(name))
    }

    /// Starts an application around a prepared context.
    pub fn with_context(context: AppContext) -> BoomBuilder {
        let context = Arc::new(context);
        BoomBuilder {
            router: Router::new(),
            resolver: Resolver::new(Arc::clone(&context)),
            context,
            request_middlewares: Vec::new(),
            response_middlewares: Vec::new(),
            error_handler: Arc::new(DefaultErrorHandler),
            response_timeout: None,
        }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.inner.context
    }

    pub fn name(&self) -> &str {
        self.inner.context.name()
    }

    pub fn clock(&self) -> &AppClock {
        self.inner.context.clock()
    }

    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    pub fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.inner.response_timeout
    }

    /// Builds the path of a named route. See [`Router::url_for`].
    pub fn url_for<K, V>(
        &self,
        name: &str,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> BoomResult<String>
    where
        K: Into<String>,
        V: Into<UrlParam>,
    {
        self.inner.router.url_for(name, params)
    }

    /// Like [`url_for`](Self::url_for); an external URL without an explicit
    /// server uses the application's server name.
    pub fn url_for_with<K, V>(
        &self,
        name: &str,
        params: impl IntoIterator<Item = (K, V)>,
        options: &UrlOptions,
    ) -> BoomResult<String>
    where
        K: Into<String>,
        V: Into<UrlParam>,
    {
        if options.external && options.server.is_none() {
            let options = UrlOptions {
                server: self.inner.context.server_name().map(str::to_string),
                ..options.clone()
            };
            return self.inner.router.url_for_with(name, params, &options);
        }
        self.inner.router.url_for_with(name, params, options)
    }

    /// Routes are never removed; this only logs.
    pub fn remove_route(&self, name: &str) {
        warn!(route = name, "Removing routes is not supported; the route stays registered");
    }

    /// Static file serving is left to the HTTP server; this only logs.
    pub fn static_files(&self, uri: &str, directory: &str) {
        warn!(uri, directory, "Static file serving is not supported by Boom");
    }

    /// Wraps the application in its configured timeout and erases the type.
    pub fn into_service(self) -> BoomService {
        match self.inner.response_timeout {
            Some(timeout) => {
                BoxCloneSyncService::new(ResponseTimeoutLayer::new(timeout).layer(self))
            }
            None => BoxCloneSyncService::new(self),
        }
    }

    /// Handles one request.
    ///
    /// Never fails: every error is turned into a response by the error
    /// handler. If the request's cancellation token trips first, the
    /// response is the error handler's answer to [`BoomError::Cancelled`].
    ///
    /// Worker-scoped component values come from the store of
    /// `request.worker()`. Outside the runtime's worker pool, stamp requests
    /// with [`RequestBuilder::worker`](boom_core::RequestBuilder::worker)
    /// when they run on several threads, otherwise they share worker `0`.
    pub async fn handle(&self, request: Arc<Request>) -> Response {
        let span = info_span!(
            "request",
            method = %request.method(),
            path = request.path(),
            worker = %request.worker()
        );

        async {
            let token = request.cancellation().clone();
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    self.inner.error_handler.handle(&request, &BoomError::Cancelled)
                }
                response = self.dispatch(&request) => response,
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, request: &Arc<Request>) -> Response {
        let mut matched = None;
        let response = match self.request_phase(request, &mut matched).await {
            Ok(response) => response,
            Err(err) => self.inner.error_handler.handle(request, &err),
        };

        match self.response_phase(request, matched.as_deref(), response).await {
            Ok(response) => {
                debug!(status = response.status().as_u16(), "Request handled");
                response
            }
            Err(err) => self.inner.error_handler.handle(request, &err),
        }
    }

    async fn request_phase(
        &self,
        request: &Arc<Request>,
        matched: &mut Option<Arc<RouteMatch>>,
    ) -> BoomResult<Response> {
        let nothing = Prefetched::new();
        for middleware in &self.inner.request_middlewares {
            if let Some(response) = self.invoke(middleware.callable(), request, &nothing).await? {
                return Ok(response);
            }
        }

        let found = self.inner.router.lookup(request.path(), request.method())?;
        request.set_uri_template(found.uri_template());
        *matched = Some(Arc::clone(&found));

        let params = Prefetched::from_params(found.params());
        for middleware in found.phase(Phase::Request) {
            if let Some(response) = self.invoke(middleware.callable(), request, &params).await? {
                return Ok(response);
            }
        }

        let reply = self.invoke(found.handler(), request, &params).await?;
        Ok(reply.unwrap_or_default())
    }

    async fn response_phase(
        &self,
        request: &Arc<Request>,
        matched: Option<&RouteMatch>,
        response: Response,
    ) -> BoomResult<Response> {
        let layered = matched.into_iter().flat_map(|m| m.phase(Phase::Response));
        let global = self.inner.response_middlewares.iter().rev();

        for middleware in layered.chain(global) {
            let prefetched = Prefetched::new().value("response", Value::new(response.clone()));
            if let Some(replacement) = self
                .invoke(middleware.callable(), request, &prefetched)
                .await?
            {
                return Ok(replacement);
            }
        }
        Ok(response)
    }

    async fn invoke(
        &self,
        callable: &BoxedCallable,
        request: &Arc<Request>,
        prefetched: &Prefetched,
    ) -> BoomResult<Reply> {
        let signature = callable.signature();
        let args = self
            .inner
            .resolver
            .resolve(signature, request, prefetched, None)
            .await?;
        callable
            .call(args)
            .await
            .map_err(|e| BoomError::from_handler(signature.name(), e))
    }
}

impl Service<Arc<Request>> for Boom {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Arc<Request>) -> Self::Future {
        let app = self.clone();
        async move { Ok(app.handle(request).await) }.boxed()
    }
}

impl fmt::Debug for Boom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Boom")
            .field("name", &self.inner.context.name())
            .field("router", &self.inner.router)
            .field("resolver", &self.inner.resolver)
            .field("response_timeout", &self.inner.response_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// BoomBuilder
// ============================================================================

/// Registration-time assembly of a [`Boom`].
///
/// Fallible steps return the builder inside a [`BoomResult`] so that a
/// misconfigured application fails at startup.
#[must_use]
pub struct BoomBuilder {
    context: Arc<AppContext>,
    router: Router,
    resolver: Resolver,
    request_middlewares: Vec<Middleware>,
    response_middlewares: Vec<Middleware>,
    error_handler: Arc<dyn ErrorHandler>,
    response_timeout: Option<Duration>,
}

impl BoomBuilder {
    pub fn context(&self) -> &Arc<AppContext> {
        &self.context
    }

    /// Registers a `GET` route named after the handler.
    pub fn route(self, uri: &str, handler: BoxedCallable) -> BoomResult<Self> {
        self.route_with(uri, [Method::GET], handler, RouteOptions::default())
    }

    /// Registers a route for `methods` with explicit options.
    pub fn route_with(
        mut self,
        uri: &str,
        methods: impl IntoIterator<Item = Method>,
        handler: BoxedCallable,
        options: RouteOptions,
    ) -> BoomResult<Self> {
        self.router.add(uri, methods, handler, options)?;
        Ok(self)
    }

    /// Registers a global middleware.
    pub fn middleware(mut self, phase: Phase, callable: BoxedCallable) -> Self {
        debug!(middleware = callable.signature().name(), %phase, "Global middleware registered");
        let middleware = Middleware::global(callable, phase);
        match phase {
            Phase::Request => self.request_middlewares.push(middleware),
            Phase::Response => self.response_middlewares.push(middleware),
        }
        self
    }

    /// Registers a middleware layered on `uri` for every method.
    pub fn layered_middleware(
        self,
        uri: &str,
        phase: Phase,
        callable: BoxedCallable,
    ) -> BoomResult<Self> {
        self.layered_middleware_for(uri, phase, all_methods(), callable)
    }

    /// Registers a middleware layered on `uri` for `methods` only.
    pub fn layered_middleware_for(
        mut self,
        uri: &str,
        phase: Phase,
        methods: impl IntoIterator<Item = Method>,
        callable: BoxedCallable,
    ) -> BoomResult<Self> {
        let methods: HashSet<Method> = methods.into_iter().collect();
        self.router
            .add(uri, methods, callable, RouteOptions::middleware(phase))?;
        Ok(self)
    }

    /// Constructs `C` from the application context and registers it.
    pub fn component<C: Component + FromApp>(mut self) -> BoomResult<Self> {
        self.resolver.add_component::<C>()?;
        Ok(self)
    }

    /// Registers an already constructed component.
    pub fn component_instance(mut self, component: Arc<dyn Component>) -> BoomResult<Self> {
        self.resolver.add_component_instance(component)?;
        Ok(self)
    }

    /// Registers a method view at `uri`.
    pub fn view(mut self, uri: &str, view: MethodView) -> BoomResult<Self> {
        let (name, handlers) = view.into_parts();
        self.router.add_route(uri, None, name, handlers)?;
        Ok(self)
    }

    pub fn error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.error_handler = Arc::new(handler);
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// Replaces the coercion of prefetched path values.
    pub fn param_parser(mut self, parser: ParamParser) -> Self {
        self.resolver.set_parser(parser);
        self
    }

    /// Installs a store for app-lifecycle component values.
    pub fn app_store(mut self, store: Arc<dyn AppStore>) -> Self {
        self.resolver.cache_mut().set_app_store(store);
        self
    }

    pub fn router_cache_size(mut self, size: usize) -> Self {
        self.router.set_cache_size(size);
        self
    }

    pub fn resolver_cache_size(mut self, size: usize) -> Self {
        self.resolver.set_cache_size(size);
        self
    }

    /// Shares `value` with components through the application context.
    pub fn state<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.context.insert_state(value);
        self
    }

    pub fn build(self) -> Boom {
        debug!(
            app = self.context.name(),
            routes = self.router.routes().count(),
            components = self.resolver.components().len(),
            "Application built"
        );
        Boom {
            inner: Arc::new(BoomInner {
                context: self.context,
                router: self.router,
                resolver: self.resolver,
                request_middlewares: self.request_middlewares,
                response_middlewares: self.response_middlewares,
                error_handler: self.error_handler,
                response_timeout: self.response_timeout,
            }),
        }
    }
}

impl fmt::Debug for BoomBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoomBuilder")
            .field("name", &self.context.name())
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boom_core::{Signature, from_fn};
    use http::StatusCode;
    use http::header::{HeaderName, HeaderValue};

    fn text(name: &str, body: &'static str) -> BoxedCallable {
        from_fn(Signature::empty(name), move |_| async move {
            Ok::<_, BoomError>(Response::text(body))
        })
    }

    async fn call(app: &Boom, method: Method, uri: &str) -> Response {
        app.handle(Arc::new(Request::builder().method(method).uri(uri).build()))
            .await
    }

    #[tokio::test]
    async fn test_path_params_reach_handler() {
        let user = from_fn(
            Signature::builder("user").int("id").request("request").build(),
            |args| async move {
                let id = args.get::<i64>("id")?;
                let request = args.request()?;
                Ok::<_, BoomError>(Response::text(format!(
                    "{id} via {}",
                    request.uri_template().unwrap_or_default()
                )))
            },
        );
        let app = Boom::builder("test").route("/users/:id", user).unwrap().build();

        let response = call(&app, Method::GET, "/users/42").await;
        assert_eq!(response.body_text(), "42 via /users/:id");

        let bad = call(&app, Method::GET, "/users/abc").await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_not_found_and_method_not_allowed() {
        let app = Boom::builder("test")
            .route_with("/submit", [Method::POST], text("submit", "ok"), RouteOptions::default())
            .unwrap()
            .build();

        assert_eq!(call(&app, Method::GET, "/nope").await.status(), StatusCode::NOT_FOUND);
        let response = call(&app, Method::GET, "/submit").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[http::header::ALLOW], "POST");
    }

    #[tokio::test]
    async fn test_global_middleware_order() {
        let short_circuit = from_fn(
            Signature::builder("guard").request("request").build(),
            |args| async move {
                let request = args.request()?;
                Ok::<_, BoomError>(
                    (request.header("x-block").is_some())
                        .then(|| Response::text("blocked").with_status(StatusCode::FORBIDDEN)),
                )
            },
        );
        let tag = |name: &'static str, value: &'static str| {
            from_fn(
                Signature::builder(name).param::<Response>("response").build(),
                move |args| async move {
                    let response = args.cloned::<Response>("response")?;
                    let previous = response
                        .headers()
                        .get("x-order")
                        .and_then(|v| v.to_str().ok())
                        .map(|v| format!("{v},{value}"))
                        .unwrap_or_else(|| value.to_string());
                    let header = HeaderValue::from_str(&previous)
                        .map_err(|e| BoomError::custom(e.to_string()))?;
                    Ok::<_, BoomError>(
                        response.with_header(HeaderName::from_static("x-order"), header),
                    )
                },
            )
        };

        let app = Boom::builder("test")
            .middleware(Phase::Request, short_circuit)
            .middleware(Phase::Response, tag("first", "first"))
            .middleware(Phase::Response, tag("second", "second"))
            .route("/", text("index", "index"))
            .unwrap()
            .build();

        let response = call(&app, Method::GET, "/").await;
        assert_eq!(response.body_text(), "index");
        // Reverse registration order; the first replacement ends the chain.
        assert_eq!(response.headers()["x-order"], "second");

        let blocked = app
            .handle(Arc::new(Request::builder().uri("/").header("x-block", "1").build()))
            .await;
        assert_eq!(blocked.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_cancelled_request_is_unavailable() {
        let app = Boom::builder("test").route("/", text("index", "index")).unwrap().build();
        let request = Arc::new(Request::builder().uri("/").build());
        request.cancellation().cancel();

        let response = app.handle(request).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_external_url_uses_server_name() {
        let app = Boom::with_context(AppContext::new("test").with_server_name("example.com"))
            .route("/users/:id", text("user", "u"))
            .unwrap()
            .build();

        let url = app
            .url_for_with(
                "user",
                [("id", 7)],
                &UrlOptions {
                    external: true,
                    ..UrlOptions::default()
                },
            )
            .unwrap();
        assert_eq!(url, "http://example.com/users/7");
        assert_eq!(app.url_for("user", [("id", 7)]).unwrap(), "/users/7");
    }
}
