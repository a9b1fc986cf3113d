//! Parameter resolution.
//!
//! The [`Resolver`] turns a callable's [`Signature`] into [`Arguments`]. For
//! every declared parameter, in order, the first rule that applies wins:
//!
//! 1. a [`Prefetched`] entry of the same name (path parameters, the outgoing
//!    response); raw strings are coerced by the application's
//!    [`ParamParser`];
//! 2. the current request, for `Annotation::Request` or an unannotated
//!    `request` / `req`;
//! 3. the parameter descriptor, for `Annotation::Parameter` or an
//!    unannotated `param` / `parameter`;
//! 4. variadic parameters bind nothing, except that a view method receives
//!    the request;
//! 5. the first registered [`Component`] whose `resolve` claims the
//!    parameter, fetched through the [`CacheEngine`].
//!
//! Which component claims a parameter site is memoized in a bounded LRU, so
//! `Component::resolve` runs once per site rather than once per request.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut resolver = Resolver::new(app);
//! resolver.add_component::<DatabaseComponent>()?;
//!
//! let args = resolver
//!     .resolve(handler.signature(), &request, &Prefetched::new(), None)
//!     .await?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use boom_core::{
    AppContext, Annotation, Arguments, BoomError, BoomResult, Component, FromApp, ParamKey,
    ParamKind, ParamParser, Parameter, Request, Signature, Value, param_parser,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::cache::CacheEngine;

/// Default capacity of the component memo.
pub const DEFAULT_RESOLVER_CACHE_SIZE: usize = 768;

const REQUEST_NAMES: [&str; 2] = ["request", "req"];
const PARAMETER_NAMES: [&str; 2] = ["param", "parameter"];

// ============================================================================
// Prefetched values
// ============================================================================

/// A value known before resolution starts.
#[derive(Debug, Clone)]
pub enum Prefetch {
    /// A raw string, coerced by the parameter parser.
    Raw(String),
    /// A ready value, bound as is.
    Value(Value),
}

/// Values bound by name ahead of any component.
#[derive(Debug, Clone, Default)]
pub struct Prefetched(HashMap<String, Prefetch>);

impl Prefetched {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path parameters captured by the router.
    pub fn from_params(params: &[(String, String)]) -> Self {
        Self(
            params
                .iter()
                .map(|(name, raw)| (name.clone(), Prefetch::Raw(raw.clone())))
                .collect(),
        )
    }

    pub fn raw(mut self, name: impl Into<String>, raw: impl Into<String>) -> Self {
        self.0.insert(name.into(), Prefetch::Raw(raw.into()));
        self
    }

    pub fn value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.0.insert(name.into(), Prefetch::Value(value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Prefetch> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Fills callable parameters from prefetched values, the request and
/// registered components.
pub struct Resolver {
    app: Option<Arc<AppContext>>,
    components: Vec<Arc<dyn Component>>,
    memo: Mutex<LruCache<ParamKey, Option<usize>>>,
    parser: ParamParser,
    cache: CacheEngine,
}

impl Resolver {
    /// A resolver bound to `app`.
    pub fn new(app: Arc<AppContext>) -> Self {
        Self {
            app: Some(app),
            ..Self::detached()
        }
    }

    /// A resolver with no application. It resolves prefetched values and the
    /// request, but refuses components.
    pub fn detached() -> Self {
        Self {
            app: None,
            components: Vec::new(),
            memo: Mutex::new(LruCache::new(memo_capacity(DEFAULT_RESOLVER_CACHE_SIZE))),
            parser: param_parser,
            cache: CacheEngine::new(),
        }
    }

    /// Resizes the component memo.
    pub fn set_cache_size(&mut self, size: usize) {
        self.memo.get_mut().resize(memo_capacity(size));
    }

    /// Replaces the scalar coercion function.
    pub fn set_parser(&mut self, parser: ParamParser) {
        self.parser = parser;
    }

    pub fn app(&self) -> Option<&Arc<AppContext>> {
        self.app.as_ref()
    }

    pub fn cache(&self) -> &CacheEngine {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut CacheEngine {
        &mut self.cache
    }

    /// Registered components, in resolution priority order.
    pub fn components(&self) -> &[Arc<dyn Component>] {
        &self.components
    }

    /// Constructs `C` from the bound application and registers it.
    ///
    /// # Errors
    ///
    /// - [`BoomError::NoApplicationBound`] on a detached resolver.
    /// - [`BoomError::InvalidComponent`] if `fetch` declares variadic
    ///   parameters.
    pub fn add_component<C: Component + FromApp>(&mut self) -> BoomResult<()> {
        let app = self
            .app
            .as_ref()
            .ok_or(BoomError::NoApplicationBound(std::any::type_name::<C>()))?;
        let component = C::from_app(app);
        self.add_component_instance(Arc::new(component))
    }

    /// Registers an already constructed component.
    pub fn add_component_instance(&mut self, component: Arc<dyn Component>) -> BoomResult<()> {
        if self.app.is_none() {
            return Err(BoomError::NoApplicationBound(component.name()));
        }
        if let Some(variadic) = component
            .fetch_signature()
            .params()
            .iter()
            .find(|p| p.kind() != ParamKind::Ordinary)
        {
            return Err(BoomError::InvalidComponent {
                component: component.name(),
                reason: format!(
                    "fetch declares variadic parameter `{}`, which can never be filled",
                    variadic.name()
                ),
            });
        }

        debug!(
            component = component.name(),
            lifecycle = %component.cache_lifecycle(),
            "Component registered"
        );
        self.components.push(component);
        self.memo.get_mut().clear();
        Ok(())
    }

    /// The component claiming `param`, scanning in registration order on a
    /// memo miss.
    fn component_for(&self, param: &Parameter) -> Option<&Arc<dyn Component>> {
        let key = param.key();
        if let Some(hit) = self.memo.lock().get(&key).copied() {
            return hit.map(|index| &self.components[index]);
        }

        let found = self.components.iter().position(|c| c.resolve(param));
        trace!(
            param = param.name(),
            callable = param.callable_name(),
            component = found.map(|i| self.components[i].name()),
            "Component lookup"
        );
        self.memo.lock().put(key, found);
        found.map(|index| &self.components[index])
    }

    /// Resolves every parameter of `signature` for `request`.
    ///
    /// `source` is the parameter being filled when `signature` belongs to a
    /// component's `fetch`; it is what a parameter-descriptor parameter
    /// receives.
    ///
    /// # Errors
    ///
    /// - [`BoomError::InvalidParameter`] if a prefetched scalar fails to parse.
    /// - [`BoomError::UnresolvableParameter`] if no component claims a
    ///   parameter.
    /// - [`BoomError::Cancelled`] if the request was cancelled.
    /// - Whatever a component fetch raised, see [`BoomError::from_fetch`].
    pub fn resolve<'a>(
        &'a self,
        signature: &'a Signature,
        request: &'a Arc<Request>,
        prefetched: &'a Prefetched,
        source: Option<&'a Parameter>,
    ) -> BoxFuture<'a, BoomResult<Arguments>> {
        async move {
            let mut args = Arguments::new();

            for param in signature.params() {
                let name = param.name();
                let annotation = param.annotation();
                let unannotated = annotation == Annotation::Empty;

                if let Some(prefetch) = prefetched.get(name) {
                    let value = match prefetch {
                        Prefetch::Raw(raw) => (self.parser)(raw, param)?,
                        Prefetch::Value(value) => value.clone(),
                    };
                    args.insert(name, value);
                    continue;
                }

                if annotation == Annotation::Request
                    || (unannotated && REQUEST_NAMES.contains(&name))
                {
                    args.insert(name, Value::from_arc(Arc::clone(request)));
                    continue;
                }

                if annotation == Annotation::Parameter
                    || (unannotated && PARAMETER_NAMES.contains(&name))
                {
                    let descriptor = source.unwrap_or(param).clone();
                    args.insert(name, Value::new(descriptor));
                    continue;
                }

                match param.kind() {
                    ParamKind::VarPositional if signature.is_view_method() => {
                        args.insert("request", Value::from_arc(Arc::clone(request)));
                        continue;
                    }
                    ParamKind::VarPositional => {
                        trace!(
                            param = name,
                            callable = signature.name(),
                            "Skipping variadic positional parameter"
                        );
                        continue;
                    }
                    ParamKind::VarKeyword => {
                        trace!(
                            param = name,
                            callable = signature.name(),
                            "Skipping variadic keyword parameter"
                        );
                        continue;
                    }
                    ParamKind::Ordinary => {}
                }

                let component = self.component_for(param).ok_or_else(|| {
                    BoomError::UnresolvableParameter {
                        name: name.to_string(),
                        callable: signature.name().to_string(),
                    }
                })?;

                if request.cancellation().is_cancelled() {
                    return Err(BoomError::Cancelled);
                }
                let value = self
                    .cache
                    .get(self, component, signature, request, param)
                    .await?;
                args.insert(name, value);
            }

            Ok(args)
        }
        .boxed()
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("bound", &self.app.is_some())
            .field(
                "components",
                &self.components.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

fn memo_capacity(size: usize) -> NonZeroUsize {
    NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boom_core::{BoxError, async_trait};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Name;

    struct NameComponent {
        calls: Arc<AtomicUsize>,
    }

    impl FromApp for NameComponent {
        fn from_app(_: &AppContext) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Component for NameComponent {
        fn resolve(&self, param: &Parameter) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            param.annotation().is::<Name>()
        }

        async fn fetch(&self, args: Arguments) -> Result<Value, BoxError> {
            let param = args.parameter()?;
            Ok(Value::new(format!("name for {}", param.name())))
        }
    }

    struct Variadic(Signature);

    #[async_trait]
    impl Component for Variadic {
        fn resolve(&self, _: &Parameter) -> bool {
            false
        }

        fn fetch_signature(&self) -> &Signature {
            &self.0
        }

        async fn fetch(&self, _: Arguments) -> Result<Value, BoxError> {
            Ok(Value::new(()))
        }
    }

    fn request() -> Arc<Request> {
        Arc::new(Request::builder().uri("/users/22").build())
    }

    #[tokio::test]
    async fn test_prefetched_values_are_coerced() {
        let resolver = Resolver::detached();
        let sig = Signature::builder("user")
            .int("age")
            .bool("accepted")
            .untyped("raw")
            .build();
        let prefetched = Prefetched::new()
            .raw("age", "22")
            .raw("accepted", "ok")
            .raw("raw", "x");

        let args = resolver.resolve(&sig, &request(), &prefetched, None).await.unwrap();
        assert_eq!(*args.get::<i64>("age").unwrap(), 22);
        assert!(*args.get::<bool>("accepted").unwrap());
        assert_eq!(args.cloned::<String>("raw").unwrap(), "x");

        let bad = Prefetched::new().raw("age", "old").raw("accepted", "no").raw("raw", "");
        let err = resolver.resolve(&sig, &request(), &bad, None).await.unwrap_err();
        assert!(matches!(err, BoomError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn test_request_and_descriptor_bindings() {
        let resolver = Resolver::detached();
        let sig = Signature::builder("handler")
            .request("incoming")
            .untyped("req")
            .parameter("slot")
            .var_positional("args")
            .var_keyword("kwargs")
            .build();
        let req = request();

        let args = resolver.resolve(&sig, &req, &Prefetched::new(), None).await.unwrap();
        assert!(Arc::ptr_eq(&args.get::<Request>("incoming").unwrap(), &req));
        assert!(args.contains("req"));
        assert_eq!(args.parameter().unwrap().name(), "slot");
        assert!(!args.contains("args"));
        assert!(!args.contains("kwargs"));
    }

    #[tokio::test]
    async fn test_request_declared_by_type() {
        let resolver = Resolver::detached();
        let sig = Signature::builder("handler")
            .param::<Request>("r")
            .param::<Parameter>("p")
            .build();
        let req = request();

        let args = resolver.resolve(&sig, &req, &Prefetched::new(), None).await.unwrap();
        assert!(Arc::ptr_eq(&args.get::<Request>("r").unwrap(), &req));
        assert_eq!(args.get::<Parameter>("p").unwrap().name(), "p");
    }

    #[tokio::test]
    async fn test_view_method_receives_request() {
        let resolver = Resolver::detached();
        let sig = Signature::builder("get").view_method().var_positional("args").build();

        let args = resolver.resolve(&sig, &request(), &Prefetched::new(), None).await.unwrap();
        assert!(args.request().is_ok());
    }

    #[tokio::test]
    async fn test_unresolvable_parameter() {
        let resolver = Resolver::new(Arc::new(AppContext::new("test")));
        let sig = Signature::builder("handler").param::<Name>("name").build();

        let err = resolver
            .resolve(&sig, &request(), &Prefetched::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BoomError::UnresolvableParameter { ref name, .. } if name == "name"
        ));
    }

    #[tokio::test]
    async fn test_component_match_is_memoized() {
        let mut resolver = Resolver::new(Arc::new(AppContext::new("test")));
        let calls = Arc::new(AtomicUsize::new(0));
        resolver
            .add_component_instance(Arc::new(NameComponent {
                calls: Arc::clone(&calls),
            }))
            .unwrap();

        let first = Signature::builder("first").param::<Name>("name").build();
        let second = Signature::builder("second").param::<Name>("name").build();

        for _ in 0..3 {
            let args = resolver
                .resolve(&first, &request(), &Prefetched::new(), None)
                .await
                .unwrap();
            assert_eq!(args.cloned::<String>("name").unwrap(), "name for name");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        resolver
            .resolve(&second, &request(), &Prefetched::new(), None)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_registration_errors() {
        let mut detached = Resolver::detached();
        assert!(matches!(
            detached.add_component::<NameComponent>(),
            Err(BoomError::NoApplicationBound(_))
        ));

        let mut resolver = Resolver::new(Arc::new(AppContext::new("test")));
        let variadic = Variadic(Signature::builder("fetch").var_keyword("rest").build());
        assert!(matches!(
            resolver.add_component_instance(Arc::new(variadic)),
            Err(BoomError::InvalidComponent { .. })
        ));
        assert!(resolver.add_component::<NameComponent>().is_ok());
        assert_eq!(resolver.components().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_request_stops_fetching() {
        let mut resolver = Resolver::new(Arc::new(AppContext::new("test")));
        resolver.add_component::<NameComponent>().unwrap();
        let sig = Signature::builder("handler").param::<Name>("name").build();
        let req = request();
        req.cancellation().cancel();

        let err = resolver
            .resolve(&sig, &req, &Prefetched::new(), None)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }
}
