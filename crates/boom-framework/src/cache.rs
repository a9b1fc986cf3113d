//! Lifecycle-scoped caching of component values.
//!
//! [`CacheEngine::get`] dispatches on the component's [`CacheLifecycle`]:
//!
//! | lifecycle      | store                                  | key                         |
//! |----------------|----------------------------------------|-----------------------------|
//! | `NoCache`      | none                                   |                             |
//! | `Request`      | the request's own [`RequestCache`]     | [`ParamSlot`]               |
//! | `Endpoint`     | process-wide map, never invalidated    | ([`CallableId`], [`ParamKey`]) |
//! | `WorkerThread` | one table per [`WorkerId`]             | [`ParamSlot`]               |
//! | `App`          | the installed [`AppStore`], if any     | [`AppKey`]                  |
//!
//! A value is computed by resolving the component's fetch signature through
//! the same [`Resolver`] and calling `fetch`. Stores are written only after
//! `fetch` completes, so a failed or cancelled fetch leaves nothing behind.
//! When two computations race on one key, the first insert wins and both
//! callers observe the stored value.
//!
//! [`RequestCache`]: boom_core::RequestCache

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use boom_core::{
    BoomError, BoomResult, CacheLifecycle, CallableId, Component, ParamKey, ParamSlot,
    Parameter, Request, Signature, Value, WorkerId,
};
use parking_lot::{Mutex, RwLock};
use tracing::{trace, warn};

use crate::resolver::{Prefetched, Resolver};

type WorkerSlot = Arc<Mutex<HashMap<ParamSlot, Value>>>;

// ============================================================================
// App store
// ============================================================================

/// Key of a process-wide cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppKey {
    /// Name of the producing component.
    pub component: &'static str,
    /// Structural slot being filled.
    pub slot: ParamSlot,
}

/// Storage for [`CacheLifecycle::App`] values.
///
/// Without a store installed, app-lifecycle components are fetched on every
/// resolution.
pub trait AppStore: Send + Sync + 'static {
    fn get(&self, key: &AppKey) -> Option<Value>;

    /// Stores `value` unless the key is already present; returns the stored
    /// value.
    fn insert(&self, key: AppKey, value: Value) -> Value;

    fn invalidate(&self, key: &AppKey);

    fn clear(&self);
}

/// An in-memory [`AppStore`] with explicit invalidation.
#[derive(Debug, Default)]
pub struct ProcessStore {
    values: RwLock<HashMap<AppKey, Value>>,
}

impl ProcessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every value produced by `component`.
    pub fn invalidate_component(&self, component: &str) {
        self.values.write().retain(|key, _| key.component != component);
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl AppStore for ProcessStore {
    fn get(&self, key: &AppKey) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    fn insert(&self, key: AppKey, value: Value) -> Value {
        self.values.write().entry(key).or_insert(value).clone()
    }

    fn invalidate(&self, key: &AppKey) {
        self.values.write().remove(key);
    }

    fn clear(&self) {
        self.values.write().clear();
    }
}

// ============================================================================
// CacheEngine
// ============================================================================

/// Owner of the endpoint, worker and app stores.
#[derive(Default)]
pub struct CacheEngine {
    endpoint: RwLock<HashMap<(CallableId, ParamKey), Value>>,
    workers: RwLock<HashMap<WorkerId, WorkerSlot>>,
    app_store: Option<Arc<dyn AppStore>>,
}

impl CacheEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a store for app-lifecycle values.
    pub fn set_app_store(&mut self, store: Arc<dyn AppStore>) {
        self.app_store = Some(store);
    }

    pub fn app_store(&self) -> Option<&Arc<dyn AppStore>> {
        self.app_store.as_ref()
    }

    /// Number of values held in the endpoint store.
    pub fn endpoint_len(&self) -> usize {
        self.endpoint.read().len()
    }

    /// Number of values held for `worker`.
    pub fn worker_len(&self, worker: WorkerId) -> usize {
        self.workers
            .read()
            .get(&worker)
            .map_or(0, |slot| slot.lock().len())
    }

    fn worker_slot(&self, worker: WorkerId) -> WorkerSlot {
        let existing = self.workers.read().get(&worker).cloned();
        if let Some(slot) = existing {
            return slot;
        }
        Arc::clone(self.workers.write().entry(worker).or_default())
    }

    /// Returns the value of `param`, produced by `component`, at the
    /// component's lifecycle.
    ///
    /// `endpoint` is the callable whose parameter is being filled.
    pub async fn get(
        &self,
        resolver: &Resolver,
        component: &Arc<dyn Component>,
        endpoint: &Signature,
        request: &Arc<Request>,
        param: &Parameter,
    ) -> BoomResult<Value> {
        let lifecycle = component.cache_lifecycle();
        trace!(
            component = component.name(),
            param = param.name(),
            %lifecycle,
            "Fetching component value"
        );

        match lifecycle {
            CacheLifecycle::NoCache => compute(resolver, component, request, param).await,

            CacheLifecycle::Request => {
                let store = request.component_cache();
                let slot = param.slot();
                if let Some(hit) = store.get(&slot) {
                    return Ok(hit);
                }
                let value = compute(resolver, component, request, param).await?;
                Ok(store.insert(slot, value))
            }

            CacheLifecycle::Endpoint => {
                let key = (endpoint.id(), param.key());
                let hit = self.endpoint.read().get(&key).cloned();
                if let Some(hit) = hit {
                    return Ok(hit);
                }
                let value = compute(resolver, component, request, param).await?;
                Ok(self.endpoint.write().entry(key).or_insert(value).clone())
            }

            CacheLifecycle::WorkerThread => {
                let slot = self.worker_slot(request.worker());
                let key = param.slot();
                let hit = slot.lock().get(&key).cloned();
                if let Some(hit) = hit {
                    return Ok(hit);
                }
                let value = compute(resolver, component, request, param).await?;
                Ok(slot.lock().entry(key).or_insert(value).clone())
            }

            CacheLifecycle::App => match &self.app_store {
                Some(store) => {
                    let key = AppKey {
                        component: component.name(),
                        slot: param.slot(),
                    };
                    if let Some(hit) = store.get(&key) {
                        return Ok(hit);
                    }
                    let value = compute(resolver, component, request, param).await?;
                    Ok(store.insert(key, value))
                }
                None => {
                    warn!(
                        component = component.name(),
                        param = param.name(),
                        "App lifecycle caching needs an app store; fetching uncached"
                    );
                    compute(resolver, component, request, param).await
                }
            },
        }
    }
}

impl fmt::Debug for CacheEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEngine")
            .field("endpoint", &self.endpoint.read().len())
            .field("workers", &self.workers.read().len())
            .field("app_store", &self.app_store.is_some())
            .finish()
    }
}

/// Resolves the component's fetch signature and fetches.
async fn compute(
    resolver: &Resolver,
    component: &Arc<dyn Component>,
    request: &Arc<Request>,
    param: &Parameter,
) -> BoomResult<Value> {
    let empty = Prefetched::new();
    let args = resolver
        .resolve(component.fetch_signature(), request, &empty, Some(param))
        .await?;
    component
        .fetch(args)
        .await
        .map_err(|e| BoomError::from_fetch(component.name(), param.name(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use boom_core::{AppContext, Arguments, BoxError, FromApp, async_trait};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Token;

    /// Produces a fresh counter value on every fetch.
    struct Counter {
        lifecycle: CacheLifecycle,
        fetches: AtomicUsize,
    }

    impl Counter {
        fn new(lifecycle: CacheLifecycle) -> Arc<Self> {
            Arc::new(Self {
                lifecycle,
                fetches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Component for Counter {
        fn resolve(&self, param: &Parameter) -> bool {
            param.annotation().is::<Token>()
        }

        async fn fetch(&self, _: Arguments) -> Result<Value, BoxError> {
            Ok(Value::new(self.fetches.fetch_add(1, Ordering::SeqCst)))
        }

        fn cache_lifecycle(&self) -> CacheLifecycle {
            self.lifecycle
        }
    }

    struct Failing;

    impl FromApp for Failing {
        fn from_app(_: &AppContext) -> Self {
            Self
        }
    }

    #[async_trait]
    impl Component for Failing {
        fn resolve(&self, param: &Parameter) -> bool {
            param.annotation().is::<Token>()
        }

        async fn fetch(&self, _: Arguments) -> Result<Value, BoxError> {
            Err("database is down".into())
        }

        fn cache_lifecycle(&self) -> CacheLifecycle {
            CacheLifecycle::Endpoint
        }
    }

    fn resolver_with(component: Arc<dyn Component>) -> Resolver {
        let mut resolver = Resolver::new(Arc::new(AppContext::new("test")));
        resolver.add_component_instance(component).unwrap();
        resolver
    }

    fn request_on(worker: usize) -> Arc<Request> {
        Arc::new(Request::builder().worker(WorkerId::new(worker)).build())
    }

    async fn token(resolver: &Resolver, sig: &Signature, request: &Arc<Request>) -> usize {
        let args = resolver
            .resolve(sig, request, &Prefetched::new(), None)
            .await
            .unwrap();
        *args.get::<usize>("token").unwrap()
    }

    fn handler(name: &str) -> Signature {
        Signature::builder(name).param::<Token>("token").build()
    }

    #[tokio::test]
    async fn test_no_cache_fetches_every_time() {
        let resolver = resolver_with(Counter::new(CacheLifecycle::NoCache));
        let sig = handler("h");
        let req = request_on(0);
        assert_ne!(token(&resolver, &sig, &req).await, token(&resolver, &sig, &req).await);
    }

    #[tokio::test]
    async fn test_request_lifecycle() {
        let resolver = resolver_with(Counter::new(CacheLifecycle::Request));
        let middleware = handler("middleware");
        let endpoint = handler("endpoint");

        let first = request_on(0);
        let a = token(&resolver, &middleware, &first).await;
        let b = token(&resolver, &endpoint, &first).await;
        assert_eq!(a, b);
        assert_eq!(first.component_cache().len(), 1);

        let second = request_on(0);
        assert_ne!(token(&resolver, &endpoint, &second).await, a);
    }

    #[tokio::test]
    async fn test_endpoint_lifecycle() {
        let resolver = resolver_with(Counter::new(CacheLifecycle::Endpoint));
        let users = handler("users");
        let posts = handler("posts");

        let a = token(&resolver, &users, &request_on(0)).await;
        let b = token(&resolver, &users, &request_on(1)).await;
        let c = token(&resolver, &posts, &request_on(0)).await;
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(resolver.cache().endpoint_len(), 2);
    }

    #[tokio::test]
    async fn test_worker_lifecycle() {
        let resolver = resolver_with(Counter::new(CacheLifecycle::WorkerThread));
        let sig = handler("h");

        let mut seen = std::collections::HashSet::new();
        for worker in 0..3 {
            for _ in 0..4 {
                seen.insert((worker, token(&resolver, &sig, &request_on(worker)).await));
            }
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(resolver.cache().worker_len(WorkerId::new(2)), 1);
    }

    #[tokio::test]
    async fn test_app_lifecycle_without_store_is_uncached() {
        let resolver = resolver_with(Counter::new(CacheLifecycle::App));
        let sig = handler("h");
        let req = request_on(0);
        assert_ne!(token(&resolver, &sig, &req).await, token(&resolver, &sig, &req).await);
    }

    #[tokio::test]
    async fn test_app_lifecycle_with_process_store() {
        let store = Arc::new(ProcessStore::new());
        let mut resolver = resolver_with(Counter::new(CacheLifecycle::App));
        resolver.cache_mut().set_app_store(store.clone());

        let a = token(&resolver, &handler("a"), &request_on(0)).await;
        let b = token(&resolver, &handler("b"), &request_on(1)).await;
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);

        store.clear();
        assert_ne!(token(&resolver, &handler("a"), &request_on(0)).await, a);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let mut resolver = Resolver::new(Arc::new(AppContext::new("test")));
        resolver.add_component::<Failing>().unwrap();
        let sig = handler("h");

        let err = resolver
            .resolve(&sig, &request_on(0), &Prefetched::new(), None)
            .await
            .unwrap_err();
        match err {
            BoomError::ComponentFetch { param, source, .. } => {
                assert_eq!(param, "token");
                assert_eq!(source.to_string(), "database is down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(resolver.cache().endpoint_len(), 0);
    }
}
