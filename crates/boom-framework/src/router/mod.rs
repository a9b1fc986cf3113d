//! URL routing.
//!
//! The [`Router`] maps `(path, method)` to a handler, the middlewares layered
//! along the matched path, the captured path parameters and the template that
//! matched. Templates use `:name` for a single segment and `*name` for the
//! rest of the path:
//!
//! ```rust,ignore
//! use boom_framework::router::{Router, RouteOptions};
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.add("/users/:id", [Method::GET], user_details, RouteOptions::default())?;
//! router.add("/static/*path", [Method::GET], serve, RouteOptions::named("static"))?;
//!
//! let found = router.lookup("/users/42", &Method::GET)?;
//! assert_eq!(found.uri_template(), "/users/:id");
//! ```
//!
//! # Matching rules
//!
//! - Literal segments win over `:captures`, which win over `*wildcards`; a
//!   branch that dead-ends is abandoned for the next candidate.
//! - A path that reaches nodes with routes, but none for the method, fails
//!   with [`BoomError::MethodNotAllowed`] listing the methods of all of them.
//! - Successful lookups are memoized per exact `(method, path)` in an LRU.
//!
//! Routes are registered during setup only; they are never removed.

mod path;
mod tree;
mod url;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use boom_core::{BoomError, BoomResult, BoxedCallable};
use http::Method;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::middleware::{Middleware, Phase};

pub use path::normalize;
pub use url::{UrlOptions, UrlParam};

use path::{parse_template, segments};
use tree::{Node, Trail};

/// Default capacity of the lookup memo.
pub const DEFAULT_LOOKUP_CACHE_SIZE: usize = 1024;

/// An immutable, named binding of a template to per-method handlers.
pub struct Route {
    name: String,
    uri: String,
    handlers: HashMap<Method, BoxedCallable>,
}

impl Route {
    pub(crate) fn new(
        name: String,
        uri: String,
        handlers: HashMap<Method, BoxedCallable>,
    ) -> Self {
        Self {
            name,
            uri,
            handlers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The normalized template.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn methods(&self) -> HashSet<Method> {
        self.handlers.keys().cloned().collect()
    }

    pub fn handler(&self, method: &Method) -> Option<&BoxedCallable> {
        self.handlers.get(method)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("uri", &self.uri)
            .field("methods", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Result of a successful lookup.
#[derive(Clone)]
pub struct RouteMatch {
    route: Arc<Route>,
    handler: BoxedCallable,
    middlewares: Vec<Middleware>,
    params: Vec<(String, String)>,
}

impl RouteMatch {
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn handler(&self) -> &BoxedCallable {
        &self.handler
    }

    /// Layered middlewares that apply, root to leaf, registration order
    /// within each node.
    pub fn middlewares(&self) -> &[Middleware] {
        &self.middlewares
    }

    /// The layered middlewares of one phase, in order.
    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &Middleware> {
        self.middlewares.iter().filter(move |m| m.phase() == phase)
    }

    /// Captured path parameters in template order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// The template that matched.
    pub fn uri_template(&self) -> &str {
        self.route.uri()
    }
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("route", &self.route)
            .field("middlewares", &self.middlewares)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Optional settings for [`Router::add`].
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    /// Route name for reverse lookups; defaults to the handler's name.
    pub name: Option<String>,
    /// Prefixes the template with `/v{version}`.
    pub version: Option<String>,
    /// Registers a layered middleware of this phase instead of a route.
    pub middleware: Option<Phase>,
}

impl RouteOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn middleware(phase: Phase) -> Self {
        Self {
            middleware: Some(phase),
            ..Self::default()
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Prefix tree of routes and layered middlewares.
pub struct Router {
    root: Node,
    names: HashMap<String, Arc<Route>>,
    memo: Mutex<LruCache<(Method, String), Arc<RouteMatch>>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_LOOKUP_CACHE_SIZE)
    }

    /// A router whose lookup memo holds up to `size` entries.
    pub fn with_cache_size(size: usize) -> Self {
        Self {
            root: Node::default(),
            names: HashMap::new(),
            memo: Mutex::new(LruCache::new(
                NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Resizes the lookup memo.
    pub fn set_cache_size(&mut self, size: usize) {
        self.memo
            .get_mut()
            .resize(NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN));
    }

    /// Registers a handler (or, with [`RouteOptions::middleware`], a layered
    /// middleware) for `methods` at `uri`.
    ///
    /// # Errors
    ///
    /// - [`BoomError::InvalidRoute`] for an empty method set, a repeated
    ///   capture name, or a wildcard that is not the last segment.
    /// - [`BoomError::RouteConflict`] if the route name is taken or a route
    ///   already exists for one of the methods at this template.
    pub fn add(
        &mut self,
        uri: &str,
        methods: impl IntoIterator<Item = Method>,
        handler: BoxedCallable,
        options: RouteOptions,
    ) -> BoomResult<()> {
        let methods: HashSet<Method> = methods.into_iter().collect();
        if methods.is_empty() {
            return Err(BoomError::invalid_route(uri, "at least one method is required"));
        }

        if let Some(phase) = options.middleware {
            return self.add_middleware(uri, options.version.as_deref(), methods, handler, phase);
        }

        let name = options
            .name
            .unwrap_or_else(|| handler.signature().name().to_string());
        let handlers = methods
            .into_iter()
            .map(|m| (m, Arc::clone(&handler)))
            .collect();
        self.add_route(uri, options.version.as_deref(), name, handlers)
    }

    /// Registers one route whose methods each have their own handler.
    pub fn add_route(
        &mut self,
        uri: &str,
        version: Option<&str>,
        name: String,
        handlers: HashMap<Method, BoxedCallable>,
    ) -> BoomResult<()> {
        if handlers.is_empty() {
            return Err(BoomError::invalid_route(uri, "at least one method is required"));
        }
        if self.names.contains_key(&name) {
            return Err(BoomError::RouteConflict(format!(
                "route name `{name}` is already registered"
            )));
        }

        let template = normalize(uri, version);
        let segments = parse_template(&template)?;
        let node = self.root.insert(&template, &segments)?;

        if let Some(taken) = handlers.keys().find(|m| node.routes.contains_key(*m)) {
            return Err(BoomError::RouteConflict(format!(
                "{taken} `{template}` is already registered"
            )));
        }

        let route = Arc::new(Route::new(name.clone(), template, handlers));
        for method in route.handlers.keys() {
            node.routes.insert(method.clone(), Arc::clone(&route));
        }
        debug!(
            route = %name,
            uri = %route.uri,
            methods = ?route.handlers.keys().collect::<Vec<_>>(),
            "Route registered"
        );

        self.names.insert(name, route);
        self.memo.lock().clear();
        Ok(())
    }

    fn add_middleware(
        &mut self,
        uri: &str,
        version: Option<&str>,
        methods: HashSet<Method>,
        callable: BoxedCallable,
        phase: Phase,
    ) -> BoomResult<()> {
        let template = normalize(uri, version);
        let segments = parse_template(&template)?;
        let node = self.root.insert(&template, &segments)?;

        debug!(
            middleware = callable.signature().name(),
            scope = %template,
            phase = %phase,
            "Layered middleware registered"
        );
        node.middlewares
            .push(Middleware::new(callable, phase, methods, template));
        self.memo.lock().clear();
        Ok(())
    }

    /// Finds the route for `path` and `method`.
    ///
    /// Layered middlewares are collected root to leaf from the nodes of the
    /// matched branch and from the nodes whose scope is a literal prefix of
    /// `path`, so `/api/admin` middlewares also run for `/api/admin/list`
    /// when that path is served by `/api/:section/list`.
    ///
    /// # Errors
    ///
    /// - [`BoomError::RouteNotFound`] if no route matches the path.
    /// - [`BoomError::MethodNotAllowed`] if routes match the path, but none
    ///   for `method`; `allowed` holds the methods of every matching route.
    pub fn lookup(&self, path: &str, method: &Method) -> BoomResult<Arc<RouteMatch>> {
        let path = normalize(path, None);
        let key = (method.clone(), path);

        if let Some(hit) = self.memo.lock().get(&key) {
            trace!(path = %key.1, "Route lookup served from memo");
            return Ok(Arc::clone(hit));
        }

        let (method, path) = key;
        let parts = segments(&path);
        let root = &self.root;
        let mut matched = None;
        let mut allowed: Option<HashSet<Method>> = None;

        root.search(&parts, &mut (Vec::new(), Vec::new()), &mut |trail| {
            let Some(leaf) = trail.0.last() else {
                return false;
            };
            match leaf.routes.get(&method) {
                Some(route) => {
                    matched = Self::assemble(root, route, &method, trail, &parts);
                    matched.is_some()
                }
                None => {
                    allowed
                        .get_or_insert_with(HashSet::new)
                        .extend(leaf.routes.keys().cloned());
                    false
                }
            }
        });

        match matched {
            Some(found) => {
                let found = Arc::new(found);
                self.memo.lock().put((method, path), Arc::clone(&found));
                Ok(found)
            }
            None => match allowed {
                Some(allowed) => Err(BoomError::MethodNotAllowed {
                    method,
                    path,
                    allowed,
                }),
                None => Err(BoomError::RouteNotFound { path }),
            },
        }
    }

    fn assemble(
        root: &Node,
        route: &Arc<Route>,
        method: &Method,
        trail: &Trail<'_>,
        parts: &[&str],
    ) -> Option<RouteMatch> {
        let handler = Arc::clone(route.handler(method)?);
        let literal = root.literal_chain(parts);
        let depth = trail.0.len().max(literal.len());

        let middlewares = (0..depth)
            .flat_map(|level| {
                let on_trail = trail.0.get(level).copied();
                let off_trail = literal
                    .get(level)
                    .copied()
                    .filter(|node| on_trail.is_none_or(|t| !std::ptr::eq(*node, t)));
                on_trail.into_iter().chain(off_trail)
            })
            .flat_map(|node| node.middlewares.iter())
            .filter(|m| m.applies_to(method))
            .cloned()
            .collect();

        Some(RouteMatch {
            route: Arc::clone(route),
            handler,
            middlewares,
            params: trail.1.clone(),
        })
    }

    /// The union of the methods of every route matching `url`.
    pub fn supported_methods(&self, url: &str) -> HashSet<Method> {
        let path = normalize(url, None);
        let mut methods = HashSet::new();
        self.root.search(
            &segments(&path),
            &mut (Vec::new(), Vec::new()),
            &mut |trail| {
                if let Some(leaf) = trail.0.last() {
                    methods.extend(leaf.routes.keys().cloned());
                }
                false
            },
        );
        methods
    }

    /// The template and route registered under `name`.
    pub fn find_route_by_name(&self, name: &str) -> Option<(&str, &Arc<Route>)> {
        self.names.get(name).map(|route| (route.uri(), route))
    }

    /// Every registered route, in no particular order.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.names.values()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.names.len())
            .finish_non_exhaustive()
    }
}
