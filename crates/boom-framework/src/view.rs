//! Class-style views: one route, one callable per method.

use std::collections::HashMap;
use std::fmt;

use boom_core::BoxedCallable;
use http::Method;

/// Per-method handlers registered together under one route name.
///
/// Handlers whose signature is marked with
/// [`view_method`](boom_core::SignatureBuilder::view_method) receive the
/// request through a variadic positional parameter.
///
/// ```rust,ignore
/// let users = MethodView::new("users")
///     .get(list_users)
///     .post(create_user);
/// app = app.view("/users", users)?;
/// ```
#[derive(Clone)]
pub struct MethodView {
    name: String,
    handlers: HashMap<Method, BoxedCallable>,
}

impl MethodView {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: HashMap::new(),
        }
    }

    /// Binds `handler` to `method`, replacing any earlier binding.
    pub fn method(mut self, method: Method, handler: BoxedCallable) -> Self {
        self.handlers.insert(method, handler);
        self
    }

    pub fn get(self, handler: BoxedCallable) -> Self {
        self.method(Method::GET, handler)
    }

    pub fn post(self, handler: BoxedCallable) -> Self {
        self.method(Method::POST, handler)
    }

    pub fn put(self, handler: BoxedCallable) -> Self {
        self.method(Method::PUT, handler)
    }

    pub fn patch(self, handler: BoxedCallable) -> Self {
        self.method(Method::PATCH, handler)
    }

    pub fn delete(self, handler: BoxedCallable) -> Self {
        self.method(Method::DELETE, handler)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.handlers.keys()
    }

    pub(crate) fn into_parts(self) -> (String, HashMap<Method, BoxedCallable>) {
        (self.name, self.handlers)
    }
}

impl fmt::Debug for MethodView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodView")
            .field("name", &self.name)
            .field("methods", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
