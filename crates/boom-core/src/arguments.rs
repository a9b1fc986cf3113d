//! Resolved arguments handed to a callable.

use std::sync::Arc;

use crate::error::{BoomError, BoomResult};
use crate::request::Request;
use crate::signature::Parameter;
use crate::value::Value;

/// The keyword map produced by the resolver, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    entries: Vec<(String, Value)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name`, replacing any earlier binding.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// The raw value bound to `name`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// The value bound to `name` as a `T`.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> BoomResult<Arc<T>> {
        let value = self
            .value(name)
            .ok_or_else(|| BoomError::argument(name, "not bound"))?;
        value.downcast::<T>().ok_or_else(|| {
            BoomError::argument(
                name,
                format!(
                    "expected `{}`, found `{}`",
                    std::any::type_name::<T>(),
                    value.type_name()
                ),
            )
        })
    }

    /// A clone of the value bound to `name`.
    pub fn cloned<T: Clone + Send + Sync + 'static>(&self, name: &str) -> BoomResult<T> {
        self.get::<T>(name).map(|v| T::clone(&v))
    }

    /// The value bound to `name`, or `None` if unbound or of another type.
    pub fn opt<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.value(name).and_then(Value::downcast::<T>)
    }

    /// The first bound request.
    pub fn request(&self) -> BoomResult<Arc<Request>> {
        self.entries
            .iter()
            .find_map(|(_, v)| v.downcast::<Request>())
            .ok_or_else(|| BoomError::argument("request", "no request bound"))
    }

    /// The first bound parameter descriptor.
    pub fn parameter(&self) -> BoomResult<Parameter> {
        self.entries
            .iter()
            .find_map(|(_, v)| v.downcast_ref::<Parameter>().cloned())
            .ok_or_else(|| BoomError::argument("param", "no parameter bound"))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bound names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}
