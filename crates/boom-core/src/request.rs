//! The request object seen by handlers, middlewares and components.
//!
//! A [`Request`] is built once per inbound request, wrapped in an `Arc`, and
//! shared by every callable that runs for it. Besides the wire data it carries
//! three pieces of per-request state:
//!
//! - a string-keyed scratch map ([`Request::set`] / [`Request::get`]) that
//!   middlewares and handlers use to pass data along,
//! - the request-lifecycle component cache ([`Request::component_cache`]),
//! - a [`CancellationToken`] that aborts handling when cancelled.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::signature::ParamSlot;
use crate::value::Value;
use crate::worker::WorkerId;

/// Parsed query string arguments, preserving order and repeated keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryArgs(Vec<(String, String)>);

impl QueryArgs {
    /// Parses an `application/x-www-form-urlencoded` query string.
    pub fn parse(query: &str) -> Self {
        Self(
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Values cached for the lifetime of one request, keyed by parameter slot.
#[derive(Default)]
pub struct RequestCache {
    entries: Mutex<HashMap<ParamSlot, Value>>,
}

impl RequestCache {
    pub fn get(&self, slot: &ParamSlot) -> Option<Value> {
        self.entries.lock().get(slot).cloned()
    }

    /// Stores `value` unless another flow stored one first; returns the
    /// value that ends up cached.
    pub fn insert(&self, slot: ParamSlot, value: Value) -> Value {
        self.entries.lock().entry(slot).or_insert(value).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// An inbound HTTP request.
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    peer_addr: Option<SocketAddr>,
    worker: WorkerId,
    uri_template: OnceLock<String>,
    args: OnceLock<QueryArgs>,
    scratch: Mutex<HashMap<String, Value>>,
    cache: RequestCache,
    cancel: CancellationToken,
}

impl Request {
    /// Starts building a request.
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string, if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Parsed query arguments, computed on first access.
    pub fn args(&self) -> &QueryArgs {
        self.args.get_or_init(|| {
            self.query
                .as_deref()
                .map(QueryArgs::parse)
                .unwrap_or_default()
        })
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// The connected peer, if known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// The client address: the left-most `X-Forwarded-For` entry, then
    /// `Forwarded-For`, then the peer address.
    pub fn remote_addr(&self) -> Option<String> {
        ["x-forwarded-for", "forwarded-for"]
            .iter()
            .filter_map(|name| self.header(name))
            .find_map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .find(|entry| !entry.is_empty())
                    .map(str::to_string)
            })
            .or_else(|| self.peer_addr.map(|addr| addr.ip().to_string()))
    }

    /// The worker handling this request, as stamped by
    /// [`RequestBuilder::worker`].
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// The route template that matched, once routing has happened.
    pub fn uri_template(&self) -> Option<&str> {
        self.uri_template.get().map(String::as_str)
    }

    /// Records the matched route template. Only the first call has effect.
    pub fn set_uri_template(&self, template: impl Into<String>) {
        let _ = self.uri_template.set(template.into());
    }

    /// Stores a value in the scratch map, returning the previous one.
    pub fn set<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) -> Option<Value> {
        self.scratch.lock().insert(key.into(), Value::new(value))
    }

    /// Reads a scratch value of type `T`.
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        self.scratch.lock().get(key).and_then(Value::downcast::<T>)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.scratch.lock().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.scratch.lock().remove(key)
    }

    /// The request-lifecycle component cache.
    pub fn component_cache(&self) -> &RequestCache {
        &self.cache
    }

    /// Token that aborts handling of this request when cancelled.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("worker", &self.worker)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Request`].
#[derive(Debug, Default)]
#[must_use]
pub struct RequestBuilder {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Bytes,
    peer_addr: Option<SocketAddr>,
    worker: WorkerId,
    cancel: Option<CancellationToken>,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the target as `path[?query]`.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Appends a header; invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Sets the worker running the request.
    ///
    /// Defaults to `WorkerId::default()` (worker `0`). Worker-scoped cache
    /// values are keyed by this id, so callers that run requests on several
    /// threads must stamp each one with the id of the thread's worker, as
    /// the runtime's worker pool does. Unstamped requests all share the
    /// store of worker `0`.
    pub fn worker(mut self, worker: WorkerId) -> Self {
        self.worker = worker;
        self
    }

    /// Ties the request to an externally owned cancellation token.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Request {
        let (mut path, query) = match self.uri.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (self.uri, None),
        };
        if path.is_empty() {
            path.push('/');
        }

        Request {
            method: self.method,
            path,
            query,
            headers: self.headers,
            body: self.body,
            peer_addr: self.peer_addr,
            worker: self.worker,
            uri_template: OnceLock::new(),
            args: OnceLock::new(),
            scratch: Mutex::new(HashMap::new()),
            cache: RequestCache::default(),
            cancel: self.cancel.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_splits_query() {
        let request = Request::builder()
            .uri("/search?q=rust&tag=a&tag=b")
            .build();

        assert_eq!(request.path(), "/search");
        assert_eq!(request.args().get("q"), Some("rust"));
        assert_eq!(request.args().get_all("tag"), vec!["a", "b"]);
        assert_eq!(request.method(), &Method::GET);
    }

    #[test]
    fn test_scratch_map() {
        let request = Request::builder().uri("/").build();
        assert!(request.set("hello", 1_i64).is_none());
        let hello = request.get::<i64>("hello").unwrap();
        request.set("hello", *hello + 1);

        assert_eq!(*request.get::<i64>("hello").unwrap(), 2);
        assert!(request.get::<String>("hello").is_none());
    }

    #[test]
    fn test_remote_addr_prefers_forwarded_headers() {
        let request = Request::builder()
            .uri("/")
            .header(
                "X-Forwarded-For",
                "177.139.233.139, 198.84.193.157, 198.84.193.158",
            )
            .header("Forwarded-For", "177.139.233.133")
            .peer_addr("127.0.0.1:9000".parse().unwrap())
            .build();
        assert_eq!(request.remote_addr().as_deref(), Some("177.139.233.139"));

        let direct = Request::builder()
            .uri("/")
            .peer_addr("10.0.0.2:9000".parse().unwrap())
            .build();
        assert_eq!(direct.remote_addr().as_deref(), Some("10.0.0.2"));

        assert!(Request::builder().build().remote_addr().is_none());
    }

    #[test]
    fn test_json_body() {
        let request = Request::builder()
            .method(Method::POST)
            .body(r#"{"hello": "world"}"#)
            .build();
        let body: serde_json::Value = request.json().unwrap();
        assert_eq!(body["hello"], "world");
    }

    #[test]
    fn test_uri_template_is_set_once() {
        let request = Request::builder().uri("/users/1").build();
        assert!(request.uri_template().is_none());
        request.set_uri_template("/users/:id");
        request.set_uri_template("/other");
        assert_eq!(request.uri_template(), Some("/users/:id"));
    }
}
