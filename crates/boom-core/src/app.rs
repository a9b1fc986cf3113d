//! Application-owned state shared with components.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

/// Cached wall-clock time in unix seconds.
///
/// Reading the clock is a single atomic load; the runtime refreshes it on a
/// fixed tick so hot paths never hit the system clock.
#[derive(Debug, Clone)]
pub struct AppClock {
    secs: Arc<AtomicU64>,
}

impl AppClock {
    pub fn new() -> Self {
        let clock = Self {
            secs: Arc::new(AtomicU64::new(0)),
        };
        clock.refresh();
        clock
    }

    /// The cached time.
    pub fn now(&self) -> u64 {
        self.secs.load(Ordering::Relaxed)
    }

    /// Re-reads the system clock.
    pub fn refresh(&self) {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.secs.store(secs, Ordering::Relaxed);
    }

    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::Relaxed);
    }
}

impl Default for AppClock {
    fn default() -> Self {
        Self::new()
    }
}

/// The application a resolver and its components are bound to.
#[derive(Debug)]
pub struct AppContext {
    name: String,
    server_name: Option<String>,
    clock: AppClock,
    state: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl AppContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server_name: None,
            clock: AppClock::new(),
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Sets the host used for external URLs.
    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn clock(&self) -> &AppClock {
        &self.clock
    }

    /// Stores shared state of type `T`, replacing any previous value.
    pub fn insert_state<T: Send + Sync + 'static>(&self, value: T) {
        self.state.write().insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Shared state of type `T`.
    pub fn state<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.state
            .read()
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_by_type() {
        let app = AppContext::new("test");
        assert!(app.state::<u32>().is_none());
        app.insert_state(5_u32);
        assert_eq!(*app.state::<u32>().unwrap(), 5);
    }

    #[test]
    fn test_clock_is_shared_between_clones() {
        let clock = AppClock::new();
        let other = clock.clone();
        assert!(clock.now() > 0);
        clock.set(42);
        assert_eq!(other.now(), 42);
    }
}
