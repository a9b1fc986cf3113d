//! Worker identity.

use std::fmt;

/// Identifies the worker that is handling a request.
///
/// The worker-scoped cache keeps one store per `WorkerId`; the runtime's
/// worker pool stamps every request it accepts with the id of the worker
/// that will run it. Requests built outside the pool belong to worker `0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(usize);

impl WorkerId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}
