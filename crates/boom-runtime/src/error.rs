//! Runtime error types.

use boom_core::{BoomError, WorkerId};
use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Application registration failed.
    #[error("Application setup failed: {0}")]
    App(#[from] BoomError),

    /// A worker thread could not be started.
    #[error("Failed to spawn worker {index}: {source}")]
    WorkerSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    /// The pool no longer accepts requests.
    #[error("Worker pool is shut down")]
    PoolClosed,

    /// A worker exited before answering.
    #[error("{0} dropped the request before responding")]
    WorkerGone(WorkerId),

    /// Installing a shutdown signal handler failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
