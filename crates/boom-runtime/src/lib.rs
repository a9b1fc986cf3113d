//! Boom Runtime - orchestration layer for Boom applications.
//!
//! This crate provides:
//! - Layered configuration (`BoomConfig`, `ConfigLoader`) on figment
//! - Logging setup on `tracing-subscriber` (`LoggingBuilder`)
//! - The `WorkerPool`, which gives each worker thread its own `WorkerId`
//! - Runtime orchestration (`BoomRuntime`)
//!
//! ```ignore
//! use boom_runtime::BoomRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = BoomRuntime::new();
//!     let app = runtime.build_app(|app| app.route("/health", health()))?;
//!
//!     // Run until Ctrl+C
//!     runtime.run(app).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod worker;

pub use config::{BoomConfig, ConfigError, ConfigLoader, ConfigResult};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{BoomRuntime, RuntimeBuilder, RuntimeHandle};
pub use worker::WorkerPool;

// Re-export tracing for use by applications
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for applications.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
