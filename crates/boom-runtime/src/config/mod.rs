//! Configuration for the Boom runtime.
//!
//! Settings are layered with figment: built-in defaults, then files, then
//! `BOOM_` environment variables, then programmatic overrides.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    AppConfig, BoomConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig,
    WorkerConfig,
};
pub use validation::validate_config;
