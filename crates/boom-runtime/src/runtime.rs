//! Runtime orchestration.
//!
//! [`BoomRuntime`] ties configuration, logging, the application and the
//! worker pool together:
//!
//! 1. load and validate configuration;
//! 2. initialize logging;
//! 3. build the application from the configured settings;
//! 4. start the clock ticker and the worker pool;
//! 5. wait for Ctrl+C (or SIGTERM), then shut down gracefully.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use boom_runtime::BoomRuntime;
//!
//! let runtime = BoomRuntime::builder()
//!     .config_file("config/boom.toml")
//!     .profile("production")
//!     .build()?;
//!
//! let app = runtime.build_app(|app| {
//!     app.component::<UserComponent>()?
//!         .route("/users/:id", user_details())
//! })?;
//!
//! runtime.run(app).await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use boom_core::{AppContext, BoomResult, RequestBuilder, Response};
use boom_framework::{Boom, BoomBuilder};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{BoomConfig, ConfigLoader, ConfigResult, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::worker::WorkerPool;

/// Orchestrates a Boom application from configuration.
#[derive(Debug, Clone)]
pub struct BoomRuntime {
    config: BoomConfig,
}

impl BoomRuntime {
    /// Loads configuration from the current directory and the environment.
    ///
    /// Falls back to defaults when loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .and_then(|config| validate_config(&config).map(|()| config))
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                BoomConfig::default()
            });

        Self::from_config(&config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from loaded configuration and initializes logging.
    pub fn from_config(config: &BoomConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            app = %config.app.name,
            workers = config.workers.count,
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &BoomConfig {
        &self.config
    }

    /// An application builder carrying the configured name, server name,
    /// cache sizes and response timeout.
    pub fn app_builder(&self) -> BoomBuilder {
        let settings = &self.config.app;

        let mut context = AppContext::new(settings.name.clone());
        if let Some(server_name) = &settings.server_name {
            context = context.with_server_name(server_name.clone());
        }

        let mut builder = Boom::with_context(context)
            .router_cache_size(settings.router_cache_size)
            .resolver_cache_size(settings.resolver_cache_size);
        if let Some(timeout) = settings.response_timeout() {
            builder = builder.response_timeout(timeout);
        }
        builder
    }

    /// Builds the application with `configure` applied to
    /// [`app_builder`](Self::app_builder).
    pub fn build_app<F>(&self, configure: F) -> RuntimeResult<Boom>
    where
        F: FnOnce(BoomBuilder) -> BoomResult<BoomBuilder>,
    {
        Ok(configure(self.app_builder())?.build())
    }

    /// Starts the clock ticker and the worker pool for `app`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, app: Boom) -> RuntimeResult<RuntimeHandle> {
        let pool = Arc::new(WorkerPool::start(app.clone(), &self.config.workers)?);

        let stop = CancellationToken::new();
        let ticker = tokio::spawn(run_clock(
            app.clone(),
            self.config.app.clock_tick(),
            stop.clone(),
        ));

        info!(app = app.name(), "Boom runtime started");

        Ok(RuntimeHandle {
            app,
            pool,
            ticker,
            stop,
        })
    }

    /// Runs `app` until Ctrl+C or SIGTERM.
    pub async fn run(&self, app: Boom) -> RuntimeResult<()> {
        let handle = self.start(app)?;
        info!("Boom runtime is now running. Press Ctrl+C to stop.");

        let waited = wait_for_shutdown().await;
        handle.shutdown().await;
        waited
    }

    /// Runs `app` until `shutdown` completes.
    pub async fn run_until<F>(&self, app: Boom, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let handle = self.start(app)?;
        shutdown.await;
        handle.shutdown().await;
        Ok(())
    }
}

impl Default for BoomRuntime {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_clock(app: Boom, tick: std::time::Duration, stop: CancellationToken) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = interval.tick() => app.clock().refresh(),
        }
    }
    debug!("Clock ticker stopped");
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(RuntimeError::Signal)?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(RuntimeError::Signal)?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map_err(RuntimeError::Signal)?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeHandle
// =============================================================================

/// A started application: its worker pool and clock ticker.
#[derive(Debug)]
pub struct RuntimeHandle {
    app: Boom,
    pool: Arc<WorkerPool>,
    ticker: JoinHandle<()>,
    stop: CancellationToken,
}

impl RuntimeHandle {
    pub fn app(&self) -> &Boom {
        &self.app
    }

    /// The pool, for transports that submit requests from other tasks.
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub async fn submit(&self, request: RequestBuilder) -> RuntimeResult<Response> {
        self.pool.submit(request).await
    }

    /// Stops the ticker and the pool, waiting for in-flight requests.
    pub async fn shutdown(self) {
        info!("Stopping Boom runtime");
        self.stop.cancel();
        if let Err(e) = self.ticker.await {
            warn!(error = %e, "Clock ticker failed");
        }

        self.pool.shutdown();
        let pool = Arc::clone(&self.pool);
        if let Err(e) = tokio::task::spawn_blocking(move || pool.join()).await {
            warn!(error = %e, "Failed to join worker threads");
        }
        info!("Boom runtime stopped");
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`BoomRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: BoomConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads, validates and applies the configuration.
    pub fn build(self) -> ConfigResult<BoomRuntime> {
        let config = self.config_loader.load()?;
        validate_config(&config)?;
        Ok(BoomRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
