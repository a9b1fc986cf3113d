//! The worker pool.
//!
//! Each worker is an OS thread running its own current-thread tokio
//! runtime. Requests are handed out round-robin over bounded channels and
//! stamped with the receiving worker's [`WorkerId`] before dispatch, so
//! values cached with [`CacheLifecycle::WorkerThread`] never leave the
//! worker that computed them.
//!
//! ```rust,ignore
//! let pool = WorkerPool::start(app, &config.workers)?;
//! let response = pool.submit(Request::builder().uri("/users/7")).await?;
//! pool.shutdown();
//! pool.join();
//! ```
//!
//! [`CacheLifecycle::WorkerThread`]: boom_core::CacheLifecycle::WorkerThread

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use boom_core::{RequestBuilder, Response, WorkerId};
use boom_framework::{Boom, BoomService};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::WorkerConfig;
use crate::error::{RuntimeError, RuntimeResult};

struct Job {
    request: RequestBuilder,
    reply: oneshot::Sender<Response>,
}

/// A fixed set of worker threads serving one application.
pub struct WorkerPool {
    senders: Vec<mpsc::Sender<Job>>,
    next: AtomicUsize,
    shutdown: CancellationToken,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawns `config.count` workers serving `app`.
    pub fn start(app: Boom, config: &WorkerConfig) -> RuntimeResult<Self> {
        let count = config.count.max(1);
        let depth = config.queue_depth.max(1);
        let shutdown = CancellationToken::new();
        let mut senders = Vec::with_capacity(count);
        let mut threads = Vec::with_capacity(count);

        for index in 0..count {
            let (tx, rx) = mpsc::channel(depth);
            let worker = WorkerId::new(index);
            let service = app.clone().into_service();
            let token = shutdown.clone();

            let spawned = thread::Builder::new()
                .name(format!("boom-worker-{index}"))
                .spawn(move || run_worker(worker, service, rx, token));

            match spawned {
                Ok(handle) => {
                    senders.push(tx);
                    threads.push(handle);
                }
                Err(source) => {
                    // Stop the workers that did start.
                    shutdown.cancel();
                    return Err(RuntimeError::WorkerSpawn { index, source });
                }
            }
        }

        info!(app = app.name(), workers = count, queue_depth = depth, "Worker pool started");

        Ok(Self {
            senders,
            next: AtomicUsize::new(0),
            shutdown,
            threads: Mutex::new(threads),
        })
    }

    pub fn size(&self) -> usize {
        self.senders.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Handles a request on the next worker in turn.
    ///
    /// The request is built on the worker, with that worker's id.
    pub async fn submit(&self, request: RequestBuilder) -> RuntimeResult<Response> {
        if self.is_closed() {
            return Err(RuntimeError::PoolClosed);
        }

        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        let (reply, response) = oneshot::channel();

        self.senders[index]
            .send(Job { request, reply })
            .await
            .map_err(|_| RuntimeError::PoolClosed)?;

        response
            .await
            .map_err(|_| RuntimeError::WorkerGone(WorkerId::new(index)))
    }

    /// Stops accepting requests. In-flight requests run to completion;
    /// queued ones are dropped.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            debug!("Worker pool shutting down");
            self.shutdown.cancel();
        }
    }

    /// Blocks until every worker thread has exited.
    pub fn join(&self) {
        let threads = std::mem::take(&mut *self.threads.lock());
        for handle in threads {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!(worker = %name, "Worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.senders.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Worker loop
// =============================================================================

fn run_worker(
    worker: WorkerId,
    service: BoomService,
    rx: mpsc::Receiver<Job>,
    shutdown: CancellationToken,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(%worker, error = %e, "Failed to build worker runtime");
            return;
        }
    };

    let span = info_span!("worker", %worker);
    runtime.block_on(serve(worker, service, rx, shutdown).instrument(span));
    debug!(%worker, "Worker stopped");
}

async fn serve(
    worker: WorkerId,
    service: BoomService,
    mut rx: mpsc::Receiver<Job>,
    shutdown: CancellationToken,
) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => {
                    in_flight.spawn(handle(worker, service.clone(), job));
                }
                None => break,
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    warn!(%worker, error = %e, "Request task failed");
                }
            }
        }
    }

    rx.close();
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            warn!(%worker, error = %e, "Request task failed");
        }
    }
}

async fn handle(worker: WorkerId, service: BoomService, job: Job) {
    let request = Arc::new(job.request.worker(worker).build());
    let response = match service.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    // The caller may have given up waiting.
    let _ = job.reply.send(response);
}
