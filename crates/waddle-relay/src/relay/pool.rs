//! Bounded worker pool for relay tasks.
//!
//! Admission follows a grow-then-queue-then-overflow policy:
//! - fewer than `core_workers` workers: spawn a worker for the task
//! - otherwise: enqueue on a bounded queue
//! - queue full and fewer than `max_workers` workers: spawn an extra worker
//!   that runs the task first
//! - otherwise: reject the task
//!
//! Workers above the core count exit after `keep_alive` without work.
//! Settings can be changed at runtime; admission and reconfiguration share
//! one lock, so a submission always sees a consistent set of limits.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::metrics;

/// Default number of workers kept alive while idle.
pub const DEFAULT_CORE_WORKERS: usize = 18;

/// Default upper bound on workers.
pub const DEFAULT_MAX_WORKERS: usize = 36;

/// Default idle time after which workers above the core count exit.
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 120;

/// Default capacity of the task queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A unit of work run by the pool.
pub type Job = BoxFuture<'static, ()>;

/// Errors raised when submitting to the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool no longer accepts tasks
    #[error("Worker pool is shut down")]
    Shutdown,
}

/// How a submitted task was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A new worker was spawned with the task
    Started,
    /// The task waits in the queue
    Queued,
    /// The pool was saturated and the task was dropped
    Rejected,
}

/// Sizing of the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Workers kept alive while idle.
    pub core_workers: usize,

    /// Upper bound on workers.
    pub max_workers: usize,

    /// Idle time after which workers above `core_workers` exit.
    pub keep_alive: Duration,

    /// Capacity of the task queue. Fixed once the pool is created.
    pub queue_capacity: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            core_workers: DEFAULT_CORE_WORKERS,
            max_workers: DEFAULT_MAX_WORKERS,
            keep_alive: Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PoolSettings {
    /// Settings for `n` core workers and twice as many at most.
    pub fn with_max_workers(mut self, n: usize) -> Self {
        self.core_workers = n;
        self.max_workers = n.saturating_mul(2);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Check the settings describe a usable pool.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_workers == 0 {
            return Err(ConfigError::Invalid("core_workers must be at least 1".to_string()));
        }
        if self.max_workers < self.core_workers {
            return Err(ConfigError::Invalid(format!(
                "max_workers ({}) must not be below core_workers ({})",
                self.max_workers, self.core_workers
            )));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Live workers.
    pub workers: usize,
    pub core_workers: usize,
    pub max_workers: usize,
    /// Workers currently running a task.
    pub busy: usize,
    /// Tasks waiting in the queue.
    pub queued: usize,
    /// Tasks run to completion since creation.
    pub completed: u64,
    /// Tasks dropped because the pool was saturated.
    pub rejected: u64,
    pub keep_alive_secs: u64,
}

/// Completed tasks since the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throughput {
    pub completed_tasks: u64,
    /// Time since the previous snapshot, `None` on the first one.
    pub interval: Option<Duration>,
}

struct Shared {
    settings: Mutex<PoolSettings>,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<Job>>,
    workers: AtomicUsize,
    busy: AtomicUsize,
    queued: AtomicUsize,
    completed: AtomicU64,
    rejected: AtomicU64,
    shutdown: AtomicBool,
    last_snapshot: Mutex<Option<(Instant, u64)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    fn settings(&self) -> PoolSettings {
        lock(&self.settings).clone()
    }

    async fn run(&self, job: Job) {
        let busy = self.busy.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::record_busy_workers(busy as i64);

        if AssertUnwindSafe(job).catch_unwind().await.is_err() {
            warn!("Relay task panicked");
        }

        let busy = self.busy.fetch_sub(1, Ordering::AcqRel) - 1;
        metrics::record_busy_workers(busy as i64);
        self.completed.fetch_add(1, Ordering::AcqRel);
    }

    /// Give up one worker slot if the pool is above its core size.
    fn try_retire(&self) -> bool {
        let core = lock(&self.settings).core_workers;
        let mut current = self.workers.load(Ordering::Acquire);
        while current > core {
            match self.workers.compare_exchange(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }
}

async fn worker_loop(shared: Arc<Shared>, first: Option<Job>) {
    if let Some(job) = first {
        shared.run(job).await;
    }

    loop {
        let keep_alive = lock(&shared.settings).keep_alive;
        let next = tokio::time::timeout(keep_alive, async {
            shared.receiver.lock().await.recv().await
        })
        .await;

        match next {
            Ok(Some(job)) => {
                shared.queued.fetch_sub(1, Ordering::AcqRel);
                shared.run(job).await;
            }
            Ok(None) => break,
            Err(_) => {
                if shared.try_retire() {
                    debug!("Idle relay worker exiting");
                    return;
                }
            }
        }
    }

    shared.workers.fetch_sub(1, Ordering::AcqRel);
}

/// Pool of tokio tasks running relay jobs.
pub struct WorkerPool {
    shared: Arc<Shared>,
    tracker: TaskTracker,
    runtime: Handle,
}

impl WorkerPool {
    /// Create a pool on the current Tokio runtime. No worker is started
    /// before the first submission.
    pub fn new(settings: PoolSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let runtime = Handle::try_current().map_err(|e| ConfigError::NoRuntime(e.to_string()))?;
        let (sender, receiver) = mpsc::channel(settings.queue_capacity);

        info!(
            core_workers = settings.core_workers,
            max_workers = settings.max_workers,
            keep_alive_secs = settings.keep_alive.as_secs(),
            queue_capacity = settings.queue_capacity,
            "Relay worker pool created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                settings: Mutex::new(settings),
                sender: Mutex::new(Some(sender)),
                receiver: tokio::sync::Mutex::new(receiver),
                workers: AtomicUsize::new(0),
                busy: AtomicUsize::new(0),
                queued: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                shutdown: AtomicBool::new(false),
                last_snapshot: Mutex::new(None),
            }),
            tracker: TaskTracker::new(),
            runtime,
        })
    }

    /// Submit a job. Never waits.
    pub fn submit(&self, job: Job) -> Result<Admission, PoolError> {
        let settings = lock(&self.shared.settings);
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::Shutdown);
        }

        let workers = self.shared.workers.load(Ordering::Acquire);
        if workers < settings.core_workers {
            self.spawn_worker(Some(job));
            return Ok(Admission::Started);
        }

        let sender = lock(&self.shared.sender);
        let Some(sender) = sender.as_ref() else {
            return Err(PoolError::Shutdown);
        };

        self.shared.queued.fetch_add(1, Ordering::AcqRel);
        match sender.try_send(job) {
            Ok(()) => Ok(Admission::Queued),
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.shared.queued.fetch_sub(1, Ordering::AcqRel);
                if workers < settings.max_workers {
                    self.spawn_worker(Some(job));
                    Ok(Admission::Started)
                } else {
                    self.reject(job, workers);
                    Ok(Admission::Rejected)
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.shared.queued.fetch_sub(1, Ordering::AcqRel);
                Err(PoolError::Shutdown)
            }
        }
    }

    fn spawn_worker(&self, first: Option<Job>) {
        let count = self.shared.workers.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(workers = count, "Spawning relay worker");
        self.tracker
            .spawn_on(worker_loop(Arc::clone(&self.shared), first), &self.runtime);
    }

    fn reject(&self, job: Job, workers: usize) {
        self.shared.rejected.fetch_add(1, Ordering::AcqRel);
        metrics::record_relay_rejected();
        info!(
            workers,
            queued = self.shared.queued.load(Ordering::Acquire),
            "Relay pool saturated, dropping task"
        );
        drop(job);
    }

    /// Stop accepting jobs. Queued and running jobs still complete.
    pub fn shutdown(&self) {
        let _settings = lock(&self.shared.settings);
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        lock(&self.shared.sender).take();
        self.tracker.close();
        info!("Relay worker pool shutting down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Wait until every worker has exited. Only returns after [`shutdown`](Self::shutdown).
    pub async fn join(&self) {
        self.tracker.wait().await;
    }

    /// Set `n` core workers and `2n` maximum workers.
    pub fn set_max_workers(&self, n: usize) -> Result<(), ConfigError> {
        let mut settings = lock(&self.shared.settings);
        let updated = settings.clone().with_max_workers(n);
        updated.validate()?;
        info!(
            core_workers = updated.core_workers,
            max_workers = updated.max_workers,
            "Relay worker limits updated"
        );
        *settings = updated;
        Ok(())
    }

    pub fn set_keep_alive(&self, keep_alive: Duration) {
        lock(&self.shared.settings).keep_alive = keep_alive;
    }

    pub fn settings(&self) -> PoolSettings {
        self.shared.settings()
    }

    pub fn stats(&self) -> PoolStats {
        let settings = self.shared.settings();
        PoolStats {
            workers: self.shared.workers.load(Ordering::Acquire),
            core_workers: settings.core_workers,
            max_workers: settings.max_workers,
            busy: self.shared.busy.load(Ordering::Acquire),
            queued: self.shared.queued.load(Ordering::Acquire),
            completed: self.shared.completed.load(Ordering::Acquire),
            rejected: self.shared.rejected.load(Ordering::Acquire),
            keep_alive_secs: settings.keep_alive.as_secs(),
        }
    }

    /// Completed jobs since the previous call.
    ///
    /// Callers polling from several tasks get interleaved intervals.
    pub fn throughput_snapshot(&self) -> Throughput {
        let mut last = lock(&self.shared.last_snapshot);
        let now = Instant::now();
        let completed = self.shared.completed.load(Ordering::Acquire);

        let throughput = match *last {
            Some((at, previous)) => Throughput {
                completed_tasks: completed.saturating_sub(previous),
                interval: Some(now.duration_since(at)),
            },
            None => Throughput {
                completed_tasks: completed,
                interval: None,
            },
        };
        *last = Some((now, completed));
        throughput
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closes the queue so idle workers see the end of the channel.
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("stats", &self.stats()).finish()
    }
}
