//! Single-worker FIFO dispatcher for background tasks.
//!
//! The queue is an unbounded Tokio channel. Producers never wait and are
//! never refused. The worker flag moves STOPPED -> RUNNING through a
//! compare-and-swap in [`Dispatcher::submit`], so however many threads race
//! on `submit`, exactly one of them spawns the worker loop. The loop resets
//! the flag through a drop guard, which also covers the loop being aborted.
//!
//! Each task runs in its own spawned Tokio task that the worker awaits before
//! taking the next one. Tasks therefore never overlap, and a panicking
//! handler surfaces as a `JoinError` instead of tearing down the loop. A task
//! aborted by a timeout or by shutdown is still awaited until it has stopped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tokio::sync::{Notify, mpsc};
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, debug, error, info, warn};

use super::{Task, TaskHandler};
use crate::error::Error;
use crate::telemetry::metrics;
use crate::telemetry::task::{record_outcome, start_task_span};

/// Dispatcher tuning.
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Abort a task that runs longer than this and move on. None = no limit.
    pub task_timeout: Option<Duration>,
}

/// Counter snapshot. Every submitted task ends up in exactly one of
/// `completed`, `failed`, `timed_out` or `discarded`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub discarded: u64,
    pub workers_started: u64,
}

impl DispatcherStats {
    /// Tasks submitted but not yet accounted for.
    pub fn in_flight(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed + self.failed + self.timed_out + self.discarded)
    }
}

/// Handle to the background task queue.
///
/// Cloning is cheap and every clone feeds the same queue and worker, so one
/// dispatcher is built at startup and handed to whatever needs to defer work.
pub struct Dispatcher<H> {
    inner: Arc<Inner<H>>,
}

impl<H> Clone for Dispatcher<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<H> {
    handler: Arc<H>,
    config: DispatcherConfig,
    tx: mpsc::UnboundedSender<Task>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Task>>,
    running: AtomicBool,
    worker: Mutex<Option<WorkerHandle>>,
    /// Submitted tasks not yet executed or discarded.
    pending: AtomicU64,
    idle: Notify,
    counters: Counters,
}

struct WorkerHandle {
    stop: Arc<Notify>,
    join: JoinHandle<()>,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    discarded: AtomicU64,
    workers_started: AtomicU64,
}

enum Outcome {
    Completed,
    Failed(Error),
    Panicked(String),
    TimedOut(Duration),
    Cancelled,
}

impl<H: TaskHandler> Dispatcher<H> {
    pub fn new(handler: H, config: DispatcherConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                handler: Arc::new(handler),
                config,
                tx,
                rx: tokio::sync::Mutex::new(rx),
                running: AtomicBool::new(false),
                worker: Mutex::new(None),
                pending: AtomicU64::new(0),
                idle: Notify::new(),
                counters: Counters::default(),
            }),
        }
    }

    /// Queue a task and make sure a worker is draining the queue.
    ///
    /// Never blocks and never rejects. The outcome of the task is not
    /// observable by the caller.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime, since it may spawn the worker.
    pub fn submit(&self, task: Task) {
        let kind = task.kind();
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        self.inner.counters.submitted.fetch_add(1, Ordering::Relaxed);
        metrics::tasks_submitted().add(1, &[KeyValue::new("task", kind)]);

        if let Err(mpsc::error::SendError(task)) = self.inner.tx.send(task) {
            // The receiver is owned by `inner`, so the channel outlives every sender.
            error!(task = task.kind(), "task queue closed, dropping task");
            self.inner.counters.discarded.fetch_add(1, Ordering::Relaxed);
            self.inner.finish_one();
            return;
        }
        debug!(task = kind, "task queued");

        self.ensure_worker();
    }

    fn ensure_worker(&self) {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let stop = Arc::new(Notify::new());
        let join = tokio::spawn(run_worker(Arc::clone(&self.inner), Arc::clone(&stop)));
        *self
            .inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(WorkerHandle { stop, join });
    }

    /// Whether a worker loop is currently active.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> DispatcherStats {
        let c = &self.inner.counters;
        DispatcherStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            timed_out: c.timed_out.load(Ordering::Relaxed),
            discarded: c.discarded.load(Ordering::Relaxed),
            workers_started: c.workers_started.load(Ordering::Relaxed),
        }
    }

    /// Wait until every task submitted so far has run or been discarded.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop the worker loop.
    ///
    /// The task in progress, if any, is aborted. Tasks still queued are
    /// discarded. A later [`submit`](Self::submit) starts a fresh worker.
    pub async fn shutdown(&self) {
        let worker = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker) = worker else {
            return;
        };

        worker.stop.notify_one();
        if let Err(e) = worker.join.await {
            error!(error = %e, "task worker did not stop cleanly");
        }
    }
}

/// Resets the worker flag when the loop exits, however it exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn run_worker<H: TaskHandler>(inner: Arc<Inner<H>>, stop: Arc<Notify>) {
    let _running = RunningGuard(&inner.running);
    inner
        .counters
        .workers_started
        .fetch_add(1, Ordering::Relaxed);
    metrics::worker_starts().add(1, &[]);
    info!("task worker started");

    let mut rx = inner.rx.lock().await;
    loop {
        let task = tokio::select! {
            biased;
            _ = stop.notified() => break,
            next = rx.recv() => match next {
                Some(task) => task,
                None => break,
            },
        };

        if !inner.execute(task, &stop).await {
            break;
        }
    }

    let mut discarded = 0;
    while let Ok(task) = rx.try_recv() {
        debug!(task = task.kind(), user_id = %task.user_id(), "discarding queued task");
        inner.discard();
        discarded += 1;
    }
    info!(discarded, "task worker stopped");
}

impl<H: TaskHandler> Inner<H> {
    /// Run one task to its end. Returns false if the worker was told to stop.
    async fn execute(&self, task: Task, stop: &Notify) -> bool {
        let kind = task.kind();
        let user_id = task.user_id();
        let span = start_task_span(kind, &user_id.to_string());
        let started = Instant::now();

        let handler = Arc::clone(&self.handler);
        let mut handle = tokio::spawn(
            async move { handler.handle(task).await }.instrument(span.clone()),
        );

        let finished = tokio::select! {
            biased;
            _ = stop.notified() => None,
            outcome = join_task(&mut handle, self.config.task_timeout) => Some(outcome),
        };
        let outcome = match finished {
            Some(outcome) => outcome,
            None => {
                cancel(&mut handle).await;
                Outcome::Cancelled
            }
        };

        let elapsed = started.elapsed();
        let labels = [KeyValue::new("task", kind)];
        metrics::task_duration_ms().record(elapsed.as_secs_f64() * 1000.0, &labels);
        let duration_ms = elapsed.as_millis() as u64;

        let keep_going = match outcome {
            Outcome::Completed => {
                record_outcome(&span, "completed");
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                metrics::tasks_completed().add(1, &labels);
                debug!(task = kind, %user_id, duration_ms, "task completed");
                true
            }
            Outcome::Failed(e) => {
                record_outcome(&span, "error");
                self.count_failure(kind, "error");
                error!(task = kind, %user_id, duration_ms, error = %e, detail = ?e, "background task failed");
                true
            }
            Outcome::Panicked(message) => {
                record_outcome(&span, "panic");
                self.count_failure(kind, "panic");
                error!(task = kind, %user_id, duration_ms, panic = %message, "background task panicked");
                true
            }
            Outcome::TimedOut(limit) => {
                record_outcome(&span, "timeout");
                self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                metrics::tasks_failed().add(
                    1,
                    &[KeyValue::new("task", kind), KeyValue::new("reason", "timeout")],
                );
                let limit_ms = limit.as_millis() as u64;
                warn!(task = kind, %user_id, limit_ms, "background task timed out");
                true
            }
            Outcome::Cancelled => {
                record_outcome(&span, "cancelled");
                warn!(task = kind, %user_id, "background task cancelled by shutdown");
                self.discard();
                return false;
            }
        };

        self.finish_one();
        keep_going
    }

    fn count_failure(&self, kind: &'static str, reason: &'static str) {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        metrics::tasks_failed().add(
            1,
            &[KeyValue::new("task", kind), KeyValue::new("reason", reason)],
        );
    }

    fn discard(&self) {
        self.counters.discarded.fetch_add(1, Ordering::Relaxed);
        metrics::tasks_discarded().add(1, &[]);
        self.finish_one();
    }

    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

async fn join_task(
    handle: &mut JoinHandle<crate::error::Result<()>>,
    limit: Option<Duration>,
) -> Outcome {
    let joined = match limit {
        Some(limit) => match tokio::time::timeout(limit, &mut *handle).await {
            Ok(joined) => joined,
            Err(_) => {
                cancel(handle).await;
                return Outcome::TimedOut(limit);
            }
        },
        None => (&mut *handle).await,
    };

    match joined {
        Ok(Ok(())) => Outcome::Completed,
        Ok(Err(e)) => Outcome::Failed(e),
        Err(e) if e.is_panic() => Outcome::Panicked(panic_message(e)),
        Err(_) => Outcome::Cancelled,
    }
}

/// Abort a task and wait until it has actually stopped. A task blocked
/// inside a poll only observes the abort once that poll returns.
async fn cancel(handle: &mut JoinHandle<crate::error::Result<()>>) {
    handle.abort();
    let _ = handle.await;
}

fn panic_message(e: JoinError) -> String {
    let payload = e.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
