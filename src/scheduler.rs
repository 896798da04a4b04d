//! Bounded worker pool for background clustering passes.
//!
//! Workers are OS threads created lazily up to a cap and reused across
//! tasks. Jobs are typed structs sent over a shared FIFO channel; each
//! dispatched task gets a correlation id, and only the reply carrying
//! that id resolves the corresponding [`TaskHandle`], so overlapping
//! requests can never cross-talk. The pending-task table and counters
//! live behind a single mutex.
//!
//! A timed-out task's worker is not interrupted: the pool slot stays
//! occupied until the job eventually returns, at which point its result
//! is dropped because the pending entry is already gone. Accepted
//! trade-off; there is no cooperative cancellation.

use crate::diagnostics::Diagnostics;
use crate::error::{ClusterError, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use uuid::Uuid;

/// Correlation id attached to every dispatched task.
pub type TaskId = Uuid;

/// Hardware parallelism, probed once per process.
static HARDWARE_PARALLELISM: Lazy<usize> = Lazy::new(|| {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
});

/// A unit of work the pool can execute.
pub trait Job: Send + 'static {
    type Output: Send + 'static;

    /// Run the job on a worker thread. `progress` may be used to push
    /// completion fractions back to the submitting thread.
    fn run(self, progress: &TaskProgress) -> Self::Output;
}

/// Progress sink handed to a running job.
pub struct TaskProgress {
    tx: Sender<f64>,
}

impl TaskProgress {
    /// Report a completion fraction in `[0, 1]`. Best effort: reports
    /// to an abandoned task are silently discarded.
    pub fn report(&self, fraction: f64) {
        let _ = self.tx.send(fraction.clamp(0.0, 1.0));
    }
}

enum WorkerMsg<J: Job> {
    Run(TaskEnvelope<J>),
    Shutdown,
}

struct TaskEnvelope<J> {
    id: TaskId,
    job: J,
    progress: Sender<f64>,
}

struct PoolState<O> {
    /// Tasks submitted but not yet resolved, keyed by correlation id.
    /// A worker that finds its id missing here knows the caller
    /// abandoned the task (timeout) and drops the result.
    pending: FxHashMap<TaskId, Sender<Result<O>>>,
    busy: usize,
    spawned: usize,
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Workers created so far (lazily, up to the cap).
    pub spawned: usize,
    /// Workers currently running a job.
    pub busy: usize,
    /// Tasks submitted and not yet resolved (queued + running).
    pub in_flight: usize,
}

/// Bounded pool of reusable background workers.
///
/// State machine per task: `Queued → Running → {Completed | Failed |
/// TimedOut}`. Queued tasks are dispatched FIFO as workers free up;
/// completion order still depends on per-task runtime, so callers must
/// correlate by handle, never by submission order.
pub struct TaskScheduler<J: Job> {
    state: Arc<Mutex<PoolState<J::Output>>>,
    job_tx: Sender<WorkerMsg<J>>,
    job_rx: Arc<Mutex<Receiver<WorkerMsg<J>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    diagnostics: Arc<dyn Diagnostics>,
    max_workers: usize,
    timeout: Duration,
}

impl<J: Job> TaskScheduler<J> {
    /// Create a pool capped at `min(max_workers, hardware parallelism)`.
    ///
    /// The first worker is spawned eagerly as a probe: environments
    /// where threads cannot be created fail here, once, with
    /// `WorkerUnavailable`, instead of failing every submission.
    pub fn new(
        max_workers: usize,
        timeout: Duration,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self> {
        if max_workers == 0 {
            return Err(ClusterError::invalid("max_workers", "must be at least 1"));
        }
        if timeout.is_zero() {
            return Err(ClusterError::invalid("timeout", "must be positive"));
        }

        let effective_max = max_workers.min(*HARDWARE_PARALLELISM).max(1);
        let (job_tx, job_rx) = mpsc::channel();
        let scheduler = Self {
            state: Arc::new(Mutex::new(PoolState {
                pending: FxHashMap::default(),
                busy: 0,
                spawned: 0,
            })),
            job_tx,
            job_rx: Arc::new(Mutex::new(job_rx)),
            workers: Mutex::new(Vec::with_capacity(effective_max)),
            diagnostics,
            max_workers: effective_max,
            timeout,
        };

        let probe = scheduler
            .spawn_worker(0)
            .map_err(|e| ClusterError::WorkerUnavailable(e.to_string()))?;
        scheduler.workers.lock().push(probe);
        scheduler.state.lock().spawned = 1;

        Ok(scheduler)
    }

    /// Submit a job. Dispatches immediately if a worker is idle,
    /// otherwise the job waits in the FIFO queue; a new worker is
    /// spawned when every existing one is occupied and the cap allows.
    pub fn execute(&self, job: J) -> TaskHandle<J::Output> {
        let id = Uuid::new_v4();
        let (result_tx, result_rx) = mpsc::channel();
        let (progress_tx, progress_rx) = mpsc::channel();

        {
            let mut state = self.state.lock();
            state.pending.insert(id, result_tx);

            if state.pending.len() > state.spawned && state.spawned < self.max_workers {
                match self.spawn_worker(state.spawned) {
                    Ok(handle) => {
                        state.spawned += 1;
                        self.workers.lock().push(handle);
                    }
                    Err(e) => {
                        // Existing workers still drain the queue.
                        self.diagnostics
                            .warn(&format!("failed to grow worker pool: {e}"));
                    }
                }
            }
        }

        // Send fails only after shutdown; the handle then resolves as
        // failed via the dropped result sender.
        let _ = self.job_tx.send(WorkerMsg::Run(TaskEnvelope {
            id,
            job,
            progress: progress_tx,
        }));

        TaskHandle {
            id,
            result_rx,
            progress_rx,
            timeout: self.timeout,
            state: Arc::clone(&self.state),
        }
    }

    /// Whether another submission would find a worker rather than
    /// queue behind a full complement of in-flight tasks.
    ///
    /// Counts submissions, not pickups: a job that has been accepted
    /// but not yet dequeued by a worker already holds a slot.
    pub fn has_capacity(&self) -> bool {
        self.state.lock().pending.len() < self.max_workers
    }

    pub fn stats(&self) -> SchedulerStats {
        let state = self.state.lock();
        SchedulerStats {
            spawned: state.spawned,
            busy: state.busy,
            in_flight: state.pending.len(),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn spawn_worker(&self, index: usize) -> std::io::Result<JoinHandle<()>> {
        let state = Arc::clone(&self.state);
        let job_rx = Arc::clone(&self.job_rx);
        let diagnostics = Arc::clone(&self.diagnostics);

        thread::Builder::new()
            .name(format!("mapcluster-worker-{index}"))
            .spawn(move || worker_loop(state, job_rx, diagnostics))
    }
}

impl<J: Job> Drop for TaskScheduler<J> {
    fn drop(&mut self) {
        let spawned = self.state.lock().spawned;
        for _ in 0..spawned {
            let _ = self.job_tx.send(WorkerMsg::Shutdown);
        }
        for handle in self.workers.lock().drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop<J: Job>(
    state: Arc<Mutex<PoolState<J::Output>>>,
    job_rx: Arc<Mutex<Receiver<WorkerMsg<J>>>>,
    diagnostics: Arc<dyn Diagnostics>,
) {
    loop {
        // Lock held only while waiting for the next message; exactly
        // one idle worker receives each job, in FIFO order.
        let msg = {
            let rx = job_rx.lock();
            rx.recv()
        };
        let envelope = match msg {
            Ok(WorkerMsg::Run(envelope)) => envelope,
            Ok(WorkerMsg::Shutdown) | Err(_) => break,
        };
        let TaskEnvelope { id, job, progress } = envelope;

        state.lock().busy += 1;
        let progress = TaskProgress { tx: progress };
        let outcome = catch_unwind(AssertUnwindSafe(|| job.run(&progress)));

        let mut state_guard = state.lock();
        state_guard.busy -= 1;
        let reply = outcome.map_err(|_| {
            ClusterError::TaskFailed("worker panicked while running task".to_string())
        });
        match state_guard.pending.remove(&id) {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => {
                diagnostics.debug(&format!("task {id} abandoned before completion; dropping result"));
            }
        }
    }
}

/// Pending result of a dispatched task.
pub struct TaskHandle<O> {
    id: TaskId,
    result_rx: Receiver<Result<O>>,
    progress_rx: Receiver<f64>,
    timeout: Duration,
    state: Arc<Mutex<PoolState<O>>>,
}

impl<O> TaskHandle<O> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Most recent progress fraction reported by the job, if any.
    pub fn latest_progress(&self) -> Option<f64> {
        self.progress_rx.try_iter().last()
    }

    /// Block until the task resolves or its deadline passes.
    ///
    /// On timeout the pending entry is removed so a late result is
    /// discarded; the worker itself keeps running (no forced kill).
    pub fn wait(self) -> Result<O> {
        match self.result_rx.recv_timeout(self.timeout) {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) => {
                self.state.lock().pending.remove(&self.id);
                Err(ClusterError::TaskTimeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(ClusterError::TaskFailed(
                "scheduler shut down before task completed".to_string(),
            )),
        }
    }
}
