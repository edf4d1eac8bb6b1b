//! Worker pool lifecycle and the steal loop (spec §4.D "Scheduler").
//!
//! Thread spawning mirrors the teacher's `core::WorkerPool::new`: named,
//! stack-sized threads via `std::thread::Builder`, joined on shutdown via
//! an `AtomicBool` flag observed once per loop iteration — no condvars or
//! channels on the hot path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::JoinHandle;

use crossbeam::utils::Backoff;
use tracing::{debug, info, trace, warn};

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::frame::{Frame, FrameRef};
use crate::worker::{ActiveCount, Worker};

/// Process-wide scheduler state shared by every worker thread and by
/// [`Scheduler::run`] (spec §3 "Scheduler state").
pub(crate) struct Pool {
    pub(crate) workers: Vec<Arc<Worker>>,
    pub(crate) stopping: AtomicBool,
    pub(crate) active: ActiveCount,
    root_mailbox: parking_lot::Mutex<VecDeque<FrameRef>>,
}

impl Pool {
    /// Hand a type-erased root frame to worker 0's mailbox (spec §4.D RUN:
    /// "hands it to worker 0 for execution ... by a dedicated root-
    /// submission mailbox").
    fn submit_root(&self, frame_ref: FrameRef) {
        self.root_mailbox.lock().push_back(frame_ref);
    }

    /// Worker 0 polls this once per loop iteration, ahead of normal
    /// stealing, so root dispatch never waits behind a full steal round.
    fn take_root(&self) -> Option<FrameRef> {
        self.root_mailbox.lock().pop_front()
    }
}

/// The worker pool: `start(W, dqsize)` / `stop()` / `RUN` (spec §4.D, §6).
pub struct Scheduler {
    pool: Arc<Pool>,
    handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// `start(W, dqsize)` (spec §4.D / §6). `W = 0` auto-detects hardware
    /// parallelism. Blocks until every worker has passed its startup
    /// barrier, so no task is dispatched before the pool is ready.
    pub fn start(config: SchedulerConfig) -> Result<Arc<Self>> {
        let num_workers = config.resolved_worker_count();
        assert!(num_workers > 0, "a scheduler needs at least one worker");

        let workers: Vec<Arc<Worker>> = (0..num_workers)
            .map(|id| Arc::new(Worker::new(id, config.dqsize)))
            .collect();

        let pool = Arc::new(Pool {
            workers,
            stopping: AtomicBool::new(false),
            active: ActiveCount::default(),
            root_mailbox: parking_lot::Mutex::new(VecDeque::new()),
        });

        // Startup barrier: every worker thread plus this caller (spec §4.D
        // "runs a startup barrier so every worker is ready before any user
        // task is dispatched").
        let barrier = Arc::new(Barrier::new(num_workers + 1));

        let mut handles = Vec::with_capacity(num_workers);
        for id in 0..num_workers {
            let pool = pool.clone();
            let barrier = barrier.clone();
            let name = format!("{}-{id}", config.thread_name_prefix);
            let handle = std::thread::Builder::new()
                .name(name)
                .stack_size(config.stack_size_bytes)
                .spawn(move || {
                    Worker::seed_local_rng(id);
                    barrier.wait();
                    worker_main(id, pool);
                })
                .map_err(|e| Error::PoolInit {
                    reason: e.to_string(),
                })?;
            handles.push(handle);
        }

        barrier.wait();
        info!(workers = num_workers, dqsize = config.dqsize, "scheduler started");

        Ok(Arc::new(Self {
            pool,
            handles: parking_lot::Mutex::new(handles),
        }))
    }

    /// Convenience constructor matching the spec's `start(W, dqsize)` call
    /// shape directly.
    pub fn start_with(workers: usize, dqsize: usize) -> Result<Arc<Self>> {
        Self::start(SchedulerConfig {
            workers,
            dqsize,
            ..SchedulerConfig::default()
        })
    }

    /// Number of active workers (spec §6 `workers() -> int`).
    pub fn workers(&self) -> usize {
        self.pool.workers.len()
    }

    /// `RUN(f, args…)` (spec §4.D / §6): dispatch a root task to worker 0
    /// and block the calling thread until it completes.
    pub fn run<R, F>(&self, body: F) -> R
    where
        R: Send + 'static,
        F: FnOnce(&crate::scope::Scope<'_>) -> R + Send + 'static,
    {
        let frame = Frame::new(0, body);
        // SAFETY: this stack frame is not dropped until `take_result`
        // below, which only happens after `frame.is_done()` — by then no
        // other thread still holds the `FrameRef` (the root frame is never
        // stolen further once worker 0 starts running it directly).
        let frame_ref = unsafe { frame.as_ref() };
        self.pool.submit_root(frame_ref);

        let mut backoff = Backoff::new();
        while !frame.is_done() {
            backoff.snooze();
        }
        frame.take_result()
    }

    /// `stop()` (spec §4.D / §6): release-store the stopping flag and join
    /// every worker thread.
    pub fn stop(&self) {
        if self.pool.active.get() > 0 {
            warn!(
                active = self.pool.active.get(),
                "stop() called while tasks are still running"
            );
        }
        self.pool.stopping.store(true, Ordering::Release);
        let mut handles = self.handles.lock();
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
        debug!("scheduler stopped");
    }
}

/// The steal loop body for one worker (spec §4.C):
/// ```text
/// loop:
///   if scheduler.stopping: exit
///   victim <- uniform random worker != self
///   frame <- victim.deque.steal_top()
///   if frame is a task: frame.run(self); frame.tag <- DONE
///   else: yield / short backoff
/// ```
/// Root-task dispatch is checked first each iteration — see [`Pool::take_root`].
fn worker_main(id: usize, pool: Arc<Pool>) {
    let worker = pool.workers[id].clone();
    let mut backoff = Backoff::new();

    loop {
        if pool.stopping.load(Ordering::Acquire) {
            break;
        }

        if let Some(root) = pool.take_root() {
            pool.active.enter();
            unsafe { root.execute(&worker, &pool) };
            pool.active.exit();
            backoff.reset();
            continue;
        }

        match worker.try_steal_once(&pool) {
            Some(frame) => {
                trace!(worker = id, "stole a task");
                pool.active.enter();
                unsafe { frame.execute(&worker, &pool) };
                pool.active.exit();
                worker.record_task_run();
                backoff.reset();
            }
            None => backoff.snooze(),
        }
    }
}
