//! Per-worker thread-local state (spec §4.C "Worker").
//!
//! Each worker owns exactly one [`crate::deque::Deque`], a thread-local RNG
//! seeded from its id, and a handful of atomics for steal statistics and the
//! `allstolen` quiescence hint. Thread spawning itself (naming, stack size,
//! join handles) lives in [`crate::scheduler`], grounded on the teacher's
//! `core::WorkerPool::new` (`std::thread::Builder` with named, sized
//! threads and an `AtomicBool` shutdown flag).

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::deque::{Deque, Steal};
use crate::frame::FrameRef;
use crate::scheduler::Pool;

thread_local! {
    // Thread-local RNG (spec §3: "Carries a thread-local RNG seeded from its
    // numeric id"). `None` until `Worker::seed_local_rng` runs on the
    // worker's own OS thread, right after it starts.
    static RNG: RefCell<Option<SmallRng>> = const { RefCell::new(None) };
}

/// Per-worker statistics, surfaced for diagnostics and tests; not part of
/// the scheduler's correctness contract.
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub steal_attempts: AtomicU64,
    pub successful_steals: AtomicU64,
    pub tasks_run: AtomicU64,
}

/// One worker: a deque, an id, and steal bookkeeping (spec §4.C).
pub struct Worker {
    id: usize,
    pub(crate) deque: Deque,
    /// Quiescence hint: true once this worker has observed its own deque
    /// empty and has nothing left to publish. Consulted (not required) by
    /// victim selection to skip deques known to be drained — see
    /// DESIGN.md's resolution of the `allstolen` open question.
    allstolen: AtomicBool,
    stats: WorkerStats,
}

impl Worker {
    pub(crate) fn new(id: usize, dqsize: usize) -> Self {
        Self {
            id,
            deque: Deque::new(dqsize),
            allstolen: AtomicBool::new(true),
            stats: WorkerStats::default(),
        }
    }

    /// A standalone worker with no sibling pool, for unit tests that only
    /// exercise frame/deque mechanics.
    #[doc(hidden)]
    pub fn for_test(id: usize) -> Self {
        Self::new(id, 1024)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Seed this thread's RNG. Must be called once, on the worker's own OS
    /// thread, before any victim selection (spec §3: seeded "from `id + 1`").
    pub(crate) fn seed_local_rng(id: usize) {
        RNG.with(|cell| {
            *cell.borrow_mut() = Some(SmallRng::seed_from_u64(id as u64 + 1));
        });
    }

    /// Uniformly pick a victim index in `0..num_workers`, excluding `self`
    /// (spec §4.C: "Victim selection is uniformly random among workers
    /// other than self"). Panics if called with `num_workers <= 1` or
    /// before `seed_local_rng`.
    fn random_victim(&self, num_workers: usize) -> usize {
        assert!(num_workers > 1, "no victims to steal from");
        RNG.with(|cell| {
            let mut rng = cell.borrow_mut();
            let rng = rng
                .as_mut()
                .expect("Worker::seed_local_rng must run before stealing");
            loop {
                let candidate = rng.random_range(0..num_workers);
                if candidate != self.id {
                    return candidate;
                }
            }
        })
    }

    pub(crate) fn mark_empty(&self) {
        self.allstolen.store(true, Ordering::Relaxed);
    }

    pub(crate) fn mark_nonempty(&self) {
        self.allstolen.store(false, Ordering::Relaxed);
    }

    pub(crate) fn is_drained(&self) -> bool {
        self.allstolen.load(Ordering::Relaxed) && self.deque.is_empty()
    }

    /// Attempt one steal against a uniformly random sibling worker (spec
    /// §4.C worker loop body). Returns the stolen [`FrameRef`], if any.
    pub(crate) fn try_steal_once(&self, pool: &Pool) -> Option<FrameRef> {
        let siblings = &pool.workers;
        if siblings.len() <= 1 {
            return None;
        }
        let victim_idx = self.random_victim(siblings.len());
        let victim = &siblings[victim_idx];
        self.stats.steal_attempts.fetch_add(1, Ordering::Relaxed);
        match victim.deque.steal_top() {
            Steal::Success(frame) => {
                self.stats.successful_steals.fetch_add(1, Ordering::Relaxed);
                Some(frame)
            }
            Steal::Empty | Steal::Abort => None,
        }
    }

    pub(crate) fn record_task_run(&self) {
        self.stats.tasks_run.fetch_add(1, Ordering::Relaxed);
    }
}

/// Process-wide count of workers currently executing a task body, used by
/// [`crate::scheduler::Scheduler`] to detect quiescence without requiring
/// task bodies to report in (spec §4.D "Quiescence").
#[derive(Debug, Default)]
pub(crate) struct ActiveCount(AtomicUsize);

impl ActiveCount {
    pub(crate) fn enter(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn exit(&self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}
