//! Stolen-frame recovery (spec §4.F "Interrupt / fast exit").
//!
//! The reference implementation needs an explicit non-local jump here
//! because its workers share a single C call stack per OS thread: once an
//! enclosing frame is stolen, the original worker must bail out of deeper
//! native call frames without unwinding them one return at a time. Rust's
//! recursion doesn't have that constraint — each level's own SYNC already
//! returns normally once its frame is `Done`, so the "unwind" spec §4.F
//! asks for falls out of ordinary function return. What remains is the
//! polling checkpoint itself: the cooperative wait a SYNC performs when it
//! discovers its own frame was stolen (spec §9 "Polling checkpoints ... is
//! sufficient").

use crossbeam::utils::Backoff;

use crate::frame::Frame;
use crate::scheduler::Pool;
use crate::worker::Worker;

/// Spin, helping the scheduler steal other work, until `frame` is `Done`
/// (spec §4.A SYNC slow path: "repeatedly try to steal work ... until the
/// stolen frame's tag becomes DONE").
pub(crate) fn wait_until_done<R>(frame: &Frame<R>, worker: &Worker, pool: &Pool) {
    let mut backoff = Backoff::new();
    while !frame.is_done() {
        match worker.try_steal_once(pool) {
            Some(stolen) => {
                pool.active.enter();
                unsafe { stolen.execute(worker, pool) };
                pool.active.exit();
                worker.record_task_run();
                backoff.reset();
            }
            None => backoff.snooze(),
        }
    }
}
